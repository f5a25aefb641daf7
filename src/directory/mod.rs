//! Connections to a directory server.
//!
//! The provider talks to the directory only through [`Connector`] and
//! [`Connection`]. [`net::Ldap3Connector`] is backed by a real network
//! connection; [`memory::MemoryDirectory`] is a scripted in-memory server used
//! in tests.

pub mod memory;
pub mod net;

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use ldap3::{DerefAliases, LdapError, Scope, SearchEntry};
use rustls::ClientConfig;
use url::Url;

/// LDAP result code for `referral`
pub const RC_REFERRAL: u32 = 10;

/// Options used when dialing a server
#[derive(Clone, Default)]
pub struct DialOptions {
	/// Timeout to establish a connection
	pub timeout: Duration,
	/// Upgrade plain connections with StartTLS before binding
	pub starttls: bool,
	/// Disable verification of TLS certificates
	pub no_tls_verify: bool,
	/// Custom TLS client configuration
	pub tls: Option<Arc<ClientConfig>>,
}

impl fmt::Debug for DialOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DialOptions")
			.field("timeout", &self.timeout)
			.field("starttls", &self.starttls)
			.field("no_tls_verify", &self.no_tls_verify)
			.field("tls", &self.tls.is_some())
			.finish()
	}
}

/// Produces connections to directory servers.
#[async_trait]
pub trait Connector: fmt::Debug + Send + Sync {
	/// Open a connection to the server at `url`.
	async fn dial(&self, url: &Url, options: &DialOptions)
		-> Result<Box<dyn Connection>, LdapError>;
}

/// A single connection to a directory server. Not shared between callers.
#[async_trait]
pub trait Connection: Send {
	/// Upgrade the connection to TLS.
	async fn start_tls(&mut self) -> Result<(), LdapError>;

	/// Authenticate the connection with a simple bind.
	async fn bind(&mut self, dn: &str, password: &str) -> Result<(), LdapError>;

	/// Perform a search. A result carrying result code 10 is returned as an
	/// error so its referrals can be read with [`referrals`].
	async fn search(&mut self, request: &SearchRequest) -> Result<SearchOutcome, LdapError>;

	/// Replace attribute values of an entry.
	async fn modify(&mut self, request: &ModifyRequest) -> Result<(), LdapError>;

	/// Perform the password modify extended operation (RFC 3062).
	async fn password_modify(&mut self, request: &PasswordModifyRequest)
		-> Result<(), LdapError>;

	/// Release the connection. Called exactly once, by [`Session`].
	fn close(&mut self);
}

/// Parameters of a search operation
#[derive(Debug, Clone)]
pub struct SearchRequest {
	/// Search base
	pub base: String,
	/// Search scope
	pub scope: Scope,
	/// Alias dereferencing
	pub deref: DerefAliases,
	/// Maximum number of entries, 0 for no limit
	pub size_limit: i32,
	/// Time limit in seconds, 0 for no limit
	pub time_limit: i32,
	/// Search filter
	pub filter: String,
	/// Attributes to return
	pub attributes: Vec<String>,
}

impl SearchRequest {
	/// A subtree search that never dereferences aliases.
	#[must_use]
	pub fn subtree(base: impl Into<String>, filter: impl Into<String>, attributes: Vec<String>) -> Self {
		Self {
			base: base.into(),
			scope: Scope::Subtree,
			deref: DerefAliases::Never,
			size_limit: 0,
			time_limit: 0,
			filter: filter.into(),
			attributes,
		}
	}

	/// Limit the number of returned entries.
	#[must_use]
	pub fn with_size_limit(mut self, size_limit: i32) -> Self {
		self.size_limit = size_limit;
		self
	}
}

/// Entries and continuation references returned by a search
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
	/// Returned entries
	pub entries: Vec<SearchEntry>,
	/// Continuation references
	pub referrals: Vec<String>,
}

/// Replacement of all values of one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
	/// Attribute name
	pub attribute: String,
	/// New values
	pub values: Vec<Vec<u8>>,
}

/// Parameters of a modify operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyRequest {
	/// The entry to modify
	pub dn: String,
	/// Attribute replacements
	pub changes: Vec<Replace>,
}

impl ModifyRequest {
	/// A modification replacing a single attribute with a single value.
	#[must_use]
	pub fn replace(dn: impl Into<String>, attribute: impl Into<String>, value: Vec<u8>) -> Self {
		Self {
			dn: dn.into(),
			changes: vec![Replace { attribute: attribute.into(), values: vec![value] }],
		}
	}
}

/// Parameters of the password modify extended operation. No old password is
/// sent: this is an administrative reset.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordModifyRequest {
	/// The DN of the user
	pub user_id: String,
	/// The new password
	pub new_password: String,
}

impl fmt::Debug for PasswordModifyRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PasswordModifyRequest").field("user_id", &self.user_id).finish_non_exhaustive()
	}
}

/// A write to the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
	/// Attribute modification
	Modify(ModifyRequest),
	/// Password modify extended operation
	PasswordModify(PasswordModifyRequest),
}

impl fmt::Display for WriteRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WriteRequest::Modify(_) => f.write_str("modify"),
			WriteRequest::PasswordModify(_) => f.write_str("password modify"),
		}
	}
}

/// Referral URLs carried by a failed operation.
#[must_use]
pub fn referrals(err: &LdapError) -> &[String] {
	match err {
		LdapError::LdapResult { result } if result.rc == RC_REFERRAL => result.refs.as_slice(),
		_ => &[],
	}
}

/// A bound connection that is closed when dropped.
pub struct Session {
	/// The address the connection was dialed to
	url: Url,
	/// The connection
	conn: Box<dyn Connection>,
}

impl Session {
	/// Take ownership of a freshly dialed connection.
	#[must_use]
	pub fn new(url: Url, conn: Box<dyn Connection>) -> Self {
		Self { url, conn }
	}

	/// The address the connection was dialed to
	#[must_use]
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Perform a write.
	pub async fn write(&mut self, request: &WriteRequest) -> Result<(), LdapError> {
		match request {
			WriteRequest::Modify(modify) => self.conn.modify(modify).await,
			WriteRequest::PasswordModify(exop) => self.conn.password_modify(exop).await,
		}
	}
}

impl std::ops::Deref for Session {
	type Target = dyn Connection;

	fn deref(&self) -> &Self::Target {
		self.conn.as_ref()
	}
}

impl std::ops::DerefMut for Session {
	fn deref_mut(&mut self) -> &mut Self::Target {
		self.conn.as_mut()
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session").field("url", &self.url.as_str()).finish_non_exhaustive()
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.conn.close();
	}
}

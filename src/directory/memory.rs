//! A scripted, in-memory directory for tests.
//!
//! Every server is addressed by its URL. Searches are answered from replies
//! registered per filter; binds succeed for registered credentials only;
//! writes succeed unless a reply was registered. Every call is recorded in a
//! journal that tests can inspect.
use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use ldap3::{LdapError, LdapResult, SearchEntry};
use url::Url;

use super::{
	Connection, Connector, DialOptions, ModifyRequest, PasswordModifyRequest, SearchOutcome,
	SearchRequest, WriteRequest, RC_REFERRAL,
};
use crate::error::RC_INVALID_CREDENTIALS;

/// LDAP result code for `unavailable`
const RC_UNAVAILABLE: u32 = 52;

/// Build an error carrying an LDAP result code.
#[must_use]
pub fn result_error(rc: u32, refs: Vec<String>) -> LdapError {
	LdapError::LdapResult {
		result: LdapResult {
			rc,
			matched: String::new(),
			text: String::new(),
			refs,
			ctrls: Vec::new(),
		},
	}
}

/// A canned answer to a search
#[derive(Debug, Clone)]
pub enum SearchReply {
	/// Entries, optionally followed by continuation references
	Entries {
		/// The entries
		entries: Vec<SearchEntry>,
		/// The continuation references
		referrals: Vec<String>,
	},
	/// A failed search with the given result code and referrals
	Error {
		/// Result code
		rc: u32,
		/// Referrals
		referrals: Vec<String>,
	},
}

impl SearchReply {
	/// Reply with the given entries.
	#[must_use]
	pub fn entries(entries: Vec<SearchEntry>) -> Self {
		SearchReply::Entries { entries, referrals: Vec::new() }
	}

	/// Reply with result code 10 and the given referrals.
	#[must_use]
	pub fn referral(referrals: Vec<String>) -> Self {
		SearchReply::Error { rc: RC_REFERRAL, referrals }
	}
}

/// Something that happened to the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	/// A connection was opened
	Dial(String),
	/// A connection was upgraded
	StartTls(String),
	/// A bind was attempted
	Bind {
		/// Server
		url: String,
		/// Bind DN
		dn: String,
	},
	/// A search was performed
	Search {
		/// Server
		url: String,
		/// Search base
		base: String,
		/// Filter
		filter: String,
		/// Size limit
		size_limit: i32,
	},
	/// A write was performed
	Write {
		/// Server
		url: String,
		/// The request
		request: WriteRequest,
	},
	/// A connection was closed
	Close(String),
}

/// Scripted behaviour of one server
#[derive(Debug, Default)]
struct Server {
	/// Refuse connections
	unreachable: bool,
	/// Fail StartTLS
	refuse_starttls: bool,
	/// DN to password
	credentials: HashMap<String, String>,
	/// Filter to reply
	searches: HashMap<String, SearchReply>,
	/// Write failure to inject, as result code and referrals
	write_failure: Option<(u32, Vec<String>)>,
}

/// State shared between the directory and its connections
#[derive(Debug, Default)]
struct State {
	/// Servers by URL
	servers: HashMap<String, Server>,
	/// Everything that happened, in order
	journal: Vec<Event>,
}

/// A deterministic in-memory [`Connector`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
	/// Shared state
	state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
	/// Create an empty directory.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Lock the state. A panicking test must not poison the others.
	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Modify the server at `url`, creating it if needed.
	fn server(&self, url: &str, f: impl FnOnce(&mut Server)) {
		f(self.lock().servers.entry(url.to_owned()).or_default());
	}

	/// Accept binds for `dn` with `password` on the server at `url`.
	pub fn add_credentials(&self, url: &str, dn: &str, password: &str) {
		self.server(url, |server| {
			server.credentials.insert(dn.to_owned(), password.to_owned());
		});
	}

	/// Answer searches with `filter` on the server at `url` with `reply`.
	pub fn on_search(&self, url: &str, filter: &str, reply: SearchReply) {
		self.server(url, |server| {
			server.searches.insert(filter.to_owned(), reply);
		});
	}

	/// Make writes on the server at `url` fail with `rc` and `referrals`.
	pub fn fail_writes(&self, url: &str, rc: u32, referrals: Vec<String>) {
		self.server(url, |server| server.write_failure = Some((rc, referrals)));
	}

	/// Refuse connections to the server at `url`.
	pub fn set_unreachable(&self, url: &str) {
		self.server(url, |server| server.unreachable = true);
	}

	/// Fail StartTLS on the server at `url`.
	pub fn refuse_starttls(&self, url: &str) {
		self.server(url, |server| server.refuse_starttls = true);
	}

	/// Everything that happened so far
	#[must_use]
	pub fn journal(&self) -> Vec<Event> {
		self.lock().journal.clone()
	}

	/// All writes performed so far, with the server they went to
	#[must_use]
	pub fn writes(&self) -> Vec<(String, WriteRequest)> {
		self.lock()
			.journal
			.iter()
			.filter_map(|event| match event {
				Event::Write { url, request } => Some((url.clone(), request.clone())),
				_ => None,
			})
			.collect()
	}

	/// Number of connections opened and closed so far
	#[must_use]
	pub fn connection_counts(&self) -> (usize, usize) {
		let state = self.lock();
		let dialed = state.journal.iter().filter(|e| matches!(e, Event::Dial(_))).count();
		let closed = state.journal.iter().filter(|e| matches!(e, Event::Close(_))).count();
		(dialed, closed)
	}

	/// Record an event.
	fn record(&self, event: Event) {
		self.lock().journal.push(event);
	}
}

/// Normalize a URL the way servers are registered: without trailing slash or
/// path.
fn server_key(url: &Url) -> String {
	let mut key = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
	if let Some(port) = url.port() {
		key.push_str(&format!(":{port}"));
	}
	key
}

#[async_trait]
impl Connector for MemoryDirectory {
	async fn dial(
		&self,
		url: &Url,
		_options: &DialOptions,
	) -> Result<Box<dyn Connection>, LdapError> {
		let key = server_key(url);
		let reachable = self.lock().servers.get(&key).is_some_and(|server| !server.unreachable);
		if !reachable {
			return Err(LdapError::from(std::io::Error::new(
				std::io::ErrorKind::ConnectionRefused,
				format!("{key} refused the connection"),
			)));
		}
		self.record(Event::Dial(key.clone()));
		Ok(Box::new(MemoryConnection { directory: self.clone(), url: key }))
	}
}

/// A connection to one server of a [`MemoryDirectory`]
#[derive(Debug)]
struct MemoryConnection {
	/// The directory
	directory: MemoryDirectory,
	/// The server
	url: String,
}

impl MemoryConnection {
	/// Run `f` against the scripted server.
	fn with_server<T>(&self, f: impl FnOnce(&Server) -> T) -> Result<T, LdapError> {
		let state = self.directory.lock();
		let server =
			state.servers.get(&self.url).ok_or_else(|| result_error(RC_UNAVAILABLE, Vec::new()))?;
		Ok(f(server))
	}

	/// Perform a write as configured.
	fn write(&self, request: WriteRequest) -> Result<(), LdapError> {
		self.directory.record(Event::Write { url: self.url.clone(), request });
		match self.with_server(|server| server.write_failure.clone())? {
			Some((rc, referrals)) => Err(result_error(rc, referrals)),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl Connection for MemoryConnection {
	async fn start_tls(&mut self) -> Result<(), LdapError> {
		self.directory.record(Event::StartTls(self.url.clone()));
		if self.with_server(|server| server.refuse_starttls)? {
			return Err(result_error(RC_UNAVAILABLE, Vec::new()));
		}
		Ok(())
	}

	async fn bind(&mut self, dn: &str, password: &str) -> Result<(), LdapError> {
		self.directory.record(Event::Bind { url: self.url.clone(), dn: dn.to_owned() });
		let accepted = self.with_server(|server| {
			server.credentials.get(dn).is_some_and(|expected| expected == password)
		})?;
		if accepted {
			Ok(())
		} else {
			Err(result_error(RC_INVALID_CREDENTIALS, Vec::new()))
		}
	}

	async fn search(&mut self, request: &SearchRequest) -> Result<SearchOutcome, LdapError> {
		self.directory.record(Event::Search {
			url: self.url.clone(),
			base: request.base.clone(),
			filter: request.filter.clone(),
			size_limit: request.size_limit,
		});
		match self.with_server(|server| server.searches.get(&request.filter).cloned())? {
			Some(SearchReply::Entries { entries, referrals }) => {
				Ok(SearchOutcome { entries, referrals })
			}
			Some(SearchReply::Error { rc, referrals }) => Err(result_error(rc, referrals)),
			None => Ok(SearchOutcome::default()),
		}
	}

	async fn modify(&mut self, request: &ModifyRequest) -> Result<(), LdapError> {
		self.write(WriteRequest::Modify(request.clone()))
	}

	async fn password_modify(&mut self, request: &PasswordModifyRequest) -> Result<(), LdapError> {
		self.write(WriteRequest::PasswordModify(request.clone()))
	}

	fn close(&mut self) {
		self.directory.record(Event::Close(self.url.clone()));
	}
}

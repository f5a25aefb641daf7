//! The user provider: password checks, user details, and password resets.
use std::sync::Arc;

use async_trait::async_trait;
use ldap3::Scope;
use rustls::ClientConfig;
use tracing::{debug, warn};

use crate::{
	client::DirectoryClient,
	config::{Config, Implementation},
	directory::{net::Ldap3Connector, Connector, DialOptions, SearchRequest, Session},
	entry::SearchEntryExt,
	error::{Error, Operation},
	password::{PasswordStrategy, OID_PASSWORD_MODIFY},
	profile::{self, UserProfile},
	settings::Settings,
};

/// Attribute of the root DSE listing supported extended operations
const ATTRIBUTE_SUPPORTED_EXTENSION: &str = "supportedExtension";

/// Details about a user, as returned to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDetails {
	/// Canonical username
	pub username: String,
	/// Display name
	pub display_name: Option<String>,
	/// Email addresses
	pub emails: Vec<String>,
	/// Names of the groups the user is a member of, in the order the
	/// directory returned them
	pub groups: Vec<String>,
}

/// A source of users.
#[async_trait]
pub trait UserProvider: Send + Sync {
	/// Check whether `password` is the password of `username`. Returns
	/// `Ok(true)` on success; every failure, including a wrong password, is an
	/// error.
	async fn check_user_password(&self, username: &str, password: &str) -> Result<bool, Error>;

	/// Look up profile and groups of `username`.
	async fn get_details(&self, username: &str) -> Result<UserDetails, Error>;

	/// Set the password of `username`.
	async fn update_password(&self, username: &str, password: &str) -> Result<(), Error>;
}

/// A [`UserProvider`] backed by an LDAP directory.
#[derive(Debug)]
pub struct LdapUserProvider {
	/// Derived search settings
	settings: Settings,
	/// Connects and performs operations
	client: DirectoryClient,
	/// The configured directory kind
	implementation: Implementation,
	/// How passwords are changed
	password_strategy: PasswordStrategy,
	/// Refuse password updates
	disable_reset_password: bool,
}

impl LdapUserProvider {
	/// Create a provider connecting over the network. `tls` replaces the
	/// default TLS client configuration, see
	/// [`TLSConfig::client_config`](crate::config::TLSConfig::client_config).
	pub fn new(config: &Config, tls: Option<Arc<ClientConfig>>) -> Result<Self, Error> {
		Self::with_connector(config, tls, Arc::new(Ldap3Connector))
	}

	/// Create a provider using `connector` for all connections.
	pub fn with_connector(
		config: &Config,
		tls: Option<Arc<ClientConfig>>,
		connector: Arc<dyn Connector>,
	) -> Result<Self, Error> {
		let settings = Settings::resolve(config)?;
		let options = DialOptions {
			timeout: config.connection.timeout(),
			starttls: config.connection.starttls,
			no_tls_verify: config.connection.tls.no_tls_verify,
			tls,
		};
		let client = DirectoryClient::new(
			connector,
			config.url.clone(),
			(config.search_user.clone(), config.search_password.clone()),
			options,
			config.permit_referrals,
		);

		Ok(Self {
			settings,
			client,
			implementation: config.implementation,
			password_strategy: PasswordStrategy::select(false, config.implementation),
			disable_reset_password: config.disable_reset_password,
		})
	}

	/// How passwords are currently changed
	#[must_use]
	pub fn password_strategy(&self) -> PasswordStrategy {
		self.password_strategy
	}

	/// Check that the service account can bind, and detect whether the server
	/// supports the password modify extended operation.
	pub async fn startup_check(&mut self) -> Result<(), Error> {
		let mut session = self.client.connect().await?;
		let mut request = SearchRequest::subtree(
			"",
			"(objectClass=*)",
			vec![ATTRIBUTE_SUPPORTED_EXTENSION.to_owned()],
		);
		request.scope = Scope::Base;
		let entries = self.client.search(&mut session, &request).await?;

		let supported = entries.iter().any(|entry| {
			entry
				.attr_values(ATTRIBUTE_SUPPORTED_EXTENSION)
				.iter()
				.any(|oid| oid == OID_PASSWORD_MODIFY)
		});
		self.password_strategy = PasswordStrategy::select(supported, self.implementation);
		debug!(
			"Password modify extended operation supported: {supported}, using {:?}",
			self.password_strategy
		);
		Ok(())
	}

	/// Open a service account session and find the user.
	async fn lookup(&self, input: &str) -> Result<(Session, UserProfile), Error> {
		let mut session = self.client.connect().await?;
		let profile = profile::resolve(&self.client, &mut session, &self.settings, input).await?;
		Ok((session, profile))
	}

	/// See [`UserProvider::check_user_password`].
	async fn check_password(&self, username: &str, password: &str) -> Result<bool, Error> {
		let (_session, profile) = self.lookup(username).await?;

		if password.is_empty() {
			return Err(Error::AuthenticationFailed(Box::new(Error::EmptyPassword)));
		}
		let _user_session = self
			.client
			.connect_as(&profile.dn, password)
			.await
			.map_err(|err| Error::AuthenticationFailed(Box::new(err)))?;
		Ok(true)
	}

	/// See [`UserProvider::get_details`].
	async fn details(&self, username: &str) -> Result<UserDetails, Error> {
		let (mut session, profile) = self.lookup(username).await?;

		let filter = self.settings.groups_filter.render(username, Some(&profile));
		let request = SearchRequest::subtree(
			&self.settings.groups_base_dn,
			filter,
			self.settings.groups_attributes.clone(),
		);
		let entries = self.client.search(&mut session, &request).await?;

		let mut groups = Vec::new();
		for entry in &entries {
			if !entry.has_attrs() {
				warn!("No groups retrieved from LDAP for user {username}: {} has no attributes", entry.dn);
				break;
			}
			groups.extend_from_slice(entry.attr_values(&self.settings.attributes.group_name));
		}

		Ok(UserDetails {
			username: profile.username,
			display_name: profile.display_name,
			emails: profile.emails,
			groups,
		})
	}

	/// See [`UserProvider::update_password`].
	async fn set_password(&self, username: &str, password: &str) -> Result<(), Error> {
		if self.disable_reset_password {
			return Err(Error::PasswordResetDisabled);
		}
		let (mut session, profile) = self.lookup(username).await?;
		let request = self.password_strategy.request(&profile.dn, password);
		self.client.write(&mut session, &request).await
	}
}

#[async_trait]
impl UserProvider for LdapUserProvider {
	async fn check_user_password(&self, username: &str, password: &str) -> Result<bool, Error> {
		self.check_password(username, password)
			.await
			.map_err(|err| err.during(Operation::CheckUserPassword, username))
	}

	async fn get_details(&self, username: &str) -> Result<UserDetails, Error> {
		self.details(username).await.map_err(|err| err.during(Operation::GetDetails, username))
	}

	async fn update_password(&self, username: &str, password: &str) -> Result<(), Error> {
		self.set_password(username, password)
			.await
			.map_err(|err| err.during(Operation::UpdatePassword, username))
	}
}

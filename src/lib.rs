//! Authenticate users and look up their details in an LDAP directory.
//!
//! The library resolves a username to a directory entry with a configurable
//! search, then verifies passwords by binding as that entry, collects group
//! memberships with a second search, or resets passwords with whichever
//! mechanism the directory supports. Servers such as OpenLDAP, 389-DS,
//! FreeIPA and Active Directory are supported.
//!
//! Every operation opens its own connections and closes them before
//! returning; nothing is pooled or cached. Referrals returned by the server
//! are followed when [`Config::permit_referrals`] is set.
//!
//! For a general primer on LDAP, the [introduction] in the `ldap3` crate which
//! is used here for interfacing with LDAP is an excellent resource.
//!
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use url::Url;
//! use ldap_user_provider::{
//!     config::{AttributeConfig, Config, ConnectionConfig, Implementation, Searches},
//!     LdapUserProvider, UserProvider,
//! };
//!
//! // Configuration can also be deserialized with serde. It's hand-constructed
//! // here for demonstration purposes.
//! let config = Config {
//!     url: Url::parse("ldap://localhost")?,
//!     connection: ConnectionConfig::default(),
//!     implementation: Implementation::Custom,
//!     search_user: "cn=admin,dc=example,dc=com".to_owned(),
//!     search_password: "verysecret".to_owned(),
//!     searches: Searches {
//!         base_dn: "dc=example,dc=com".to_owned(),
//!         additional_users_dn: Some("ou=people".to_owned()),
//!         users_filter: Some("(&(uid={input})(objectClass=inetOrgPerson))".to_owned()),
//!         additional_groups_dn: Some("ou=groups".to_owned()),
//!         groups_filter: Some("(&(member={dn})(objectClass=groupOfNames))".to_owned()),
//!     },
//!     attributes: AttributeConfig::default(),
//!     permit_referrals: false,
//!     disable_reset_password: false,
//! };
//!
//! let tls = config.connection.tls.client_config().await?;
//! let mut provider = LdapUserProvider::new(&config, tls)?;
//! provider.startup_check().await?;
//!
//! if provider.check_user_password("john", "hunter2").await? {
//!     let details = provider.get_details("john").await?;
//!     println!("{} is a member of {:?}", details.username, details.groups);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * [secrecy](https://docs.rs/secrecy) is not used for storing the search user
//!   password, it probably should be
//! * Referrals are followed one level deep; referrals returned by a referred
//!   server are not chased further.

mod client;
pub mod config;
pub mod directory;
pub mod entry;
pub mod error;
pub mod filter;
pub mod password;
pub mod profile;
mod provider;
mod settings;

pub use ldap3::{self, SearchEntry};

pub use crate::{
	config::{AttributeConfig, Config, ConnectionConfig, Implementation, Searches},
	entry::SearchEntryExt,
	error::Error,
	password::PasswordStrategy,
	profile::UserProfile,
	provider::{LdapUserProvider, UserDetails, UserProvider},
};

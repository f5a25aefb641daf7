//! Config for the LDAP user provider.
use std::{
	io::BufReader,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use rustls::{version, ClientConfig, RootCertStore, SupportedProtocolVersion};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;

/// LDAP configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
	/// The URL to connect to the server with. Supports ldap and ldaps schemes
	pub url: Url,
	/// Connection settings.
	#[serde(default)]
	pub connection: ConnectionConfig,
	/// Which directory implementation the server is
	#[serde(default)]
	pub implementation: Implementation,
	/// The DN of the service account used for lookups and password resets
	pub search_user: String,
	/// The password of the service account
	pub search_password: String,
	/// Filters and bases to use for searches
	pub searches: Searches,
	/// Names of attributes to extract data from
	#[serde(default)]
	pub attributes: AttributeConfig,
	/// Whether referrals returned by the server are followed
	#[serde(default)]
	pub permit_referrals: bool,
	/// Refuse password updates
	#[serde(default)]
	pub disable_reset_password: bool,
}

impl Config {
	/// Returns an example configuration
	#[cfg(test)]
	#[allow(clippy::unwrap_used)]
	pub(crate) fn example() -> Self {
		Config {
			url: Url::parse("ldap://primary").unwrap(),
			connection: ConnectionConfig::default(),
			implementation: Implementation::Custom,
			search_user: "cn=admin,dc=example,dc=com".to_owned(),
			search_password: "secret".to_owned(),
			searches: Searches {
				base_dn: "dc=example,dc=com".to_owned(),
				additional_users_dn: Some("ou=users".to_owned()),
				users_filter: Some(
					"(&({username_attribute}={input})(objectClass=inetOrgPerson))".to_owned(),
				),
				additional_groups_dn: None,
				groups_filter: Some("(&(member={dn})(objectClass=groupOfNames))".to_owned()),
			},
			attributes: AttributeConfig::default(),
			permit_referrals: false,
			disable_reset_password: false,
		}
	}
}

/// Configuration for how to connect to the LDAP server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
	/// Timeout to establish a connection in seconds.
	pub timeout: u64,

	/// Use the StartTLS extended operation for establishing a secure
	/// connection, rather than TLS on a dedicated port.
	pub starttls: bool,

	/// TLS config
	pub tls: TLSConfig,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self { timeout: 5, starttls: false, tls: TLSConfig::default() }
	}
}

impl ConnectionConfig {
	/// The dial timeout
	#[must_use]
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout)
	}
}

/// TLS Configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TLSConfig {
	/// Lowest protocol version that will be negotiated
	pub minimum_version: TlsVersion,

	/// Disable verification of TLS certificates. Only applies to the
	/// connection library's default TLS configuration, so it is rejected
	/// together with `root_certificates_path` or a non-default
	/// `minimum_version`.
	pub no_tls_verify: bool,

	/// TLS root certificates path, PEM encoded
	pub root_certificates_path: Option<PathBuf>,
}

/// TLS protocol versions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsVersion {
	/// TLS 1.2
	#[default]
	Tls12,
	/// TLS 1.3
	Tls13,
}

impl TLSConfig {
	/// Build a rustls [`ClientConfig`] from the custom root certificates and
	/// the minimum protocol version. Returns `None` when neither differs from
	/// the defaults, in which case the connection library's own configuration
	/// is used. Without custom roots the system trust store is loaded.
	pub async fn client_config(&self) -> Result<Option<Arc<ClientConfig>>, Error> {
		let custom_version = self.minimum_version != TlsVersion::default();
		if self.root_certificates_path.is_none() && !custom_version {
			return Ok(None);
		}
		if self.no_tls_verify {
			return Err(Error::Invalid(
				"no_tls_verify cannot be combined with root_certificates_path or minimum_version"
					.to_owned(),
			));
		}

		let roots = match &self.root_certificates_path {
			Some(path) => read_root_certificates(path).await?,
			None => native_root_certificates().await?,
		};

		let versions: &[&SupportedProtocolVersion] = match self.minimum_version {
			TlsVersion::Tls12 => &[&version::TLS13, &version::TLS12],
			TlsVersion::Tls13 => &[&version::TLS13],
		};
		let config = ClientConfig::builder()
			.with_safe_default_cipher_suites()
			.with_safe_default_kx_groups()
			.with_protocol_versions(versions)
			.map_err(|err| Error::Invalid(format!("Unsupported TLS versions: {err}")))?
			.with_root_certificates(roots)
			.with_no_client_auth();
		Ok(Some(Arc::new(config)))
	}
}

/// Load PEM encoded root certificates from `path`.
async fn read_root_certificates(path: &Path) -> Result<RootCertStore, Error> {
	let pem = tokio::fs::read(path).await?;
	let certs = rustls_pemfile::certs(&mut BufReader::new(pem.as_slice()))?;
	if certs.is_empty() {
		return Err(Error::Invalid("Root certificate file contains no certificates".to_owned()));
	}

	let mut roots = RootCertStore::empty();
	for cert in certs {
		roots
			.add(&rustls::Certificate(cert))
			.map_err(|err| Error::Invalid(format!("Could not read root certificate: {err}")))?;
	}
	Ok(roots)
}

/// Load the system trust store. Blocking, so it runs off the async workers.
async fn native_root_certificates() -> Result<RootCertStore, Error> {
	let certs = tokio::task::spawn_blocking(rustls_native_certs::load_native_certs)
		.await
		.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))??;

	let mut roots = RootCertStore::empty();
	let der: Vec<Vec<u8>> = certs.into_iter().map(|cert| cert.0).collect();
	let (added, ignored) = roots.add_parsable_certificates(&der);
	debug!("Loaded {added} system root certificates, ignored {ignored}");
	if roots.is_empty() {
		return Err(Error::Invalid("No system root certificates found".to_owned()));
	}
	Ok(roots)
}

/// The kind of directory server being talked to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Implementation {
	/// Any RFC 4511 server: OpenLDAP, 389-DS, FreeIPA and the like
	#[default]
	Custom,
	/// Microsoft Active Directory
	ActiveDirectory,
}

impl Implementation {
	/// The user filter used when none is configured
	#[must_use]
	pub fn default_users_filter(self) -> &'static str {
		match self {
			Implementation::Custom => "(&({username_attribute}={input})(objectClass=person))",
			Implementation::ActiveDirectory => {
				"(&(|({username_attribute}={input})({mail_attribute}={input}))\
				 (sAMAccountType=805306368)(!(userAccountControl:1.2.840.113556.1.4.803:=2))\
				 (!(pwdLastSet=0)))"
			}
		}
	}

	/// The group filter used when none is configured
	#[must_use]
	pub fn default_groups_filter(self) -> &'static str {
		match self {
			Implementation::Custom => "(&(member={dn})(objectClass=groupOfNames))",
			Implementation::ActiveDirectory => "(&(member={dn})(objectClass=group))",
		}
	}

	/// The username attribute used when none is configured
	#[must_use]
	pub fn default_username_attribute(self) -> &'static str {
		match self {
			Implementation::Custom => "uid",
			Implementation::ActiveDirectory => "sAMAccountName",
		}
	}
}

/// Configurable filters and bases to use for LDAP searches
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Searches {
	/// The base DN of the directory
	pub base_dn: String,
	/// Prefixed to the base DN when searching users, e.g. `ou=people`
	#[serde(default)]
	pub additional_users_dn: Option<String>,
	/// The search filter to use when looking up a user
	#[serde(default)]
	pub users_filter: Option<String>,
	/// Prefixed to the base DN when searching groups, e.g. `ou=groups`
	#[serde(default)]
	pub additional_groups_dn: Option<String>,
	/// The search filter to use when looking up a user's groups
	#[serde(default)]
	pub groups_filter: Option<String>,
}

/// Names of attributes to use for extracting relevant data. Unset names fall
/// back to the defaults of the configured [`Implementation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
	/// The attribute holding the canonical username
	pub username: Option<String>,
	/// The attribute holding the display name
	pub display_name: Option<String>,
	/// The attribute holding email addresses
	pub mail: Option<String>,
	/// The attribute holding a group's name
	pub group_name: Option<String>,
}

/// [`AttributeConfig`] with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
	/// The attribute holding the canonical username
	pub username: String,
	/// The attribute holding the display name
	pub display_name: String,
	/// The attribute holding email addresses
	pub mail: String,
	/// The attribute holding a group's name
	pub group_name: String,
}

impl AttributeConfig {
	/// Fill unset names from the implementation defaults.
	#[must_use]
	pub fn resolve(&self, implementation: Implementation) -> Attributes {
		let or = |value: &Option<String>, default: &str| {
			value.clone().unwrap_or_else(|| default.to_owned())
		};
		Attributes {
			username: or(&self.username, implementation.default_username_attribute()),
			display_name: or(&self.display_name, "displayName"),
			mail: or(&self.mail, "mail"),
			group_name: or(&self.group_name, "cn"),
		}
	}
}

impl Attributes {
	/// Returns the attributes requested in user lookups.
	#[must_use]
	pub fn user_filter(&self) -> Vec<String> {
		vec![self.username.clone(), self.display_name.clone(), self.mail.clone()]
	}

	/// Returns the attributes requested in group lookups.
	#[must_use]
	pub fn group_filter(&self) -> Vec<String> {
		vec![self.group_name.clone()]
	}
}

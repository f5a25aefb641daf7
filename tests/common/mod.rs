#![allow(dead_code)]
use std::{collections::HashMap, error::Error, sync::Arc};

use ldap3::{LdapConnAsync, SearchEntry};
use ldap_user_provider::{
	config::{AttributeConfig, Config, ConnectionConfig, Implementation, Searches},
	directory::memory::MemoryDirectory,
	LdapUserProvider,
};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};
use url::Url;

pub const PRIMARY: &str = "ldap://primary";
pub const SECONDARY: &str = "ldap://secondary";
pub const ADMIN: &str = "cn=admin,dc=example,dc=com";
pub const ADMIN_PASSWORD: &str = "secret";
pub const ALICE: &str = "uid=alice,ou=users,dc=example,dc=com";
pub const ALICE_FILTER: &str = "(&(uid=alice)(objectClass=inetOrgPerson))";
pub const ALICE_GROUPS_FILTER: &str =
	"(&(member=uid=alice,ou=users,dc=example,dc=com)(objectClass=groupOfNames))";
pub const ROOT_DSE_FILTER: &str = "(objectClass=*)";

pub fn init_tracing() {
	let tracing_filter = EnvFilter::default().add_directive(LevelFilter::DEBUG.into());
	let _ = tracing_subscriber::fmt().with_env_filter(tracing_filter).try_init();
}

pub fn config(implementation: Implementation) -> Config {
	Config {
		url: Url::parse(PRIMARY).unwrap(),
		connection: ConnectionConfig::default(),
		implementation,
		search_user: ADMIN.to_owned(),
		search_password: ADMIN_PASSWORD.to_owned(),
		searches: Searches {
			base_dn: "dc=example,dc=com".to_owned(),
			additional_users_dn: Some("ou=users".to_owned()),
			users_filter: Some("(&(uid={input})(objectClass=inetOrgPerson))".to_owned()),
			additional_groups_dn: Some("ou=groups".to_owned()),
			groups_filter: Some("(&(member={dn})(objectClass=groupOfNames))".to_owned()),
		},
		attributes: AttributeConfig {
			username: Some("uid".to_owned()),
			..AttributeConfig::default()
		},
		permit_referrals: false,
		disable_reset_password: false,
	}
}

pub fn entry(dn: &str, attrs: &[(&str, &[&str])]) -> SearchEntry {
	SearchEntry {
		dn: dn.to_owned(),
		attrs: attrs
			.iter()
			.map(|(name, values)| ((*name).to_owned(), values.iter().map(|v| (*v).to_owned()).collect()))
			.collect(),
		bin_attrs: HashMap::new(),
	}
}

pub fn alice() -> SearchEntry {
	entry(ALICE, &[
		("uid", &["alice"]),
		("displayName", &["Alice Liddell"]),
		("mail", &["alice@example.com", "liddell@example.com"]),
	])
}

/// A directory with the service account registered on both servers.
pub fn directory() -> MemoryDirectory {
	let directory = MemoryDirectory::new();
	directory.add_credentials(PRIMARY, ADMIN, ADMIN_PASSWORD);
	directory.add_credentials(SECONDARY, ADMIN, ADMIN_PASSWORD);
	directory
}

pub fn provider(config: &Config, directory: &MemoryDirectory) -> LdapUserProvider {
	LdapUserProvider::with_connector(config, None, Arc::new(directory.clone())).unwrap()
}

pub async fn ldap_add_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("ou={},dc=example,dc=org", ou),
		vec![("objectClass", ["organizationalUnit"].into())],
	)
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("ou={},dc=example,dc=org", ou)).await?.success()?;
	Ok(())
}

pub async fn ldap_connect() -> Result<ldap3::Ldap, Box<dyn Error>> {
	let (conn, mut ldap) = LdapConnAsync::new("ldap://localhost:1389").await?;
	let _handle = tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			panic!("Ldap connection error {err}");
		}
	});
	ldap.simple_bind("cn=admin,dc=example,dc=org", "adminpassword").await?;
	Ok(ldap)
}

pub async fn ldap_add_user(
	ldap: &mut ldap3::Ldap,
	cn: &str,
	password: &str,
) -> Result<(), Box<dyn Error>> {
	let mail = format!("{cn}@example.org");
	ldap.add(&format!("cn={},ou=people,dc=example,dc=org", cn), vec![
		("objectClass", ["inetOrgPerson"].into()),
		("sn", [cn].into()),
		("mail", [mail.as_str()].into()),
		("userPassword", [password].into()),
	])
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_user(ldap: &mut ldap3::Ldap, cn: &str) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("cn={},ou=people,dc=example,dc=org", cn)).await?.success()?;
	Ok(())
}

pub async fn ldap_add_group(
	ldap: &mut ldap3::Ldap,
	cn: &str,
	member: &str,
) -> Result<(), Box<dyn Error>> {
	let member = format!("cn={},ou=people,dc=example,dc=org", member);
	ldap.add(&format!("cn={},ou=groups,dc=example,dc=org", cn), vec![
		("objectClass", ["groupOfNames"].into()),
		("member", [member.as_str()].into()),
	])
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_group(ldap: &mut ldap3::Ldap, cn: &str) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("cn={},ou=groups,dc=example,dc=org", cn)).await?.success()?;
	Ok(())
}

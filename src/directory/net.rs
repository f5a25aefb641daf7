//! Connections over the network, using `ldap3`.
use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use ldap3::{
	exop::PasswordModify, parse_refs, LdapConnAsync, LdapConnSettings, LdapError, Mod,
	SearchEntry, SearchOptions, SearchResult,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::{
	Connection, Connector, DialOptions, ModifyRequest, PasswordModifyRequest, SearchOutcome,
	SearchRequest, RC_REFERRAL,
};

/// Dials directory servers over TCP, optionally with TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ldap3Connector;

#[async_trait]
impl Connector for Ldap3Connector {
	async fn dial(
		&self,
		url: &Url,
		options: &DialOptions,
	) -> Result<Box<dyn Connection>, LdapError> {
		let mut settings = LdapConnSettings::new()
			.set_conn_timeout(options.timeout)
			.set_no_tls_verify(options.no_tls_verify);
		if let Some(config) = &options.tls {
			settings = settings.set_config(config.clone());
		}

		let (ldap, driver) = open(url, settings.clone()).await?;
		Ok(Box::new(Ldap3Connection {
			url: url.clone(),
			settings,
			timeout: options.timeout,
			ldap,
			driver,
		}))
	}
}

/// Create a connection and spawn its driver.
async fn open(
	url: &Url,
	settings: LdapConnSettings,
) -> Result<(ldap3::Ldap, JoinHandle<()>), LdapError> {
	let (conn, ldap) = LdapConnAsync::from_url_with_settings(settings, url).await?;
	let driver = tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			warn!("Ldap connection error {err}");
		}
	});
	Ok((ldap, driver))
}

/// A connection handle and the task driving it
struct Ldap3Connection {
	/// Where the connection goes
	url: Url,
	/// Settings the connection was made with
	settings: LdapConnSettings,
	/// Deadline for every operation, zero for none
	timeout: Duration,
	/// The operation handle
	ldap: ldap3::Ldap,
	/// The connection driver
	driver: JoinHandle<()>,
}

impl Ldap3Connection {
	/// The handle, with the operation deadline armed for the next request.
	fn handle(&mut self) -> &mut ldap3::Ldap {
		if !self.timeout.is_zero() {
			self.ldap.with_timeout(self.timeout);
		}
		&mut self.ldap
	}
}

#[async_trait]
impl Connection for Ldap3Connection {
	async fn start_tls(&mut self) -> Result<(), LdapError> {
		// ldap3 negotiates StartTLS while connecting, so the plain connection
		// is replaced by an upgraded one before anything is sent over it.
		let settings = self.settings.clone().set_starttls(true);
		let (ldap, driver) = open(&self.url, settings.clone()).await?;
		self.close();
		self.settings = settings;
		self.ldap = ldap;
		self.driver = driver;
		Ok(())
	}

	async fn bind(&mut self, dn: &str, password: &str) -> Result<(), LdapError> {
		self.handle().simple_bind(dn, password).await?.success()?;
		Ok(())
	}

	async fn search(&mut self, request: &SearchRequest) -> Result<SearchOutcome, LdapError> {
		let options = SearchOptions::new()
			.deref(request.deref)
			.sizelimit(request.size_limit)
			.timelimit(request.time_limit);
		let SearchResult(raw, result) = self
			.handle()
			.with_search_options(options)
			.search(&request.base, request.scope, &request.filter, request.attributes.clone())
			.await?;
		if result.rc == RC_REFERRAL {
			return Err(LdapError::LdapResult { result });
		}
		result.success()?;

		let mut outcome = SearchOutcome::default();
		for entry in raw {
			if entry.is_ref() {
				outcome.referrals.extend(parse_refs(entry.0));
			} else {
				outcome.entries.push(SearchEntry::construct(entry));
			}
		}
		Ok(outcome)
	}

	async fn modify(&mut self, request: &ModifyRequest) -> Result<(), LdapError> {
		let mods = request
			.changes
			.iter()
			.map(|change| {
				Mod::Replace(
					change.attribute.as_bytes().to_vec(),
					change.values.iter().cloned().collect::<HashSet<_>>(),
				)
			})
			.collect();
		self.handle().modify(&request.dn, mods).await?.success()?;
		Ok(())
	}

	async fn password_modify(&mut self, request: &PasswordModifyRequest) -> Result<(), LdapError> {
		let exop = PasswordModify {
			user_id: Some(request.user_id.as_str()),
			old_pass: None,
			new_pass: Some(request.new_password.as_str()),
		};
		self.handle().extended(exop).await?.success()?;
		Ok(())
	}

	fn close(&mut self) {
		let mut ldap = self.ldap.clone();
		let url = self.url.clone();
		let spawned = tokio::runtime::Handle::try_current().map(|runtime| {
			runtime.spawn(async move {
				if let Err(err) = ldap.unbind().await {
					debug!("Unbind from {url} failed: {err}");
				}
			})
		});
		if spawned.is_err() {
			self.driver.abort();
		}
	}
}

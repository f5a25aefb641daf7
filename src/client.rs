//! Connecting, binding, and following referrals.
//!
//! Every read and write of the provider goes through [`DirectoryClient`], so
//! referrals are handled the same way for all of them:
//! * reads re-run the search against every referred server and merge entries
//!   not already present (by DN) into the result;
//! * writes are repeated against every referred server, but their outcome is
//!   only logged: the caller always sees the result of the primary attempt.
use std::sync::Arc;

use ldap3::SearchEntry;
use tracing::{debug, error};
use url::Url;

use crate::{
	directory::{referrals, Connector, DialOptions, SearchRequest, Session, WriteRequest},
	error::Error,
};

/// Opens sessions and performs operations with referral chasing.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
	/// Produces connections
	connector: Arc<dyn Connector>,
	/// The configured server
	url: Url,
	/// Service account DN
	search_user: String,
	/// Service account password
	search_password: String,
	/// Timeout and TLS settings
	options: DialOptions,
	/// Follow referrals
	permit_referrals: bool,
}

impl DirectoryClient {
	/// Create a new client.
	#[must_use]
	pub fn new(
		connector: Arc<dyn Connector>,
		url: Url,
		(search_user, search_password): (String, String),
		options: DialOptions,
		permit_referrals: bool,
	) -> Self {
		Self { connector, url, search_user, search_password, options, permit_referrals }
	}

	/// Open a session bound as the service account.
	pub async fn connect(&self) -> Result<Session, Error> {
		self.connect_to(&self.url, &self.search_user, &self.search_password).await
	}

	/// Open a session on the configured server bound as `dn`.
	pub async fn connect_as(&self, dn: &str, password: &str) -> Result<Session, Error> {
		self.connect_to(&self.url, dn, password).await
	}

	/// Dial `url`, upgrade the connection if configured, and bind.
	async fn connect_to(&self, url: &Url, dn: &str, password: &str) -> Result<Session, Error> {
		let conn = self
			.connector
			.dial(url, &self.options)
			.await
			.map_err(|source| Error::Unavailable { url: url.to_string(), source })?;
		// Closed on drop from here on, whichever way this returns.
		let mut session = Session::new(url.clone(), conn);

		if self.options.starttls {
			session.start_tls().await.map_err(Error::TransportUpgrade)?;
		}
		session.bind(dn, password).await.map_err(Error::bind)?;
		Ok(session)
	}

	/// Open a service account session on a referred server.
	async fn connect_referral(&self, referral: &str) -> Result<Session, Error> {
		let url = Url::parse(referral)
			.map_err(|err| Error::Invalid(format!("Malformed referral {referral}: {err}")))?;
		self.connect_to(&url, &self.search_user, &self.search_password).await
	}

	/// Search, following referrals if permitted.
	pub async fn search(
		&self,
		session: &mut Session,
		request: &SearchRequest,
	) -> Result<Vec<SearchEntry>, Error> {
		let (mut entries, targets, primary_error) = match session.search(request).await {
			Ok(outcome) => (outcome.entries, outcome.referrals, None),
			Err(err) => (Vec::new(), referrals(&err).to_vec(), Some(err)),
		};

		if !self.permit_referrals || targets.is_empty() {
			return match primary_error {
				Some(err) => Err(err.into()),
				None => Ok(entries),
			};
		}

		let mut followed = false;
		for referral in &targets {
			match self.search_referral(referral, request, &mut entries).await {
				Ok(()) => followed = true,
				Err(err) => {
					error!(
						"Failed referred search request (referred to {referral} by {}): {err}",
						session.url()
					);
				}
			}
		}

		match primary_error {
			Some(err) if !followed => Err(err.into()),
			_ => Ok(entries),
		}
	}

	/// Repeat a search on a referred server and merge new entries.
	async fn search_referral(
		&self,
		referral: &str,
		request: &SearchRequest,
		entries: &mut Vec<SearchEntry>,
	) -> Result<(), Error> {
		debug!("Attempting search on referred URL {referral}");
		let mut session = self.connect_referral(referral).await?;
		let outcome = session.search(request).await?;
		for entry in outcome.entries {
			if !entries.iter().any(|existing| existing.dn == entry.dn) {
				entries.push(entry);
			}
		}
		Ok(())
	}

	/// Write, repeating the write on referred servers if permitted. Failures on
	/// referred servers are logged; the result is always that of the primary
	/// attempt.
	pub async fn write(&self, session: &mut Session, request: &WriteRequest) -> Result<(), Error> {
		let Err(err) = session.write(request).await else {
			return Ok(());
		};

		if self.permit_referrals {
			for referral in referrals(&err) {
				debug!("Attempting {request} on referred URL {referral} (referred by {})", session.url());
				if let Err(referral_err) = self.write_referral(referral, request).await {
					error!(
						"Failed to perform {request} operation during referred request (referred to \
						 {referral}): {referral_err}"
					);
				}
			}
		}

		Err(err.into())
	}

	/// Repeat a write on a referred server.
	async fn write_referral(&self, referral: &str, request: &WriteRequest) -> Result<(), Error> {
		let mut session = self.connect_referral(referral).await?;
		Ok(session.write(request).await?)
	}
}

//! Locating a user in the directory.
use ldap3::{LdapError, SearchEntry};

use crate::{
	client::DirectoryClient,
	config::Attributes,
	directory::{SearchRequest, Session},
	entry::SearchEntryExt,
	error::{Error, RC_SIZE_LIMIT_EXCEEDED},
	settings::Settings,
};

/// The directory entry of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
	/// The DN of the entry
	pub dn: String,
	/// Canonical username
	pub username: String,
	/// Display name
	pub display_name: Option<String>,
	/// Email addresses
	pub emails: Vec<String>,
}

impl UserProfile {
	/// Converts a [`SearchEntry`] to a [`UserProfile`] using the configured
	/// attribute names.
	pub fn from_search(entry: &SearchEntry, attributes: &Attributes) -> Result<Self, Error> {
		if entry.dn.is_empty() {
			return Err(Error::Mapping("entry has no DN".to_owned()));
		}

		let username = match entry.attr_values(&attributes.username) {
			[username] => username.clone(),
			values => {
				return Err(Error::Mapping(format!(
					"expected exactly one value for attribute '{}', found {}",
					attributes.username,
					values.len()
				)))
			}
		};

		Ok(Self {
			dn: entry.dn.clone(),
			username,
			display_name: entry.attr_first(&attributes.display_name).map(String::from),
			emails: entry.attr_values(&attributes.mail).to_vec(),
		})
	}
}

/// Find the profile of the user `input` refers to.
pub(crate) async fn resolve(
	client: &DirectoryClient,
	session: &mut Session,
	settings: &Settings,
	input: &str,
) -> Result<UserProfile, Error> {
	let filter = settings.users_filter.render(input, None);
	let request =
		SearchRequest::subtree(&settings.users_base_dn, filter, settings.users_attributes.clone())
			.with_size_limit(1);

	let entries = match client.search(session, &request).await {
		Ok(entries) => entries,
		Err(Error::Ldap(LdapError::LdapResult { result }))
			if result.rc == RC_SIZE_LIMIT_EXCEEDED =>
		{
			return Err(Error::AmbiguousUser)
		}
		Err(err) => return Err(err),
	};

	match entries.as_slice() {
		[] => Err(Error::UserNotFound),
		[entry] => UserProfile::from_search(entry, &settings.attributes),
		_ => Err(Error::AmbiguousUser),
	}
}

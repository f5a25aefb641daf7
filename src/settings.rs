//! Values derived from the configuration once, when the provider is built.
use crate::{
	config::{Attributes, Config},
	error::Error,
	filter::FilterTemplate,
};

/// Placeholder for the configured username attribute name
const PLACEHOLDER_USERNAME_ATTRIBUTE: &str = "{username_attribute}";
/// Placeholder for the configured mail attribute name
const PLACEHOLDER_MAIL_ATTRIBUTE: &str = "{mail_attribute}";
/// Placeholder for the configured display name attribute name
const PLACEHOLDER_DISPLAY_NAME_ATTRIBUTE: &str = "{display_name_attribute}";

/// Search bases, templates, and attribute lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	/// Attribute names with defaults applied
	pub attributes: Attributes,
	/// Base for user lookups
	pub users_base_dn: String,
	/// Attributes requested in user lookups
	pub users_attributes: Vec<String>,
	/// User lookup filter
	pub users_filter: FilterTemplate,
	/// Base for group lookups
	pub groups_base_dn: String,
	/// Attributes requested in group lookups
	pub groups_attributes: Vec<String>,
	/// Group lookup filter
	pub groups_filter: FilterTemplate,
}

impl Settings {
	/// Derive the settings from the configuration.
	pub fn resolve(config: &Config) -> Result<Self, Error> {
		let searches = &config.searches;
		if searches.base_dn.trim().is_empty() {
			return Err(Error::Invalid("The base DN must not be empty".to_owned()));
		}

		let attributes = config.attributes.resolve(config.implementation);
		let users_filter = searches
			.users_filter
			.as_deref()
			.unwrap_or_else(|| config.implementation.default_users_filter());
		let groups_filter = searches
			.groups_filter
			.as_deref()
			.unwrap_or_else(|| config.implementation.default_groups_filter());

		Ok(Self {
			users_base_dn: join_dn(searches.additional_users_dn.as_deref(), &searches.base_dn),
			users_attributes: attributes.user_filter(),
			users_filter: FilterTemplate::new(expand_attributes(users_filter, &attributes)),
			groups_base_dn: join_dn(searches.additional_groups_dn.as_deref(), &searches.base_dn),
			groups_attributes: attributes.group_filter(),
			groups_filter: FilterTemplate::new(expand_attributes(groups_filter, &attributes)),
			attributes,
		})
	}
}

/// Prefix `base` with `additional` if set.
fn join_dn(additional: Option<&str>, base: &str) -> String {
	match additional.map(str::trim) {
		Some(additional) if !additional.is_empty() => format!("{additional},{base}"),
		_ => base.to_owned(),
	}
}

/// Replace the attribute name placeholders.
fn expand_attributes(filter: &str, attributes: &Attributes) -> String {
	filter
		.replace(PLACEHOLDER_USERNAME_ATTRIBUTE, &attributes.username)
		.replace(PLACEHOLDER_MAIL_ATTRIBUTE, &attributes.mail)
		.replace(PLACEHOLDER_DISPLAY_NAME_ATTRIBUTE, &attributes.display_name)
}

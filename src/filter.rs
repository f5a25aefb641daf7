//! Placeholder substitution for search filter templates.
//!
//! Templates are scanned once when the provider is built; rendering then only
//! performs the replacements the template actually needs.
use std::fmt::Write;

use tracing::trace;

use crate::profile::UserProfile;

/// Replaced by the username exactly as the caller typed it
pub const PLACEHOLDER_INPUT: &str = "{input}";
/// Replaced by the canonical username of a resolved profile
pub const PLACEHOLDER_USERNAME: &str = "{username}";
/// Replaced by the DN of a resolved profile
pub const PLACEHOLDER_DN: &str = "{dn}";

/// Characters with a special meaning in DNs. Raw input has these escaped in
/// addition to the filter metacharacters.
const DN_SPECIAL: &[char] = &[',', '#', '+', '<', '>', ';', '"', '='];

/// A filter template together with the placeholders it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTemplate {
	/// The template text
	template: String,
	/// Contains `{input}`
	input: bool,
	/// Contains `{username}`
	username: bool,
	/// Contains `{dn}`
	dn: bool,
}

impl FilterTemplate {
	/// Scan a template for the placeholders it contains.
	#[must_use]
	pub fn new(template: impl Into<String>) -> Self {
		let template = template.into();
		Self {
			input: template.contains(PLACEHOLDER_INPUT),
			username: template.contains(PLACEHOLDER_USERNAME),
			dn: template.contains(PLACEHOLDER_DN),
			template,
		}
	}

	/// The unrendered template
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.template
	}

	/// Whether rendering depends on a resolved profile.
	#[must_use]
	pub fn needs_profile(&self) -> bool {
		self.username || self.dn
	}

	/// Substitute the placeholders. Profile placeholders are left as-is when
	/// no profile is given.
	#[must_use]
	pub fn render(&self, input: &str, profile: Option<&UserProfile>) -> String {
		let mut filter = self.template.clone();

		if self.input {
			filter = filter.replace(PLACEHOLDER_INPUT, &escape_input(input));
		}

		if let Some(profile) = profile {
			if self.username {
				filter = filter.replace(PLACEHOLDER_USERNAME, &escape(&profile.username));
			}
			if self.dn {
				filter = filter.replace(PLACEHOLDER_DN, &escape(&profile.dn));
			}
		}

		trace!("Computed filter is {filter}");
		filter
	}
}

/// Escape a value for use inside a search filter (RFC 4515).
#[must_use]
pub fn escape(value: &str) -> String {
	ldap3::ldap_escape(value).into_owned()
}

/// Escape raw user input: filter metacharacters plus characters that are
/// special in DNs.
#[must_use]
pub fn escape_input(value: &str) -> String {
	let escaped = escape(value);
	if !escaped.contains(DN_SPECIAL) {
		return escaped;
	}

	let mut out = String::with_capacity(escaped.len() + 8);
	for c in escaped.chars() {
		if DN_SPECIAL.contains(&c) {
			// Infallible for String.
			let _ = write!(out, "\\{:02x}", u32::from(c));
		} else {
			out.push(c);
		}
	}
	out
}

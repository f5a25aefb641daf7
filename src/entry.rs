//! Helper methods for extracting data from search results.
use ldap3::SearchEntry;

/// An extension trait for [`SearchEntry`] that provides convenience methods for
/// extracting data. Attribute names are matched case-insensitively, as LDAP
/// servers do not have to echo the requested spelling.
pub trait SearchEntryExt {
	/// Get all values of an attribute. Empty if the attribute is absent.
	fn attr_values(&self, attr: &str) -> &[String];

	/// Get the first value of an attribute.
	fn attr_first(&self, attr: &str) -> Option<&str> {
		self.attr_values(attr).first().map(String::as_str)
	}

	/// Whether the entry carries any attributes at all
	fn has_attrs(&self) -> bool;
}

impl SearchEntryExt for SearchEntry {
	fn attr_values(&self, attr: &str) -> &[String] {
		if let Some(values) = self.attrs.get(attr) {
			return values.as_slice();
		}
		match self.attrs.iter().find(|(name, _)| name.eq_ignore_ascii_case(attr)) {
			Some((_, values)) => values.as_slice(),
			None => &[],
		}
	}

	fn has_attrs(&self) -> bool {
		!self.attrs.is_empty() || !self.bin_attrs.is_empty()
	}
}

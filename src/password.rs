//! Password updates.
//!
//! Which of the three ways of setting a password is used depends on the
//! directory: servers advertising the password modify extended operation get
//! that, Active Directory gets its `unicodePwd` encoding, and everything else
//! gets a plain `userPassword` replacement the server is trusted to hash.
use crate::{
	config::Implementation,
	directory::{ModifyRequest, PasswordModifyRequest, WriteRequest},
};

/// OID of the password modify extended operation (RFC 3062)
pub const OID_PASSWORD_MODIFY: &str = "1.3.6.1.4.1.4203.1.11.1";
/// The generic password attribute
pub const ATTRIBUTE_USER_PASSWORD: &str = "userPassword";
/// Active Directory's password attribute
pub const ATTRIBUTE_UNICODE_PWD: &str = "unicodePwd";

/// How passwords are changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStrategy {
	/// The password modify extended operation
	ExtendedOperation,
	/// Replacing `unicodePwd` with the quoted UTF-16LE password
	ActiveDirectory,
	/// Replacing `userPassword` with the plaintext password
	Attribute,
}

impl PasswordStrategy {
	/// Pick the strategy for a directory.
	#[must_use]
	pub fn select(supports_password_modify: bool, implementation: Implementation) -> Self {
		match (supports_password_modify, implementation) {
			(true, _) => PasswordStrategy::ExtendedOperation,
			(false, Implementation::ActiveDirectory) => PasswordStrategy::ActiveDirectory,
			(false, Implementation::Custom) => PasswordStrategy::Attribute,
		}
	}

	/// The write setting `password` for the entry `dn`.
	#[must_use]
	pub fn request(self, dn: &str, password: &str) -> WriteRequest {
		match self {
			PasswordStrategy::ExtendedOperation => {
				WriteRequest::PasswordModify(PasswordModifyRequest {
					user_id: dn.to_owned(),
					new_password: password.to_owned(),
				})
			}
			PasswordStrategy::ActiveDirectory => WriteRequest::Modify(ModifyRequest::replace(
				dn,
				ATTRIBUTE_UNICODE_PWD,
				encode_unicode_pwd(password),
			)),
			PasswordStrategy::Attribute => WriteRequest::Modify(ModifyRequest::replace(
				dn,
				ATTRIBUTE_USER_PASSWORD,
				password.as_bytes().to_vec(),
			)),
		}
	}
}

/// Encode a password for `unicodePwd`: enclosed in double quotes, as UTF-16LE.
#[must_use]
pub fn encode_unicode_pwd(password: &str) -> Vec<u8> {
	format!("\"{password}\"").encode_utf16().flat_map(u16::to_le_bytes).collect()
}

//! Error codes
use std::fmt;

use ldap3::LdapError;

/// LDAP result code for `invalidCredentials`
pub(crate) const RC_INVALID_CREDENTIALS: u32 = 49;
/// LDAP result code for `sizeLimitExceeded`
pub(crate) const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// The configuration or TLS material is unusable.
	#[error("Invalid configuration: {0}")]
	Invalid(String),
	/// Reading certificate material from disk failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// The directory server could not be reached.
	#[error("Dial to {url} failed")]
	Unavailable {
		/// The address that was dialed
		url: String,
		/// Underlying transport error
		#[source]
		source: LdapError,
	},
	/// Upgrading the connection with StartTLS failed.
	#[error("StartTLS failed")]
	TransportUpgrade(#[source] LdapError),
	/// The server rejected a bind.
	#[error("Bind failed ({kind})")]
	Bind {
		/// Whether the credentials were rejected or the directory failed
		kind: BindFailure,
		/// Underlying error
		#[source]
		source: LdapError,
	},
	/// The user's credentials could not be verified.
	#[error("Authentication failed")]
	AuthenticationFailed(#[source] Box<Error>),
	/// An empty password was supplied for verification.
	#[error("Empty password")]
	EmptyPassword,
	/// No entry matched the user lookup.
	#[error("User not found")]
	UserNotFound,
	/// More than one entry matched the user lookup.
	#[error("Multiple users found")]
	AmbiguousUser,
	/// The matched entry cannot be turned into a profile.
	#[error("Malformed user entry: {0}")]
	Mapping(String),
	/// Password resets are disabled in the configuration.
	#[error("Password reset is disabled")]
	PasswordResetDisabled,
	/// An underlying protocol error or similar occurred, or the LDAP library
	/// was used incorrectly.
	#[error(transparent)]
	Ldap(#[from] LdapError),
	/// Wraps an error with the operation and the user it was performed for.
	#[error("{operation} for user '{username}' failed")]
	Operation {
		/// The public operation that failed
		operation: Operation,
		/// The username as supplied by the caller
		username: String,
		/// Cause
		#[source]
		source: Box<Error>,
	},
}

impl Error {
	/// The classification of this error, with operation context removed.
	#[must_use]
	pub fn kind(&self) -> &Error {
		match self {
			Error::Operation { source, .. } => source.kind(),
			other => other,
		}
	}

	/// Whether the user lookup came back empty.
	#[must_use]
	pub fn is_user_not_found(&self) -> bool {
		matches!(self.kind(), Error::UserNotFound)
	}

	/// Classify a failed bind by its result code.
	pub(crate) fn bind(source: LdapError) -> Self {
		let kind = match &source {
			LdapError::LdapResult { result } if result.rc == RC_INVALID_CREDENTIALS => {
				BindFailure::InvalidCredentials
			}
			_ => BindFailure::Directory,
		};
		Error::Bind { kind, source }
	}

	/// Attach operation context.
	pub(crate) fn during(self, operation: Operation, username: &str) -> Self {
		Error::Operation { operation, username: username.to_owned(), source: Box::new(self) }
	}
}

/// Why a bind failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindFailure {
	/// The server rejected the identity/secret pair.
	InvalidCredentials,
	/// Any other failure reported by the directory.
	Directory,
}

impl fmt::Display for BindFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BindFailure::InvalidCredentials => f.write_str("invalid credentials"),
			BindFailure::Directory => f.write_str("directory error"),
		}
	}
}

/// The public operations of the provider, used as error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	/// Verifying a user's password
	CheckUserPassword,
	/// Looking up profile and groups
	GetDetails,
	/// Resetting a password
	UpdatePassword,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operation::CheckUserPassword => f.write_str("Password check"),
			Operation::GetDetails => f.write_str("Details lookup"),
			Operation::UpdatePassword => f.write_str("Password update"),
		}
	}
}

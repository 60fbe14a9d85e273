//! Delegated credentials and the redacting wrapper that carries their secrets.

// self
use crate::_prelude::*;

/// Safety margin subtracted from a credential's expiry before it is reused.
pub const EXPIRY_BUFFER: Duration = Duration::minutes(5);

/// Redacted secret wrapper keeping key material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSecret(String);
impl CredentialSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner secret value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl AsRef<str> for CredentialSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for CredentialSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("CredentialSecret").field(&"<redacted>").finish()
	}
}
impl Display for CredentialSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Short-lived signing credential issued by the identity broker.
///
/// Values are immutable once issued; a refresh replaces the whole credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	access_key_id: String,
	secret_access_key: CredentialSecret,
	session_token: Option<CredentialSecret>,
	expires_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential without a session token.
	pub fn new(
		access_key_id: impl Into<String>,
		secret_access_key: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			access_key_id: access_key_id.into(),
			secret_access_key: CredentialSecret::new(secret_access_key),
			session_token: None,
			expires_at,
		}
	}

	/// Attaches the session token that accompanies temporary credentials.
	pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
		self.session_token = Some(CredentialSecret::new(token));

		self
	}

	/// Public access key identifier.
	pub fn access_key_id(&self) -> &str {
		&self.access_key_id
	}

	/// Secret signing key.
	pub fn secret_access_key(&self) -> &CredentialSecret {
		&self.secret_access_key
	}

	/// Session token, when the broker issued one.
	pub fn session_token(&self) -> Option<&CredentialSecret> {
		self.session_token.as_ref()
	}

	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Returns `true` when the credential may be reused at `instant`, i.e. more than
	/// [`EXPIRY_BUFFER`] remains before it expires.
	///
	/// An expiry too close to the lower bound of the calendar to subtract the buffer from is
	/// never fresh.
	pub fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		self.reuse_deadline().is_some_and(|deadline| instant < deadline)
	}

	/// Last instant (exclusive) at which the credential may be reused, if representable.
	pub fn reuse_deadline(&self) -> Option<OffsetDateTime> {
		self.expires_at.checked_sub(EXPIRY_BUFFER)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_key_id", &self.access_key_id)
			.field("secret_access_key", &self.secret_access_key)
			.field("session_token", &self.session_token)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

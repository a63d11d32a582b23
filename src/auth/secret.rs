//! Secure token secret wrapper that redacts sensitive material.

// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping access and refresh tokens out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Wraps `value` after trimming, returning `None` when nothing is left.
	pub fn non_empty(value: impl AsRef<str>) -> Option<Self> {
		let trimmed = value.as_ref().trim();

		if trimmed.is_empty() { None } else { Some(Self(trimmed.to_owned())) }
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

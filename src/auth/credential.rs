//! Session credential (access + refresh token pair) and its builder.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when a relative expiry lands outside the representable time range.
	#[error("Expiry is out of range.")]
	ExpiryOutOfRange,
}

/// Access/refresh token pair plus the instant the access token stops being usable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Access token attached to every authorized call.
	pub access_token: TokenSecret,
	/// Refresh token exchanged for a new access token.
	pub refresh_token: TokenSecret,
	/// Expiry instant of the access token.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Returns a builder for assembling credentials from service responses.
	pub fn builder() -> CredentialBuilder {
		CredentialBuilder::default()
	}

	/// A credential is valid strictly before its expiry; `expires_at == instant` is expired.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at > instant
	}

	/// Checks validity against the current UTC clock.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`Credential`].
#[derive(Clone, Debug, Default)]
pub struct CredentialBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialBuilder {
	/// Provides the access token value; a blank value counts as missing.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = TokenSecret::non_blank(token);

		self
	}

	/// Provides the refresh token value; a blank value counts as missing.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = TokenSecret::non_blank(token);

		self
	}

	/// Keeps an existing refresh secret when the service did not rotate it.
	pub fn retain_refresh_token(mut self, token: &TokenSecret) -> Self {
		if self.refresh_token.is_none() {
			self.refresh_token = Some(token.clone());
		}

		self
	}

	/// Sets the instant relative expiries are measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(CredentialBuilderError::MissingRefreshToken)?;
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => self
				.issued_at
				.unwrap_or_else(OffsetDateTime::now_utc)
				.checked_add(delta)
				.ok_or(CredentialBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(CredentialBuilderError::MissingExpiry),
		};

		Ok(Credential { access_token, refresh_token, expires_at })
	}
}

//! JSON payloads exchanged with the service.
//!
//! Field names follow the service's snake_case wire format. Response types are
//! deliberately tolerant: optional fields default, and unknown fields are ignored.

pub(crate) mod timestamp;

// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialBuilderError, JobId, TokenSecret, UserIdentity},
	jobs::{Job, JobStatus},
};

/// Credential issued by the demo-token or refresh endpoints.
#[derive(Clone, Deserialize)]
pub struct CredentialPayload {
	/// New access token.
	pub access_token: String,
	/// Rotated refresh token; absent when the service keeps the previous one.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Absolute expiry.
	#[serde(default, with = "timestamp::lenient_option")]
	pub expires_at: Option<OffsetDateTime>,
	/// Relative expiry in seconds, used when `expires_at` is absent.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Token type label (`Bearer`).
	#[serde(default)]
	pub token_type: Option<String>,
}
impl CredentialPayload {
	/// Builds a [`Credential`], retaining `previous_refresh` if the payload did not rotate it.
	pub fn into_credential(
		self,
		previous_refresh: Option<&TokenSecret>,
		now: OffsetDateTime,
	) -> Result<Credential, CredentialBuilderError> {
		let mut builder = Credential::builder().access_token(self.access_token).issued_at(now);

		if let Some(refresh) = self.refresh_token {
			builder = builder.refresh_token(refresh);
		}
		if let Some(previous) = previous_refresh {
			builder = builder.retain_refresh_token(previous);
		}
		if let Some(instant) = self.expires_at {
			builder = builder.expires_at(instant);
		}
		if let Some(secs) = self.expires_in {
			builder = builder.expires_in(Duration::seconds(secs));
		}

		builder.build()
	}
}
impl Debug for CredentialPayload {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPayload")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("expires_in", &self.expires_in)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Body of the refresh call.
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
	/// Refresh token being exchanged.
	pub refresh_token: &'a str,
}

/// Response of the verify endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct VerifyResponse {
	/// Identity behind the presented access token.
	pub user: UserIdentity,
}

/// Acknowledgement of an upload.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmittedJob {
	/// Identifier of the created job.
	pub job_id: JobId,
	/// Service message.
	#[serde(default)]
	pub message: String,
}

/// Acknowledgement of a processing request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProcessingAccepted {
	/// Job being processed.
	pub job_id: JobId,
	/// Worker task identifier.
	#[serde(default)]
	pub task_id: Option<String>,
	/// Status right after queueing.
	#[serde(default = "JobStatus::submitted")]
	pub status: JobStatus,
	/// Service message.
	#[serde(default)]
	pub message: String,
}

/// Acknowledgement of a cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CancelAck {
	/// Cancelled job.
	pub job_id: JobId,
	/// Status after cancellation.
	pub status: JobStatus,
	/// Service message.
	#[serde(default)]
	pub message: String,
}

/// AI enhancement results of a completed job.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AiEnhancements {
	/// Enhanced job.
	pub job_id: JobId,
	/// Raw enhancement report.
	#[serde(default)]
	pub ai_enhancements: serde_json::Value,
	/// Enhancements that were applied; empty when the enhancer failed.
	#[serde(default)]
	pub enhancement_summary: Vec<serde_json::Value>,
}

/// Dry-run preview of what processing would change.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ProcessingPreview {
	/// Previewed job.
	pub job_id: JobId,
	/// Preview produced by the editing engine.
	#[serde(default)]
	pub preview: serde_json::Value,
}

/// Response of the job listing endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct JobList {
	/// Jobs known to the service.
	#[serde(default)]
	pub jobs: Vec<Job>,
	/// Total count before the service applied its own limit.
	#[serde(default)]
	pub total: usize,
}

/// Error body returned by the service.
#[derive(Clone, Debug, Deserialize)]
pub struct ErrorBody {
	/// Human-readable error.
	pub error: String,
}
impl ErrorBody {
	/// Extracts the `error` field from a raw body, if present.
	pub fn message_from(body: &[u8]) -> Option<String> {
		serde_json::from_slice::<Self>(body).ok().map(|payload| payload.error)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn refresh_payload_keeps_previous_refresh_token() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let payload: CredentialPayload =
			serde_json::from_str(r#"{"access_token":"a2","expires_in":3600}"#)
				.expect("Refresh payload should decode.");
		let credential = payload
			.into_credential(Some(&TokenSecret::new("r1")), now)
			.expect("Credential should build from refresh payload.");

		assert_eq!(credential.access_token.expose(), "a2");
		assert_eq!(credential.refresh_token.expose(), "r1");
		assert_eq!(credential.expires_at, now + Duration::hours(1));
	}

	#[test]
	fn demo_token_payload_prefers_absolute_expiry() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let payload: CredentialPayload = serde_json::from_str(
			r#"{"access_token":"a","refresh_token":"r","expires_at":"2025-06-01T13:00:00","expires_in":60,"token_type":"Bearer"}"#,
		)
		.expect("Demo-token payload should decode.");
		let credential =
			payload.into_credential(None, now).expect("Credential should build from payload.");

		assert_eq!(credential.expires_at, macros::datetime!(2025-06-01 13:00 UTC));
		assert_eq!(credential.refresh_token.expose(), "r");
	}

	#[test]
	fn missing_refresh_token_without_fallback_fails() {
		let payload: CredentialPayload =
			serde_json::from_str(r#"{"access_token":"a","expires_in":60}"#)
				.expect("Payload should decode.");

		assert_eq!(
			payload.into_credential(None, OffsetDateTime::now_utc()),
			Err(CredentialBuilderError::MissingRefreshToken)
		);
	}

	#[test]
	fn error_body_message_is_optional() {
		assert_eq!(ErrorBody::message_from(br#"{"error":"Job not found"}"#).as_deref(), Some("Job not found"));
		assert_eq!(ErrorBody::message_from(b"<html>"), None);
	}
}

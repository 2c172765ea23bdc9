//! Response classification shared by the gateway and the lifecycle manager.
//!
//! Classification works on crate-owned [`ApiResponse`] values, so it never depends on the
//! HTTP stack. The service's `{"error": "..."}` body becomes the error message; other bodies
//! are previewed and truncated.

// self
use crate::{_prelude::*, api::ErrorBody, http::ApiResponse};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Status the service uses for missing or rejected credentials.
pub const UNAUTHORIZED: u16 = 401;

/// Passes 2xx responses through and maps everything else onto [`Error`].
///
/// - 400, 409, 413, 415, 422 → [`Error::Validation`]
/// - 429 and 5xx → [`Error::Server`], carrying any `Retry-After` hint
/// - other statuses (401, 403, 404, …) → [`Error::Rejected`]
pub fn classify(response: ApiResponse) -> Result<ApiResponse> {
	if response.is_success() {
		return Ok(response);
	}

	let status = response.status();
	let message = error_message(&response);

	Err(match status {
		400 | 409 | 413 | 415 | 422 => Error::Validation { reason: message },
		429 | 500..=599 =>
			Error::Server { status, message, retry_after: response.metadata.retry_after },
		_ => Error::Rejected { status, message },
	})
}

/// Extracts a human-readable message from an error response.
pub fn error_message(response: &ApiResponse) -> String {
	if let Some(message) = ErrorBody::message_from(&response.body) {
		return message;
	}

	let preview = truncate_preview(String::from_utf8_lossy(&response.body).trim().to_owned());

	if preview.is_empty() { format!("HTTP {}", response.status()) } else { preview }
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

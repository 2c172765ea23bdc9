//! Service descriptor: where the backing service lives and how the client paces itself.
//!
//! Descriptors are validated on construction (builder or JSON) and are plain data, so the
//! same value can be shared by the lifecycle manager, the gateway, and the poller.

/// Builder API for assembling service descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Endpoint paths, relative to [`ServiceDescriptor::base_url`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEndpoints {
	/// Issues a fresh credential pair.
	pub issue: String,
	/// Exchanges a refresh token for a new credential.
	pub refresh: String,
	/// Returns the identity behind the presented access token.
	pub verify: String,
	/// Accepts job uploads.
	pub upload: String,
	/// Queues an uploaded job for processing (`{process}/{job_id}`).
	pub process: String,
	/// Reports job status (`{status}/{job_id}`).
	pub status: String,
	/// Lists jobs; cancellation lives under `{jobs}/{job_id}/cancel`.
	pub jobs: String,
	/// Serves finished artifacts (`{download}/{job_id}`).
	pub download: String,
	/// Transcript of a processed job (`{transcription}/{job_id}`).
	pub transcription: String,
	/// AI enhancement results of a completed job (`{ai_enhancements}/{job_id}`).
	pub ai_enhancements: String,
	/// Dry-run preview of an uploaded job (`{preview}/{job_id}`).
	pub preview: String,
}
impl Default for ServiceEndpoints {
	fn default() -> Self {
		Self {
			issue: "/auth/demo-token".into(),
			refresh: "/auth/refresh".into(),
			verify: "/auth/verify".into(),
			upload: "/upload".into(),
			process: "/process".into(),
			status: "/status".into(),
			jobs: "/jobs".into(),
			download: "/download".into(),
			transcription: "/transcription".into(),
			ai_enhancements: "/ai-enhancements".into(),
			preview: "/preview".into(),
		}
	}
}

/// Immutable, validated client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
	/// Root URL every endpoint path is resolved against.
	pub base_url: Url,
	/// Endpoint paths.
	#[serde(default)]
	pub endpoints: ServiceEndpoints,
	/// Upper bound for a single HTTP call.
	#[serde(default = "ServiceDescriptor::default_request_timeout", with = "duration_ms")]
	pub request_timeout: Duration,
	/// Delay between job status fetches.
	#[serde(default = "ServiceDescriptor::default_poll_interval", with = "duration_ms")]
	pub poll_interval: Duration,
	/// How many jobs [`crate::jobs::JobsClient::list_recent`] keeps by default.
	#[serde(default = "ServiceDescriptor::default_recent_jobs_limit")]
	pub recent_jobs_limit: usize,
}
impl ServiceDescriptor {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ServiceDescriptorBuilder {
		ServiceDescriptorBuilder::new(base_url)
	}

	/// Decodes a JSON configuration document and validates it.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let descriptor: Self = serde_json::from_slice(bytes).map_err(|e| {
			ServiceDescriptorError::Malformed { message: e.to_string() }
		})?;

		descriptor.validate()?;

		Ok(descriptor)
	}

	/// Resolves an endpoint path (plus optional trailing segments) against the base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let mut base = self.base_url.clone();

		if !base.path().ends_with('/') {
			let with_slash = format!("{}/", base.path());

			base.set_path(&with_slash);
		}

		base.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidEndpoint { path: path.to_owned(), source })
	}

	fn default_request_timeout() -> Duration {
		Duration::minutes(5)
	}

	pub(crate) fn default_poll_interval() -> Duration {
		Duration::seconds(2)
	}

	fn default_recent_jobs_limit() -> usize {
		10
	}
}

mod duration_ms {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_milliseconds().clamp(0, i64::MAX as i128) as i64)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = u64::deserialize(deserializer)?;

		Ok(Duration::milliseconds(i64::try_from(millis).unwrap_or(i64::MAX)))
	}
}

//! Background job model and the backend operations that create and observe jobs.

// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::{
	_prelude::*,
	api::{
		AiEnhancements, CancelAck, JobList, ProcessingAccepted, ProcessingPreview, SubmittedJob,
		VerifyResponse, timestamp,
	},
	auth::{JobId, UserIdentity},
	gateway::RequestGateway,
	http::ApiRequest,
	service::ServiceEndpoints,
};

/// Lifecycle state of a job.
///
/// `Submitted → Processing → {Completed, Failed, Cancelled}`; the last three are terminal.
/// The service reports several spellings per state (its own plus raw task-queue states),
/// which all collapse onto one variant. Unrecognized values decode as [`JobStatus::Unknown`]
/// and keep the job under observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobStatus {
	/// Uploaded or queued, not yet picked up.
	Submitted,
	/// A worker is processing the job.
	Processing,
	/// Finished successfully; the artifact can be downloaded.
	Completed,
	/// Finished with an error.
	Failed,
	/// Cancelled before completion.
	Cancelled,
	/// Status string this crate does not recognize.
	Unknown,
}
impl JobStatus {
	/// Maps a wire value onto a status, case-insensitively.
	pub fn from_wire(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"submitted" | "uploaded" | "queued" | "pending" => Self::Submitted,
			"processing" | "started" | "progress" | "retry" => Self::Processing,
			"completed" | "success" => Self::Completed,
			"failed" | "failure" => Self::Failed,
			"cancelled" | "canceled" | "revoked" => Self::Cancelled,
			_ => Self::Unknown,
		}
	}

	/// Returns the canonical wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Submitted => "submitted",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::Cancelled => "cancelled",
			Self::Unknown => "unknown",
		}
	}

	/// `true` once no further status change can happen.
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
	}

	pub(crate) fn submitted() -> Self {
		Self::Submitted
	}
}
impl Display for JobStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl Serialize for JobStatus {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}
impl<'de> Deserialize<'de> for JobStatus {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Option::<String>::deserialize(deserializer)?
			.map_or(Self::Unknown, |raw| Self::from_wire(&raw)))
	}
}

/// Observed state of a background job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
	/// Job identifier.
	pub job_id: JobId,
	/// Current status.
	pub status: JobStatus,
	/// Completion percentage, clamped to `0..=100`.
	#[serde(default, deserialize_with = "clamped_progress")]
	pub progress: u8,
	/// Service message.
	#[serde(default, deserialize_with = "null_as_empty")]
	pub message: String,
	/// Creation instant, when the service knows it.
	#[serde(default, with = "timestamp::lenient_option")]
	pub created_at: Option<OffsetDateTime>,
	/// Last update instant.
	#[serde(default, with = "timestamp::lenient_option")]
	pub updated_at: Option<OffsetDateTime>,
	/// Completion instant.
	#[serde(default, with = "timestamp::lenient_option")]
	pub completed_at: Option<OffsetDateTime>,
	/// Failure description for failed jobs.
	#[serde(default)]
	pub error: Option<String>,
}
impl Job {
	/// Shorthand for `self.status.is_terminal()`.
	pub fn is_terminal(&self) -> bool {
		self.status.is_terminal()
	}
}

fn clamped_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or_default();

	Ok(if raw.is_nan() { 0 } else { raw.clamp(0., 100.).round() as u8 })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pre-encoded upload payload (typically `multipart/form-data`).
#[derive(Clone, PartialEq, Eq)]
pub struct UploadBody {
	content_type: String,
	bytes: Vec<u8>,
}
impl UploadBody {
	/// Validates and wraps an encoded body.
	pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
		let content_type = content_type.into();

		if content_type.trim().is_empty() {
			return Err(Error::Validation { reason: "upload content type is missing".into() });
		}
		if bytes.is_empty() {
			return Err(Error::Validation { reason: "upload body is empty".into() });
		}

		Ok(Self { content_type, bytes })
	}

	/// MIME type of the body.
	pub fn content_type(&self) -> &str {
		&self.content_type
	}

	/// Encoded size in bytes.
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	/// Always `false`; empty bodies are rejected by [`UploadBody::new`].
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}
impl Debug for UploadBody {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UploadBody")
			.field("content_type", &self.content_type)
			.field("len", &self.bytes.len())
			.finish()
	}
}

/// Backend operations, all routed through the [`RequestGateway`].
#[derive(Clone, Debug)]
pub struct JobsClient {
	gateway: RequestGateway,
}
impl JobsClient {
	/// Wraps a gateway.
	pub fn new(gateway: RequestGateway) -> Self {
		Self { gateway }
	}

	/// Gateway used for every call.
	pub fn gateway(&self) -> &RequestGateway {
		&self.gateway
	}

	/// Identity behind the stored access token.
	pub async fn verify_identity(&self) -> Result<UserIdentity> {
		let response = self.gateway.send(ApiRequest::get(&self.endpoints().verify)).await?;

		Ok(response.json::<VerifyResponse>()?.user)
	}

	/// Uploads a job input.
	pub async fn submit(&self, upload: UploadBody) -> Result<SubmittedJob> {
		let request = ApiRequest::post(&self.endpoints().upload)
			.with_body(upload.content_type, upload.bytes);

		self.gateway.send(request).await?.json()
	}

	/// Queues an uploaded job for processing with free-form options.
	pub async fn process(
		&self,
		job_id: &JobId,
		options: &serde_json::Value,
	) -> Result<ProcessingAccepted> {
		let path = join_path(&self.endpoints().process, &[job_id.as_ref()]);
		let request = if options.is_null() {
			ApiRequest::post(path).with_json(&serde_json::json!({}))?
		} else {
			ApiRequest::post(path).with_json(options)?
		};

		self.gateway.send(request).await?.json()
	}

	/// Current status of a job.
	pub async fn status(&self, job_id: &JobId) -> Result<Job> {
		let path = join_path(&self.endpoints().status, &[job_id.as_ref()]);

		self.gateway.send(ApiRequest::get(path)).await?.json()
	}

	/// Most recent jobs, newest first.
	///
	/// `None` uses the descriptor's `recent_jobs_limit`. The result is truncated locally even
	/// if the service ignores the `limit` parameter.
	pub async fn list_recent(&self, limit: Option<usize>) -> Result<Vec<Job>> {
		let limit = limit.unwrap_or(self.gateway.lifecycle().descriptor().recent_jobs_limit);

		if limit == 0 {
			return Err(Error::Validation { reason: "the recent jobs limit must be at least 1".into() });
		}

		let request = ApiRequest::get(&self.endpoints().jobs).with_query("limit", limit);
		let mut jobs = self.gateway.send(request).await?.json::<JobList>()?.jobs;

		jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		jobs.truncate(limit);

		Ok(jobs)
	}

	/// Downloads the artifact of a completed job.
	pub async fn download(&self, job_id: &JobId) -> Result<Vec<u8>> {
		let path = join_path(&self.endpoints().download, &[job_id.as_ref()]);

		Ok(self.gateway.send(ApiRequest::get(path)).await?.body)
	}

	/// Cancels a queued or running job.
	pub async fn cancel(&self, job_id: &JobId) -> Result<CancelAck> {
		let path = join_path(&self.endpoints().jobs, &[job_id.as_ref(), "cancel"]);

		self.gateway.send(ApiRequest::post(path)).await?.json()
	}

	/// Transcript of a processed job, as the service reports it.
	pub async fn transcription(&self, job_id: &JobId) -> Result<serde_json::Value> {
		let path = join_path(&self.endpoints().transcription, &[job_id.as_ref()]);

		self.gateway.send(ApiRequest::get(path)).await?.json()
	}

	/// AI enhancement results; the service answers 400 until the job has completed.
	pub async fn ai_enhancements(&self, job_id: &JobId) -> Result<AiEnhancements> {
		let path = join_path(&self.endpoints().ai_enhancements, &[job_id.as_ref()]);

		self.gateway.send(ApiRequest::get(path)).await?.json()
	}

	/// Preview of an uploaded, not yet processed job.
	pub async fn preview(&self, job_id: &JobId) -> Result<ProcessingPreview> {
		let path = join_path(&self.endpoints().preview, &[job_id.as_ref()]);

		self.gateway.send(ApiRequest::get(path)).await?.json()
	}

	fn endpoints(&self) -> &ServiceEndpoints {
		&self.gateway.lifecycle().descriptor().endpoints
	}
}

fn join_path(base: &str, segments: &[&str]) -> String {
	let mut path = base.trim_end_matches('/').to_owned();

	for segment in segments {
		path.push('/');
		path.push_str(segment);
	}

	path
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn wire_statuses_collapse_onto_variants() {
		for (raw, expected) in [
			("queued", JobStatus::Submitted),
			("PENDING", JobStatus::Submitted),
			("uploaded", JobStatus::Submitted),
			("STARTED", JobStatus::Processing),
			("progress", JobStatus::Processing),
			("SUCCESS", JobStatus::Completed),
			("completed", JobStatus::Completed),
			("FAILURE", JobStatus::Failed),
			("REVOKED", JobStatus::Cancelled),
			("mystery", JobStatus::Unknown),
		] {
			assert_eq!(JobStatus::from_wire(raw), expected, "{raw} should map to {expected}");
		}

		assert!(JobStatus::Completed.is_terminal());
		assert!(JobStatus::Failed.is_terminal());
		assert!(JobStatus::Cancelled.is_terminal());
		assert!(!JobStatus::Processing.is_terminal());
		assert!(!JobStatus::Unknown.is_terminal());
	}

	#[test]
	fn job_decodes_service_status_payload() {
		let job: Job = serde_json::from_str(
			r#"{
				"job_id": "job_1",
				"status": "processing",
				"progress": 150.4,
				"message": null,
				"created_at": "2025-06-01T12:00:00.123456",
				"updated_at": null,
				"task_id": "celery-1",
				"result": {}
			}"#,
		)
		.expect("Status payload should decode.");

		assert_eq!(job.job_id.as_ref(), "job_1");
		assert_eq!(job.status, JobStatus::Processing);
		assert_eq!(job.progress, 100);
		assert_eq!(job.message, "");
		assert!(job.created_at.is_some());
		assert!(job.updated_at.is_none());
		assert!(!job.is_terminal());

		let negative: Job =
			serde_json::from_str(r#"{"job_id":"job_2","status":"queued","progress":-3}"#)
				.expect("Minimal payload should decode.");

		assert_eq!(negative.progress, 0);
		assert!(negative.created_at.is_none());
	}

	#[test]
	fn upload_body_requires_content() {
		assert!(matches!(
			UploadBody::new("multipart/form-data; boundary=x", Vec::new()),
			Err(Error::Validation { .. })
		));
		assert!(matches!(UploadBody::new(" ", b"data".to_vec()), Err(Error::Validation { .. })));

		let body = UploadBody::new("application/octet-stream", b"data".to_vec())
			.expect("Non-empty body should be accepted.");

		assert_eq!(body.len(), 4);
		assert_eq!(format!("{body:?}"), "UploadBody { content_type: \"application/octet-stream\", len: 4 }");
	}

	#[test]
	fn paths_join_segments() {
		assert_eq!(join_path("/jobs/", &["job_1", "cancel"]), "/jobs/job_1/cancel");
		assert_eq!(join_path("/status", &["job_1"]), "/status/job_1");
	}
}

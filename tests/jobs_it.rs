#![cfg(all(feature = "test", feature = "reqwest"))]

// crates.io
use httpmock::prelude::*;
// self
use easyedit_session::{
	_preludet::*,
	auth::JobId,
	client::Client,
	jobs::{JobStatus, UploadBody},
	store::MemoryStore,
};

fn signed_in(server: &MockServer) -> (MemoryStore, Client) {
	let store = MemoryStore::with_session(session_record(
		"access-1",
		"refresh-1",
		OffsetDateTime::now_utc() + Duration::hours(1),
	));
	let client = reqwest_client(&server.base_url(), &store);

	(store, client)
}

fn job_id(raw: &str) -> JobId {
	JobId::new(raw).expect("Fixture job id should be valid.")
}

#[tokio::test]
async fn list_recent_sorts_newest_first_and_keeps_the_default_window() {
	let server = MockServer::start_async().await;
	let jobs = (0..12)
		.map(|i| {
			serde_json::json!({
				"job_id": format!("job_{i}"),
				"status": "completed",
				"progress": 100,
				"message": "Done",
				"created_at": format!("2025-06-01T12:{:02}:00", i * 3),
			})
		})
		.chain([serde_json::json!({
			"job_id": "job_undated",
			"status": "queued",
			"progress": 0,
			"message": "Waiting",
			"created_at": null,
		})])
		.collect::<Vec<_>>();
	let body = serde_json::json!({ "jobs": jobs, "total": 13, "filters": {} }).to_string();
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/jobs")
				.query_param("limit", "10")
				.header("authorization", "Bearer access-1");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;
	let (_store, client) = signed_in(&server);
	let recent = client.jobs().list_recent(None).await.expect("Recent jobs should load.");

	mock.assert_calls_async(1).await;
	assert_eq!(recent.len(), 10);
	assert_eq!(recent[0].job_id, job_id("job_11"));
	assert_eq!(recent[9].job_id, job_id("job_2"));
	assert!(recent.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
}

#[tokio::test]
async fn list_recent_places_undated_jobs_last() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/jobs").query_param("limit", "3");
			then.status(200).header("content-type", "application/json").body(
				r#"{"jobs":[
					{"job_id":"job_a","status":"queued","created_at":null},
					{"job_id":"job_b","status":"processing","progress":40,"created_at":"2025-06-01T08:00:00"},
					{"job_id":"job_c","status":"completed","progress":100,"created_at":"2025-06-02T08:00:00+00:00"}
				],"total":3}"#,
			);
		})
		.await;

	let (_store, client) = signed_in(&server);
	let recent = client.jobs().list_recent(Some(3)).await.expect("Recent jobs should load.");
	let order = recent.iter().map(|job| job.job_id.as_ref().to_owned()).collect::<Vec<_>>();

	assert_eq!(order, ["job_c", "job_b", "job_a"]);
	assert!(matches!(client.jobs().list_recent(Some(0)).await, Err(Error::Validation { .. })));
}

#[tokio::test]
async fn submit_process_and_status_follow_the_service_contract() {
	let server = MockServer::start_async().await;
	let upload = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/upload")
				.header("content-type", "application/octet-stream")
				.header("authorization", "Bearer access-1")
				.body("video-bytes");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"job_id":"job_42","message":"File uploaded successfully"}"#);
		})
		.await;
	let process = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/process/job_42")
				.header("content-type", "application/json")
				.body(r#"{"silence_threshold":-40}"#);
			then.status(200).header("content-type", "application/json").body(
				r#"{"job_id":"job_42","task_id":"celery-9","status":"queued","message":"Processing started"}"#,
			);
		})
		.await;
	let status = server
		.mock_async(|when, then| {
			when.method(GET).path("/status/job_42");
			then.status(200).header("content-type", "application/json").body(
				r#"{"job_id":"job_42","status":"STARTED","progress":12.6,"message":"Transcribing","created_at":"2025-06-01T12:00:00.250000"}"#,
			);
		})
		.await;
	let (_store, client) = signed_in(&server);
	let body = UploadBody::new("application/octet-stream", b"video-bytes".to_vec())
		.expect("Upload body should be accepted.");
	let submitted = client.jobs().submit(body).await.expect("Upload should succeed.");

	assert_eq!(submitted.job_id, job_id("job_42"));

	let accepted = client
		.jobs()
		.process(&submitted.job_id, &serde_json::json!({ "silence_threshold": -40 }))
		.await
		.expect("Processing should be queued.");

	assert_eq!(accepted.status, JobStatus::Submitted);
	assert_eq!(accepted.task_id.as_deref(), Some("celery-9"));

	let job = client.jobs().status(&submitted.job_id).await.expect("Status should load.");

	assert_eq!(job.status, JobStatus::Processing);
	assert_eq!(job.progress, 13);
	assert_eq!(job.message, "Transcribing");
	upload.assert_calls_async(1).await;
	process.assert_calls_async(1).await;
	status.assert_calls_async(1).await;
}

#[tokio::test]
async fn submit_and_watch_starts_polling_the_new_job() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/upload");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"job_id":"job_7","message":"File uploaded successfully"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/process/job_7").body("{}");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"job_id":"job_7","status":"queued","message":"Processing started"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/status/job_7");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"job_id":"job_7","status":"SUCCESS","progress":100,"message":"Done"}"#);
		})
		.await;

	let (_store, client) = signed_in(&server);
	let mut current = client.poller().watch();
	let body = UploadBody::new("application/octet-stream", b"clip".to_vec())
		.expect("Upload body should be accepted.");
	let (submitted, handle) = client
		.submit_and_watch(body, &serde_json::Value::Null)
		.await
		.expect("Submit and watch should succeed.");

	assert_eq!(handle.job_id(), &submitted.job_id);

	current
		.wait_for(|job| job.as_ref().is_some_and(|job| job.is_terminal()))
		.await
		.expect("Poller should observe the finished job.");

	assert!(!client.poller().is_polling());
}

#[tokio::test]
async fn download_and_cancel_use_job_scoped_paths() {
	let server = MockServer::start_async().await;
	let download = server
		.mock_async(|when, then| {
			when.method(GET).path("/download/job_9");
			then.status(200).header("content-type", "video/mp4").body("mp4-bytes");
		})
		.await;
	let cancel = server
		.mock_async(|when, then| {
			when.method(POST).path("/jobs/job_9/cancel");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"job_id":"job_9","status":"cancelled","message":"Job cancelled"}"#);
		})
		.await;
	let (_store, client) = signed_in(&server);
	let bytes = client.jobs().download(&job_id("job_9")).await.expect("Download should succeed.");

	assert_eq!(bytes, b"mp4-bytes");

	let ack = client.jobs().cancel(&job_id("job_9")).await.expect("Cancel should succeed.");

	assert_eq!(ack.status, JobStatus::Cancelled);
	download.assert_calls_async(1).await;
	cancel.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_job_is_rejected_with_the_service_message() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/status/job_missing");
			then.status(404)
				.header("content-type", "application/json")
				.body(r#"{"error":"Job not found"}"#);
		})
		.await;

	let (_store, client) = signed_in(&server);

	match client.jobs().status(&job_id("job_missing")).await {
		Err(Error::Rejected { status, message }) => {
			assert_eq!(status, 404);
			assert_eq!(message, "Job not found");
		},
		other => panic!("Unexpected outcome: {other:?}"),
	}
}

#[tokio::test]
async fn identity_is_verified_with_the_stored_token() {
	let server = MockServer::start_async().await;
	let verify = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/verify").header("authorization", "Bearer access-1");
			then.status(200)
				.header("content-type", "application/json")
				.body(serde_json::json!({ "valid": true, "user": demo_identity() }).to_string());
		})
		.await;
	let (_store, client) = signed_in(&server);
	let identity = client.jobs().verify_identity().await.expect("Verify should succeed.");

	assert_eq!(identity, demo_identity());
	verify.assert_calls_async(1).await;
}

#[tokio::test]
async fn result_reads_use_job_scoped_paths() {
	let server = MockServer::start_async().await;
	let transcription = server
		.mock_async(|when, then| {
			when.method(GET).path("/transcription/job_5").header("authorization", "Bearer access-1");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"message":"Transcription data would be returned here"}"#);
		})
		.await;
	let enhancements = server
		.mock_async(|when, then| {
			when.method(GET).path("/ai-enhancements/job_5");
			then.status(200).header("content-type", "application/json").body(
				r#"{"job_id":"job_5","ai_enhancements":{"success":true,"applied_enhancements":["filler_words"]},"enhancement_summary":["filler_words"]}"#,
			);
		})
		.await;
	let preview = server
		.mock_async(|when, then| {
			when.method(GET).path("/preview/job_5");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"job_id":"job_5","preview":{"cuts":3}}"#);
		})
		.await;
	let (_store, client) = signed_in(&server);
	let job = job_id("job_5");
	let transcript = client.jobs().transcription(&job).await.expect("Transcription should load.");

	assert_eq!(transcript["message"], "Transcription data would be returned here");

	let report = client.jobs().ai_enhancements(&job).await.expect("Enhancements should load.");

	assert_eq!(report.job_id, job);
	assert_eq!(report.enhancement_summary, [serde_json::json!("filler_words")]);
	assert_eq!(report.ai_enhancements["success"], true);

	let dry_run = client.jobs().preview(&job).await.expect("Preview should load.");

	assert_eq!(dry_run.preview["cuts"], 3);
	transcription.assert_calls_async(1).await;
	enhancements.assert_calls_async(1).await;
	preview.assert_calls_async(1).await;
}

#[tokio::test]
async fn enhancements_before_completion_are_a_validation_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/ai-enhancements/job_6");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"Job status is processing, enhancements not available"}"#);
		})
		.await;

	let (_store, client) = signed_in(&server);

	match client.jobs().ai_enhancements(&job_id("job_6")).await {
		Err(Error::Validation { reason }) =>
			assert_eq!(reason, "Job status is processing, enhancements not available"),
		other => panic!("Unexpected outcome: {other:?}"),
	}
}

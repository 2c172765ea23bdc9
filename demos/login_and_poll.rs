//! Demonstrates a full session against a mocked service: demo login, upload, processing, and
//! polling the job until it finishes, with the session persisted to a file store.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use easyedit_session::{
	client::Client,
	http::ReqwestTransport,
	jobs::UploadBody,
	poll::PollEvent,
	reqwest,
	service::ServiceDescriptor,
	store::FileStore,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/demo-token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\"expires_in\":3600,\"token_type\":\"Bearer\"}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/verify");
			then.status(200).header("content-type", "application/json").body(
				"{\"valid\":true,\"user\":{\"user_id\":\"demo_user\",\"email\":\"demo@easyedit.com\",\"role\":\"admin\",\"has_api_key\":true}}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/upload");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"job_id\":\"job_demo\",\"message\":\"File uploaded successfully\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/process/job_demo");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"job_id\":\"job_demo\",\"status\":\"queued\",\"message\":\"Processing started\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/status/job_demo");
			then.status(200).header("content-type", "application/json").body(
				"{\"job_id\":\"job_demo\",\"status\":\"SUCCESS\",\"progress\":100,\"message\":\"Done\",\"created_at\":\"2025-06-01T12:00:00\"}",
			);
		})
		.await;

	let descriptor = Arc::new(
		ServiceDescriptor::builder(Url::parse(&server.base_url())?)
			.poll_interval(time::Duration::milliseconds(500))
			.build()?,
	);
	// The mock server presents a self-signed certificate.
	let transport = ReqwestTransport::with_client(
		reqwest::Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
		descriptor.clone(),
	);
	let store_path = env::temp_dir().join("easyedit_session_demo.json");
	let client = Client::with_transport(
		descriptor,
		Arc::new(FileStore::open(&store_path)?),
		Arc::new(transport),
	);
	let session = client.login().await?;

	if let Some(identity) = session.identity() {
		println!("Signed in as {} ({}).", identity.user_id, identity.role);
	}

	let mut events = client.poller().subscribe();
	let upload = UploadBody::new("application/octet-stream", b"demo clip".to_vec())?;
	let (submitted, _handle) = client.submit_and_watch(upload, &serde_json::Value::Null).await?;

	println!("Submitted {}: {}", submitted.job_id, submitted.message);

	loop {
		match events.recv().await? {
			PollEvent::Updated(job) => println!("{} is {} at {}%.", job.job_id, job.status, job.progress),
			PollEvent::Finished(job) => {
				println!("{} finished as {}.", job.job_id, job.status);

				break;
			},
			PollEvent::TickFailed { error, .. } => println!("Tick failed, retrying: {error}."),
			PollEvent::Abandoned { error, .. } => {
				println!("Polling abandoned: {error}.");

				break;
			},
		}
	}

	client.logout().await?;

	Ok(())
}

//! Facade wiring the store, lifecycle manager, gateway, jobs client, and poller together.

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use crate::{
	_prelude::*,
	api::SubmittedJob,
	auth::Session,
	gateway::RequestGateway,
	http::ApiTransport,
	jobs::{JobsClient, UploadBody},
	lifecycle::TokenLifecycleManager,
	poll::{JobPollingCoordinator, PollHandle},
	service::ServiceDescriptor,
	store::CredentialStore,
};

/// One session against the service: a lifecycle manager plus everything built on it.
///
/// Every component is also constructible on its own; the facade only saves the wiring.
#[derive(Debug)]
pub struct Client {
	lifecycle: TokenLifecycleManager,
	gateway: RequestGateway,
	jobs: JobsClient,
	poller: JobPollingCoordinator,
}
impl Client {
	/// Builds the reqwest-backed stack for the descriptor.
	#[cfg(feature = "reqwest")]
	pub fn new(descriptor: ServiceDescriptor, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let descriptor = Arc::new(descriptor);
		let transport = Arc::new(ReqwestTransport::new(descriptor.clone())?);

		Ok(Self::with_transport(descriptor, store, transport))
	}

	/// Builds the stack over a caller-supplied transport.
	pub fn with_transport(
		descriptor: Arc<ServiceDescriptor>,
		store: Arc<dyn CredentialStore>,
		transport: Arc<dyn ApiTransport>,
	) -> Self {
		let lifecycle = TokenLifecycleManager::new(store, transport, descriptor);
		let gateway = RequestGateway::new(lifecycle.clone());
		let jobs = JobsClient::new(gateway.clone());
		let poller = JobPollingCoordinator::new(jobs.clone());

		Self { lifecycle, gateway, jobs, poller }
	}

	/// Credential lifecycle manager.
	pub fn lifecycle(&self) -> &TokenLifecycleManager {
		&self.lifecycle
	}

	/// Authorized request gateway.
	pub fn gateway(&self) -> &RequestGateway {
		&self.gateway
	}

	/// Backend job operations.
	pub fn jobs(&self) -> &JobsClient {
		&self.jobs
	}

	/// Job status poller.
	pub fn poller(&self) -> &JobPollingCoordinator {
		&self.poller
	}

	/// Obtains and stores a demo session.
	pub async fn login(&self) -> Result<Session> {
		self.lifecycle.login().await
	}

	/// Stops polling, then clears the session.
	pub async fn logout(&self) -> Result<()> {
		self.poller.stop();
		self.lifecycle.logout().await
	}

	/// Uploads a job, queues it for processing, and starts polling it.
	pub async fn submit_and_watch(
		&self,
		upload: UploadBody,
		options: &serde_json::Value,
	) -> Result<(SubmittedJob, PollHandle)> {
		let submitted = self.jobs.submit(upload).await?;

		self.jobs.process(&submitted.job_id, options).await?;

		let handle = self.poller.start(submitted.job_id.clone());

		Ok((submitted, handle))
	}
}

//! Client-side session core for easyedit: short-lived credentials with single-flight refresh,
//! a retry-once authorized request gateway, and cancellable background-job polling.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod gateway;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod obs;
pub mod poll;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
	use crate::{
		auth::{Credential, SessionRecord, UserId, UserIdentity},
		client::Client,
		error::{TransientError, TransportError},
		http::{ApiRequest, ApiResponse, ApiTransport, Method, TransportFuture},
		service::ServiceDescriptor,
		store::MemoryStore,
	};

	/// Scripted outcome for one [`FakeTransport`] call.
	#[derive(Clone, Debug)]
	pub enum FakeReply {
		/// Return this response.
		Respond(ApiResponse),
		/// Fail as if the transport timed out.
		Timeout,
		/// Fail as if the connection was refused.
		NetworkDown,
	}

	/// In-memory [`ApiTransport`] replaying scripted replies per `(method, path)`.
	///
	/// Replies are consumed in order; the last one repeats. Unscripted routes answer 404.
	/// Every request is recorded before the optional latency elapses, so call counts are exact
	/// even while calls are still in flight.
	#[derive(Debug, Default)]
	pub struct FakeTransport {
		routes: Mutex<HashMap<(Method, String), VecDeque<FakeReply>>>,
		requests: Mutex<Vec<ApiRequest>>,
		latency: Option<std::time::Duration>,
	}
	impl FakeTransport {
		/// Delays every reply by `latency` (Tokio time, so paused clocks auto-advance).
		pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
			self.latency = Some(latency);

			self
		}

		/// Appends a scripted reply for the route.
		pub fn script(&self, method: Method, path: &str, reply: FakeReply) {
			self.routes.lock().entry((method, path.to_owned())).or_default().push_back(reply);
		}

		/// Appends a raw response for the route.
		pub fn reply(&self, method: Method, path: &str, response: ApiResponse) {
			self.script(method, path, FakeReply::Respond(response));
		}

		/// Appends a JSON response for the route.
		pub fn reply_json(&self, method: Method, path: &str, status: u16, body: &serde_json::Value) {
			let bytes = serde_json::to_vec(body).expect("Fake JSON body should serialize.");

			self.reply(method, path, ApiResponse::new(status, bytes));
		}

		/// Number of calls made to the route.
		pub fn calls(&self, method: Method, path: &str) -> usize {
			self.requests_to(method, path).len()
		}

		/// Number of calls made to any route.
		pub fn total_calls(&self) -> usize {
			self.requests.lock().len()
		}

		/// Recorded requests for the route, oldest first.
		pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
			self.requests
				.lock()
				.iter()
				.filter(|request| request.method == method && request.path == path)
				.cloned()
				.collect()
		}

		fn next_reply(&self, method: Method, path: &str) -> Option<FakeReply> {
			let mut routes = self.routes.lock();
			let queue = routes.get_mut(&(method, path.to_owned()))?;

			if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
		}
	}
	impl ApiTransport for FakeTransport {
		fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				let reply = self.next_reply(request.method, &request.path);
				let path = request.path.clone();

				self.requests.lock().push(request);

				if let Some(latency) = self.latency {
					tokio::time::sleep(latency).await;
				}

				match reply {
					Some(FakeReply::Respond(response)) => Ok(response),
					Some(FakeReply::Timeout) => Err(TransientError::Timeout { path }.into()),
					Some(FakeReply::NetworkDown) => Err(TransportError::network(
						std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
					)
					.into()),
					None => Ok(ApiResponse::new(404, br#"{"error":"Not found"}"#.to_vec())),
				}
			})
		}
	}

	/// Identity returned by the demo service.
	pub fn demo_identity() -> UserIdentity {
		UserIdentity {
			user_id: UserId::new("demo_user").expect("Demo user id should be valid."),
			email: "demo@easyedit.com".into(),
			role: "admin".into(),
			has_api_key: true,
		}
	}

	/// Session record pairing the demo identity with the given tokens.
	pub fn session_record(access: &str, refresh: &str, expires_at: OffsetDateTime) -> SessionRecord {
		let credential = Credential::builder()
			.access_token(access)
			.refresh_token(refresh)
			.expires_at(expires_at)
			.build()
			.expect("Fixture credential should build.");

		SessionRecord::new(credential, demo_identity())
	}

	/// Descriptor pointing at a loopback service with default knobs.
	pub fn test_descriptor() -> ServiceDescriptor {
		descriptor_for("http://127.0.0.1:5000")
	}

	/// Descriptor pointing at `base_url` with a short request timeout.
	pub fn descriptor_for(base_url: &str) -> ServiceDescriptor {
		ServiceDescriptor::builder(Url::parse(base_url).expect("Test base URL should parse."))
			.request_timeout(Duration::seconds(5))
			.build()
			.expect("Test descriptor should validate.")
	}

	/// Full client stack over a [`FakeTransport`].
	pub fn fake_client(store: &MemoryStore, transport: &Arc<FakeTransport>) -> Client {
		Client::with_transport(Arc::new(test_descriptor()), Arc::new(store.clone()), transport.clone())
	}

	/// Reqwest transport that accepts the self-signed certificates produced by `httpmock`.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport(descriptor: Arc<ServiceDescriptor>) -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(descriptor.request_timeout.unsigned_abs())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client, descriptor)
	}

	/// Full reqwest-backed client stack pointed at a mock server.
	#[cfg(feature = "reqwest")]
	pub fn reqwest_client(base_url: &str, store: &MemoryStore) -> Client {
		let descriptor = Arc::new(descriptor_for(base_url));
		let transport = Arc::new(test_reqwest_transport(descriptor.clone()));

		Client::with_transport(descriptor, Arc::new(store.clone()), transport)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

//! Authorized request wrapper with reactive refresh and a retry-once bound.
//!
//! The gateway attaches whatever access token is stored, without checking its expiry. A 401
//! on the first attempt drives one [`TokenLifecycleManager::refresh`] and re-issues the call
//! with the new token. A 401 on the re-issued call is final ([`Error::AuthExpired`]). Every
//! other failure passes through [`classify`] unchanged and is never retried here.

pub mod classify;
mod metrics;

pub use classify::{UNAUTHORIZED, classify};
pub use metrics::GatewayMetrics;

// self
use crate::{
	_prelude::*,
	http::{ApiRequest, ApiResponse, ApiTransport},
	lifecycle::TokenLifecycleManager,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Wraps every outbound call to the service.
#[derive(Clone)]
pub struct RequestGateway {
	lifecycle: TokenLifecycleManager,
	transport: Arc<dyn ApiTransport>,
	metrics: Arc<GatewayMetrics>,
}
impl RequestGateway {
	/// Creates a gateway sharing the lifecycle manager's transport.
	pub fn new(lifecycle: TokenLifecycleManager) -> Self {
		let transport = lifecycle.transport();

		Self { lifecycle, transport, metrics: Default::default() }
	}

	/// Lifecycle manager consulted for tokens and refreshes.
	pub fn lifecycle(&self) -> &TokenLifecycleManager {
		&self.lifecycle
	}

	/// Retry counters.
	pub fn metrics(&self) -> &GatewayMetrics {
		&self.metrics
	}

	/// Sends an authorized call.
	///
	/// Fails with [`Error::NotAuthenticated`] before any network attempt when no credential
	/// is stored, with [`Error::RefreshFailed`] when a 401 could not be recovered because the
	/// refresh failed (the session is already cleared), and with [`Error::AuthExpired`] when
	/// the re-issued call is rejected again.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Request;

		let span = OpSpan::new(KIND, "send");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.send_authorized(request)).await;

		obs::record_result(KIND, &result);

		result
	}

	/// Sends a call without credentials and without the 401 retry path.
	pub async fn send_anonymous(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Request;

		let span = OpSpan::new(KIND, "send_anonymous");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move { classify(self.transport.execute(request).await?) })
			.await;

		obs::record_result(KIND, &result);

		result
	}

	async fn send_authorized(&self, request: ApiRequest) -> Result<ApiResponse> {
		let token = self.lifecycle.stored_access_token().await?.ok_or(Error::NotAuthenticated)?;

		self.metrics.record_request();

		let response = self.transport.execute(request.clone().with_bearer(token)).await?;

		if response.status() != UNAUTHORIZED {
			return classify(response);
		}

		self.metrics.record_unauthorized();
		obs::debug(
			OpKind::Request,
			format_args!("{} {} was unauthorized; refreshing once.", request.method, request.path),
		);

		let token = self.lifecycle.refresh().await?;

		self.metrics.record_retry();

		let retried = self.transport.execute(request.clone().with_bearer(token)).await?;

		if retried.status() == UNAUTHORIZED {
			self.metrics.record_auth_expired();
			obs::warn(
				OpKind::Request,
				format_args!(
					"{} {} was rejected after a refresh; not retrying.",
					request.method, request.path
				),
			);

			return Err(Error::AuthExpired);
		}

		classify(retried)
	}
}
impl Debug for RequestGateway {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestGateway")
			.field("lifecycle", &self.lifecycle)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

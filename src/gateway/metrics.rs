// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for authorized calls.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
	requests: AtomicU64,
	unauthorized: AtomicU64,
	retries: AtomicU64,
	auth_expired: AtomicU64,
}
impl GatewayMetrics {
	/// Returns the number of authorized calls accepted by the gateway.
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	/// Returns how many first attempts came back 401.
	pub fn unauthorized(&self) -> u64 {
		self.unauthorized.load(Ordering::Relaxed)
	}

	/// Returns how many calls were re-issued after a successful refresh.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns how many retried calls were rejected again.
	pub fn auth_expired(&self) -> u64 {
		self.auth_expired.load(Ordering::Relaxed)
	}

	pub(crate) fn record_request(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_unauthorized(&self) {
		self.unauthorized.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_auth_expired(&self) {
		self.auth_expired.fetch_add(1, Ordering::Relaxed);
	}
}

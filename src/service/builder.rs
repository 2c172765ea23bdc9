// self
use crate::{
	_prelude::*,
	service::{ServiceDescriptor, ServiceEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum ServiceDescriptorError {
	/// Remote base URLs must use HTTPS; loopback hosts may use plain HTTP.
	#[error("The base URL must use HTTPS unless it points at a loopback host: {url}.")]
	InsecureBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// The base URL cannot have paths joined onto it (e.g. `mailto:`).
	#[error("The base URL cannot be used as a base: {url}.")]
	NotABase {
		/// URL that failed validation.
		url: String,
	},
	/// A duration knob was zero or negative.
	#[error("The {field} must be positive.")]
	NonPositiveDuration {
		/// Which knob failed validation.
		field: &'static str,
	},
	/// The recent-jobs window must keep at least one job.
	#[error("The recent jobs limit must be at least 1.")]
	EmptyRecentWindow,
	/// A configuration document could not be decoded.
	#[error("Service configuration is malformed: {message}.")]
	Malformed {
		/// Decoder message.
		message: String,
	},
}

/// Builder for [`ServiceDescriptor`] values.
#[derive(Debug)]
pub struct ServiceDescriptorBuilder {
	/// Root URL of the backing service.
	pub base_url: Url,
	/// Endpoint paths.
	pub endpoints: ServiceEndpoints,
	/// Per-call transport timeout.
	pub request_timeout: Duration,
	/// Job status polling cadence.
	pub poll_interval: Duration,
	/// Default recent-jobs window.
	pub recent_jobs_limit: usize,
}
impl ServiceDescriptorBuilder {
	/// Creates a new builder seeded with defaults for the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: ServiceEndpoints::default(),
			request_timeout: ServiceDescriptor::default_request_timeout(),
			poll_interval: ServiceDescriptor::default_poll_interval(),
			recent_jobs_limit: ServiceDescriptor::default_recent_jobs_limit(),
		}
	}

	/// Overrides the endpoint paths.
	pub fn endpoints(mut self, endpoints: ServiceEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the per-call transport timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the polling cadence.
	pub fn poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Overrides the default recent-jobs window.
	pub fn recent_jobs_limit(mut self, limit: usize) -> Self {
		self.recent_jobs_limit = limit;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ServiceDescriptor, ServiceDescriptorError> {
		let descriptor = ServiceDescriptor {
			base_url: self.base_url,
			endpoints: self.endpoints,
			request_timeout: self.request_timeout,
			poll_interval: self.poll_interval,
			recent_jobs_limit: self.recent_jobs_limit,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ServiceDescriptor {
	/// Validates invariants for the descriptor.
	pub(crate) fn validate(&self) -> Result<(), ServiceDescriptorError> {
		validate_base_url(&self.base_url)?;

		if !self.request_timeout.is_positive() {
			return Err(ServiceDescriptorError::NonPositiveDuration { field: "request timeout" });
		}
		if !self.poll_interval.is_positive() {
			return Err(ServiceDescriptorError::NonPositiveDuration { field: "poll interval" });
		}
		if self.recent_jobs_limit == 0 {
			return Err(ServiceDescriptorError::EmptyRecentWindow);
		}

		Ok(())
	}
}

fn validate_base_url(url: &Url) -> Result<(), ServiceDescriptorError> {
	if url.cannot_be_a_base() {
		return Err(ServiceDescriptorError::NotABase { url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ServiceDescriptorError::InsecureBaseUrl { url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}

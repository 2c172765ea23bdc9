//! Session-level error types shared across the store, lifecycle, gateway, and poller.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the polling loop tolerates it.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Credential refresh failed; the session has been cleared.
	#[error(transparent)]
	RefreshFailed(#[from] RefreshError),
	/// The service issued a credential missing required parts.
	#[error("The service issued an unusable credential: {0}")]
	IncompleteCredential(#[from] crate::auth::CredentialBuilderError),

	/// No credential is stored, so the call was never sent.
	#[error("No session credential is available; authenticate first.")]
	NotAuthenticated,
	/// The service rejected a call that was already retried with a refreshed credential.
	#[error("The service rejected the refreshed credential.")]
	AuthExpired,
	/// Caller input was rejected locally or by the service.
	#[error("Request validation failed: {reason}.")]
	Validation {
		/// Local or service-supplied reason string.
		reason: String,
	},
	/// Service returned a 5xx or throttling response.
	#[error("Service error {status}: {message}.")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Service-supplied message.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Service refused the call for a reason other than validation or authorization.
	#[error("Service rejected the request with {status}: {message}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Service-supplied message.
		message: String,
	},
}
impl Error {
	/// Returns `true` for failures a polling loop should survive.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_) | Self::Server { .. })
	}

	/// Returns `true` when the failure means the session can no longer authorize calls.
	pub fn ends_session(&self) -> bool {
		matches!(self, Self::NotAuthenticated | Self::AuthExpired | Self::RefreshFailed(_))
	}
}
impl From<crate::auth::IdentifierError> for Error {
	fn from(e: crate::auth::IdentifierError) -> Self {
		Self::Validation { reason: e.to_string() }
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint path could not be joined onto the base URL.
	#[error("Endpoint `{path}` cannot be joined onto the service base URL.")]
	InvalidEndpoint {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
	/// Service descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::service::ServiceDescriptorError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry on the next poll tick).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// The transport gave up waiting for the service.
	#[error("Request to `{path}` timed out.")]
	Timeout {
		/// Endpoint path that timed out.
		path: String,
	},
	/// Service responded with malformed JSON that could not be parsed.
	#[error("Service returned malformed JSON.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Terminal refresh outcome shared by every caller joined to the same refresh.
///
/// The type is `Clone` so a single settled refresh can be handed to all waiters.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No stored credential (and therefore no refresh token) exists.
	#[error("Refresh failed: no stored credential to refresh.")]
	MissingCredential,
	/// The authentication service refused the refresh token.
	#[error("Refresh failed: the service rejected the refresh token ({reason}).")]
	Rejected {
		/// Service-supplied reason string.
		reason: String,
	},
	/// The refresh call never produced a usable response.
	#[error("Refresh failed: {reason}.")]
	Network {
		/// Transport or decoding failure summary.
		reason: String,
	},
	/// The refreshed credential could not be persisted.
	#[error("Refresh failed: the credential store is unavailable ({reason}).")]
	Storage {
		/// Storage failure summary.
		reason: String,
	},
}

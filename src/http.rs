//! Transport primitives for calls to the backing service.
//!
//! [`ApiTransport`] is the crate's only dependency on an HTTP stack. The gateway and the
//! lifecycle manager hand it fully described [`ApiRequest`] values and receive raw
//! [`ApiResponse`] values back; status classification happens above this layer, so a
//! transport only reports failures that never produced a response.

// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError},
};
#[cfg(feature = "reqwest")]
use crate::{error::TransportError, service::ServiceDescriptor};

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute [`ApiRequest`] values.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// lifecycle manager, the gateway, and every poll task. Non-2xx responses are returned as
/// `Ok`; only failures without a response (network, timeout, request construction) are
/// `Err`.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and collects the full response body.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// HTTP verbs used by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
}
impl Method {
	/// Returns the canonical verb string.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Encoded request payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestBody {
	/// MIME type sent as `Content-Type`.
	pub content_type: String,
	/// Encoded bytes.
	pub bytes: Vec<u8>,
}

/// Transport-agnostic description of one outbound call.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP verb.
	pub method: Method,
	/// Path relative to the service base URL.
	pub path: String,
	/// Query parameters appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Optional payload.
	pub body: Option<RequestBody>,
	/// Access token attached as `Authorization: Bearer`.
	pub bearer: Option<TokenSecret>,
}
impl ApiRequest {
	/// Creates a request without body, query, or credential.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), body: None, bearer: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Serializes `payload` as the JSON body.
	pub fn with_json<T>(mut self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(payload).map_err(ConfigError::RequestBody)?;

		self.body = Some(RequestBody { content_type: "application/json".into(), bytes });

		Ok(self)
	}

	/// Attaches a pre-encoded body.
	pub fn with_body(mut self, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
		self.body = Some(RequestBody { content_type: content_type.into(), bytes });

		self
	}

	/// Replaces the attached access token.
	pub fn with_bearer(mut self, token: TokenSecret) -> Self {
		self.bearer = Some(token);

		self
	}
}

/// Status and hints captured from a response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Status and hints.
	pub metadata: ResponseMetadata,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response without hints.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { metadata: ResponseMetadata { status, retry_after: None }, body: body.into() }
	}

	/// HTTP status code.
	pub fn status(&self) -> u16 {
		self.metadata.status
	}

	/// `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.metadata.status)
	}

	/// Decodes the JSON body, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TransientError::Decode { source, status: Some(self.metadata.status) }.into()
		})
	}
}

/// Reqwest-backed [`ApiTransport`] that resolves paths against a [`ServiceDescriptor`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	descriptor: Arc<ServiceDescriptor>,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client whose per-call timeout comes from the descriptor.
	pub fn new(descriptor: Arc<ServiceDescriptor>) -> Result<Self, ConfigError> {
		let client =
			ReqwestClient::builder().timeout(descriptor.request_timeout.unsigned_abs()).build()?;

		Ok(Self { client, descriptor })
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; its own timeout settings apply.
	pub fn with_client(client: ReqwestClient, descriptor: Arc<ServiceDescriptor>) -> Self {
		Self { client, descriptor }
	}

	async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let mut url = self.descriptor.endpoint(&request.path)?;

		if !request.query.is_empty() {
			url.query_pairs_mut().extend_pairs(request.query.iter());
		}

		let method = match request.method {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
		};
		let mut builder = self.client.request(method, url);

		if let Some(token) = &request.bearer {
			builder = builder.header(AUTHORIZATION, token.bearer());
		}
		if let Some(body) = request.body {
			builder = builder.header(CONTENT_TYPE, body.content_type).body(body.bytes);
		}

		let response =
			builder.send().await.map_err(|err| map_reqwest_error(&request.path, err))?;
		let status = response.status().as_u16();
		let retry_after = parse_retry_after(response.headers());
		let body = response.bytes().await.map_err(|err| map_reqwest_error(&request.path, err))?;

		Ok(ApiResponse { metadata: ResponseMetadata { status, retry_after }, body: body.to_vec() })
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(self.send(request))
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(path: &str, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Timeout { path: path.to_owned() }.into();
	}

	TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

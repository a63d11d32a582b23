//! Transport primitives for member API calls.
//!
//! [`ApiRequest`] and [`ApiResponse`] are the values that flow through the
//! [`Pipeline`](crate::pipeline::Pipeline); [`ApiTransport`] is the client's only dependency on an
//! HTTP stack. Transports return every HTTP response as `Ok`, including 4xx/5xx, and reserve
//! `Err` for failures where no response arrived. Status classification happens in the client.

pub use ::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};

// std
use std::borrow::Cow;
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use ::http::header::{AUTHORIZATION, RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing member API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back many clients.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` to the fully resolved `url`.
	fn execute<'a>(&'a self, url: Url, request: &'a ApiRequest) -> TransportFuture<'a>;
}

/// Outbound request description.
///
/// The client clones the original request for every attempt, so the value handed to
/// [`ApiClient::send`](crate::client::ApiClient::send) is never mutated by the pipeline.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base path; must start with `/`.
	pub path: String,
	/// Query string pairs.
	pub query: Vec<(String, String)>,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional JSON body.
	pub body: Option<Value>,
	retried: bool,
	refresh_allowed: bool,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: None,
			retried: false,
			refresh_allowed: true,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query pair.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Inserts (or replaces) a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_value(body).map_err(crate::error::ConfigError::from)?);

		Ok(self)
	}

	/// Opts the request out of refresh-and-retry recovery.
	pub fn without_refresh(mut self) -> Self {
		self.refresh_allowed = false;

		self
	}

	/// Marks the request as already replayed after a refresh.
	pub fn mark_retried(mut self) -> Self {
		self.retried = true;

		self
	}

	/// Returns `true` once the request has been replayed after a refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Returns `true` when a 401 may trigger a refresh for this request.
	pub fn refresh_allowed(&self) -> bool {
		self.refresh_allowed && !self.retried
	}

	/// Returns the credential carried by the `Authorization: Bearer …` header, if any.
	pub fn bearer_token(&self) -> Option<&str> {
		self.headers
			.get(AUTHORIZATION)?
			.to_str()
			.ok()?
			.strip_prefix("Bearer ")
			.map(str::trim)
			.filter(|token| !token.is_empty())
	}
}

/// HTTP response captured by a transport.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with empty headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Replaces the response headers.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	/// Returns the body as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Returns the `message` field of a JSON error body, if present and non-empty.
	pub fn message(&self) -> Option<String> {
		let value = serde_json::from_slice::<Value>(&self.body).ok()?;

		value
			.get("message")
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|message| !message.is_empty())
			.map(ToOwned::to_owned)
	}

	/// Returns the Retry-After hint as a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a transport whose requests give up after `timeout`.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().timeout(timeout).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestTransport(..)")
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute<'a>(&'a self, url: Url, request: &'a ApiRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			let mut builder = self
				.0
				.request(request.method.clone(), url)
				.headers(request.headers.clone())
				.header(header::ACCEPT, "application/json");

			if !request.query.is_empty() {
				builder = builder.query(&request.query);
			}
			if let Some(body) = request.body.as_ref() {
				let bytes = serde_json::to_vec(body).map_err(TransportError::network)?;

				builder = builder.header(header::CONTENT_TYPE, "application/json").body(bytes);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

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

//! Session-aware API client wiring the pipeline, transport, session, and refresh recovery.
//!
//! Every call runs the same lifecycle: the request layers decorate a fresh copy of the request,
//! the transport dispatches it, and the status is classified into an [`Error`] variant. A 401 on a
//! request that is still eligible for recovery either refreshes the access token and replays the
//! request exactly once, or (under [`UnauthorizedPolicy::ForceRelogin`]) tears the session down.
//! The final outcome then passes through the response layers.

pub mod account;
pub mod refresh;

pub use account::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSourceChain,
	config::{ClientConfig, UnauthorizedPolicy},
	http::{ApiRequest, ApiResponse, ApiTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, RequestPhase},
	pipeline::{LogNotifier, Notifier, Pipeline},
	session::SessionStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestTransport, store::KeyValueStore};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Authenticated client shared across tasks.
///
/// Cloning is cheap; clones share the transport, session, metrics, and refresh guard, so
/// concurrent 401s across clones still coalesce into one refresh.
pub struct ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Transport used for every outbound call.
	pub transport: Arc<T>,
	/// Validated configuration.
	pub config: Arc<ClientConfig>,
	/// Session owner shared with the token sources.
	pub session: Arc<SessionStore>,
	/// Request and response layers.
	pub pipeline: Pipeline,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh_guard: Arc<AsyncMutex<()>>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a client over a caller-provided transport with the standard pipeline and a
	/// [`LogNotifier`].
	pub fn with_transport(
		config: ClientConfig,
		session: Arc<SessionStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let config = Arc::new(config);
		let pipeline = Self::standard_pipeline(&config, &session, Arc::new(LogNotifier));

		Self {
			transport: transport.into(),
			config,
			session,
			pipeline,
			refresh_metrics: Default::default(),
			refresh_guard: Arc::new(AsyncMutex::new(())),
		}
	}

	/// Rebuilds the standard pipeline around `notifier`.
	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.pipeline = Self::standard_pipeline(&self.config, &self.session, notifier);

		self
	}

	/// Replaces the pipeline entirely.
	pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
		self.pipeline = pipeline;

		self
	}

	/// Sends `request` through the pipeline with refresh recovery.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let outcome = self.execute(&request).await;

		self.pipeline.complete(&request, outcome)
	}

	/// Sends `request` and decodes the JSON body.
	pub async fn send_json<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.send(request).await?.json()
	}

	/// `GET path`, decoding the JSON body.
	pub async fn get_json<R>(&self, path: &str) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.send_json(ApiRequest::get(path)).await
	}

	/// `POST path` with a JSON body, decoding the JSON response.
	pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.send_json(ApiRequest::post(path).json(body)?).await
	}

	/// Resolves an asset path against the API origin.
	pub fn asset_url(&self, path: Option<&str>) -> String {
		self.config.asset_url(path)
	}

	/// Runs the recovery lifecycle without the response layers.
	pub(crate) async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.recover_from_unauthorized(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn recover_from_unauthorized(&self, request: &ApiRequest) -> Result<ApiResponse> {
		obs::phase(request, RequestPhase::Initial);

		let mut attempt = request.clone();
		let error = match self.dispatch(&mut attempt).await {
			Ok(response) => {
				obs::phase(request, RequestPhase::Done);

				return Ok(response);
			},
			Err(e) => e,
		};

		let error = match error {
			// On session endpoints a 401 rejects the credentials themselves.
			Error::AuthExpired { message } if self.is_auth_endpoint(&attempt) =>
				Error::Client { status: 401, message },
			error => error,
		};

		if !matches!(error, Error::AuthExpired { .. }) || !self.recoverable(&attempt) {
			obs::phase(request, RequestPhase::Failed);

			return Err(error);
		}
		if self.config.unauthorized_policy == UnauthorizedPolicy::ForceRelogin {
			obs::phase(request, RequestPhase::Failed);

			return Err(self
				.tear_down(Error::AuthInvalid {
					reason: "access token was rejected".into(),
					status: Some(401),
					source: Some(Box::new(error)),
				})
				.await);
		}

		obs::phase(request, RequestPhase::Refreshing);

		let failed_token = attempt.bearer_token().map(ToOwned::to_owned);

		if let Err(e) = self.refresh_after_rejection(failed_token.as_deref()).await {
			obs::phase(request, RequestPhase::Failed);

			return Err(e);
		}

		let mut replay = request.clone().mark_retried();
		let outcome = self.dispatch(&mut replay).await;

		obs::phase(request, RequestPhase::Retried);

		outcome
	}

	async fn dispatch(&self, request: &mut ApiRequest) -> Result<ApiResponse> {
		self.pipeline.prepare(request).await?;

		let url = self.config.endpoint_url(&request.path)?;
		let response = self.transport.execute(url, request).await?;

		classify(response)
	}

	fn recoverable(&self, request: &ApiRequest) -> bool {
		request.refresh_allowed() && !self.is_auth_endpoint(request)
	}

	fn is_auth_endpoint(&self, request: &ApiRequest) -> bool {
		let endpoints = &self.config.endpoints;
		let path = request.path.as_str();

		[&endpoints.login, &endpoints.register, &endpoints.refresh, &endpoints.logout]
			.into_iter()
			.any(|endpoint| endpoint == path)
	}

	fn standard_pipeline(
		config: &Arc<ClientConfig>,
		session: &Arc<SessionStore>,
		notifier: Arc<dyn Notifier>,
	) -> Pipeline {
		Pipeline::standard(config, TokenSourceChain::from_specs(&config.token_sources, session), notifier)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a reqwest-backed client honoring the configured timeout.
	pub fn new(config: ClientConfig, session: Arc<SessionStore>) -> Result<Self> {
		let transport = ReqwestTransport::with_timeout(config.timeout)?;

		Ok(Self::with_transport(config, session, transport))
	}

	/// Loads the persisted session from `storage` and creates a reqwest-backed client.
	pub async fn open(config: ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
		let session = SessionStore::load(storage, config.storage_keys.clone()).await?;

		Self::new(config, Arc::new(session))
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: Arc::clone(&self.transport),
			config: Arc::clone(&self.config),
			session: Arc::clone(&self.session),
			pipeline: self.pipeline.clone(),
			refresh_metrics: Arc::clone(&self.refresh_metrics),
			refresh_guard: Arc::clone(&self.refresh_guard),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("config", &self.config)
			.field("session", &self.session)
			.field("pipeline", &self.pipeline)
			.finish()
	}
}

/// JSON payload optionally wrapped in a `data` field.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
	Wrapped { data: T },
	Bare(T),
}
impl<T> Envelope<T> {
	pub(crate) fn into_inner(self) -> T {
		match self {
			Self::Wrapped { data } | Self::Bare(data) => data,
		}
	}
}

/// Maps non-2xx responses onto the client error taxonomy.
pub(crate) fn classify(response: ApiResponse) -> Result<ApiResponse> {
	if response.is_success() {
		return Ok(response);
	}

	let message = response.message();

	match response.status.as_u16() {
		401 => Err(Error::AuthExpired { message }),
		status @ 500.. => Err(Error::Server { status, message, retry_after: response.retry_after() }),
		status => Err(Error::Client { status, message }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::StatusCode;

	#[test]
	fn statuses_map_onto_error_variants() {
		assert!(classify(ApiResponse::new(StatusCode::NO_CONTENT, "")).is_ok());
		assert!(matches!(
			classify(ApiResponse::new(StatusCode::UNAUTHORIZED, r#"{"message":"jwt expired"}"#)),
			Err(Error::AuthExpired { message: Some(m) }) if m == "jwt expired"
		));
		assert!(matches!(
			classify(ApiResponse::new(StatusCode::NOT_FOUND, "")),
			Err(Error::Client { status: 404, message: None })
		));
		assert!(matches!(
			classify(ApiResponse::new(StatusCode::BAD_GATEWAY, "")),
			Err(Error::Server { status: 502, .. })
		));
	}

	#[test]
	fn envelopes_unwrap_data() {
		let wrapped: Envelope<Value> =
			serde_json::from_str(r#"{"data":{"credit":1}}"#).expect("Wrapped payload should parse.");
		let bare: Envelope<Value> =
			serde_json::from_str(r#"{"credit":2}"#).expect("Bare payload should parse.");

		assert_eq!(wrapped.into_inner()["credit"], 1);
		assert_eq!(bare.into_inner()["credit"], 2);
	}
}

//! Shared fixtures for the integration suites.

#![allow(dead_code)]

// std
use std::{collections::HashMap, sync::Arc, time::Duration};
// crates.io
use parking_lot::Mutex;
use serde_json::Value;
// self
use member_client::{
	client::ApiClient,
	config::ClientConfig,
	error::TransportError,
	http::{ApiRequest, ApiResponse, ApiTransport, Method, StatusCode, TransportFuture},
	pipeline::Notifier,
	session::SessionStore,
	store::{KeyValueStore, MemoryStore},
	url::Url,
};

type Handler = dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync;

/// One request as seen by [`FakeTransport`].
#[derive(Clone, Debug)]
pub struct Recorded {
	pub method: Method,
	pub url: String,
	pub path: String,
	pub bearer: Option<String>,
	pub body: Option<Value>,
	pub retried: bool,
}

/// Transport answering from a closure and recording every request.
pub struct FakeTransport {
	handler: Box<Handler>,
	delays: HashMap<String, Duration>,
	log: Mutex<Vec<Recorded>>,
}
impl FakeTransport {
	pub fn new<F>(handler: F) -> Self
	where
		F: 'static + Fn(&ApiRequest) -> ApiResponse + Send + Sync,
	{
		Self { handler: Box::new(handler), delays: HashMap::new(), log: Mutex::new(Vec::new()) }
	}

	/// Answers 200 `{}` to everything.
	pub fn ok() -> Self {
		Self::new(|_| json_response(StatusCode::OK, serde_json::json!({})))
	}

	/// Delays responses for `path`.
	pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
		self.delays.insert(path.to_owned(), delay);

		self
	}

	pub fn requests(&self) -> Vec<Recorded> {
		self.log.lock().clone()
	}

	pub fn calls_to(&self, path: &str) -> usize {
		self.log.lock().iter().filter(|r| r.path == path).count()
	}
}
impl ApiTransport for FakeTransport {
	fn execute<'a>(&'a self, url: Url, request: &'a ApiRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			self.log.lock().push(Recorded {
				method: request.method.clone(),
				url: url.to_string(),
				path: request.path.clone(),
				bearer: request.bearer_token().map(ToOwned::to_owned),
				body: request.body.clone(),
				retried: request.is_retried(),
			});

			if let Some(delay) = self.delays.get(&request.path) {
				tokio::time::sleep(*delay).await;
			}

			Ok::<_, TransportError>((self.handler)(request))
		})
	}
}

/// Notifier keeping every notice and redirect.
#[derive(Default)]
pub struct RecordingNotifier {
	pub notices: Mutex<Vec<String>>,
	pub redirects: Mutex<Vec<String>>,
}
impl Notifier for RecordingNotifier {
	fn notify_error(&self, message: &str) {
		self.notices.lock().push(message.to_owned());
	}

	fn redirect_to_login(&self, path: &str) {
		self.redirects.lock().push(path.to_owned());
	}
}

pub fn json_response(status: StatusCode, body: Value) -> ApiResponse {
	ApiResponse::new(status, body.to_string())
}

pub fn message(status: StatusCode, message: &str) -> ApiResponse {
	json_response(status, serde_json::json!({ "message": message }))
}

/// Persisted session document holding the given tokens.
pub fn session_document(access: &str, refresh: Option<&str>) -> String {
	serde_json::json!({
		"state": {
			"user": { "username": "somchai", "credit": 100 },
			"accessToken": access,
			"refreshToken": refresh,
			"isAuthenticated": true,
		},
		"version": 0,
	})
	.to_string()
}

pub struct Harness {
	pub client: ApiClient<FakeTransport>,
	pub transport: Arc<FakeTransport>,
	pub store: MemoryStore,
	pub notifier: Arc<RecordingNotifier>,
}

pub async fn harness(config: ClientConfig, store: MemoryStore, transport: FakeTransport) -> Harness {
	let session = SessionStore::load(
		Arc::new(store.clone()) as Arc<dyn KeyValueStore>,
		config.storage_keys.clone(),
	)
	.await
	.expect("Session should load from memory storage.");
	let transport = Arc::new(transport);
	let notifier = Arc::new(RecordingNotifier::default());
	let client = ApiClient::<FakeTransport>::with_transport(config, Arc::new(session), Arc::clone(&transport))
		.with_notifier(notifier.clone());

	Harness { client, transport, store, notifier }
}

pub fn default_config() -> ClientConfig {
	ClientConfig::builder().build().expect("Default config should validate.")
}

mod common;

// crates.io
use serde_json::json;
// self
use common::*;
use member_client::{
	config::{ClientConfig, TokenSourceSpec},
	http::{ApiRequest, StatusCode},
	store::MemoryStore,
};

#[tokio::test]
async fn session_token_is_attached_as_bearer() {
	let store = MemoryStore::with_entries([("auth-storage", session_document("live-token", None))]);
	let h = harness(default_config(), store, FakeTransport::ok()).await;

	h.client.send(ApiRequest::get("/wallet")).await.expect("Request should succeed.");

	let requests = h.transport.requests();

	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].bearer.as_deref(), Some("live-token"));
	assert_eq!(requests[0].url, "http://localhost:3001/api/v1/wallet");
}

#[tokio::test]
async fn legacy_member_token_is_used_without_a_session() {
	let store = MemoryStore::with_entries([("memberToken", "abc")]);
	let h = harness(default_config(), store, FakeTransport::ok()).await;

	h.client.send(ApiRequest::get("/lottery/history")).await.expect("Request should succeed.");

	assert_eq!(h.transport.requests()[0].bearer.as_deref(), Some("abc"));
}

#[tokio::test]
async fn empty_session_token_defers_to_the_legacy_key() {
	let store = MemoryStore::with_entries([
		("auth-storage", json!({"state": {"accessToken": ""}}).to_string()),
		("memberToken", "abc".to_owned()),
	]);
	let h = harness(default_config(), store, FakeTransport::ok()).await;

	h.client.send(ApiRequest::get("/wallet")).await.expect("Request should succeed.");

	assert_eq!(h.transport.requests()[0].bearer.as_deref(), Some("abc"));
}

#[tokio::test]
async fn requests_without_any_token_go_out_unauthenticated() {
	let h = harness(default_config(), MemoryStore::default(), FakeTransport::ok()).await;

	h.client.send(ApiRequest::get("/lottery/open")).await.expect("Request should succeed.");

	assert_eq!(h.transport.requests()[0].bearer, None);
}

#[tokio::test]
async fn persisted_document_is_the_last_resort() {
	// A document written by an older frontend without the live session fields.
	let store = MemoryStore::with_entries([(
		"auth-storage",
		json!({"state": {"accessToken": "from-document"}}).to_string(),
	)]);
	let config = ClientConfig::builder()
		.token_sources([
			TokenSourceSpec::StorageKey { key: "memberToken".into() },
			TokenSourceSpec::PersistedField {
				key: "auth-storage".into(),
				pointer: "/state/accessToken".into(),
			},
		])
		.build()
		.expect("Config should validate.");
	let h = harness(config, store, FakeTransport::ok()).await;

	h.client.send(ApiRequest::get("/wallet")).await.expect("Request should succeed.");

	assert_eq!(h.transport.requests()[0].bearer.as_deref(), Some("from-document"));
}

#[tokio::test]
async fn selector_source_sends_selector_and_token() {
	let store = MemoryStore::with_entries([("memberSelector", "sel-9"), ("memberToken", "tok-9")]);
	let config = ClientConfig::builder()
		.token_sources([TokenSourceSpec::Selector {
			selector_key: "memberSelector".into(),
			token_key: "memberToken".into(),
		}])
		.build()
		.expect("Config should validate.");
	let h = harness(config, store, FakeTransport::ok()).await;

	h.client.send(ApiRequest::get("/wallet")).await.expect("Request should succeed.");

	assert_eq!(h.transport.requests()[0].bearer.as_deref(), Some("sel-9:tok-9"));
}

#[tokio::test]
async fn json_helpers_send_and_decode_bodies() {
	let transport = FakeTransport::new(|request| {
		let amount = request.body.as_ref().and_then(|body| body["amount"].as_u64()).unwrap_or(0);

		json_response(StatusCode::OK, json!({"data": {"credit": 100 - amount}}))
	});
	let h = harness(default_config(), MemoryStore::default(), transport).await;
	let body: serde_json::Value = h
		.client
		.post_json("/lottery/bets", &json!({"amount": 30}))
		.await
		.expect("Bet should be accepted.");

	assert_eq!(body["data"]["credit"], 70);
	assert_eq!(h.transport.requests()[0].body, Some(json!({"amount": 30})));
}

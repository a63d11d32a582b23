//! Logs a member in against a mocked backend, survives an expired access token, and logs out.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use member_client::{
	client::{LoginCredentials, ReqwestApiClient},
	config::ClientConfig,
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/login");
			then.status(200).json_body(json!({
				"user": {"username": "demo-member", "credit": 500},
				"accessToken": "short-lived",
				"refreshToken": "long-lived",
			}));
		})
		.await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/wallet").header("authorization", "Bearer short-lived");
			then.status(401).json_body(json!({"message": "jwt expired"}));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/token/refresh");
			then.status(200).json_body(json!({"accessToken": "renewed"}));
		})
		.await;
	let wallet = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/wallet").header("authorization", "Bearer renewed");
			then.status(200).json_body(json!({"credit": 500}));
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/logout");
			then.status(204);
		})
		.await;
	let config = ClientConfig::builder().api_url(server.base_url()).build()?;
	let client = ReqwestApiClient::open(config, Arc::new(MemoryStore::default())).await?;

	client.login(&LoginCredentials::new("demo-member", "demo-password")).await?;

	let balance: Value = client.get_json("/wallet").await?;

	println!("Credit after transparent refresh: {}.", balance["credit"]);
	println!("Refreshes performed: {}.", client.refresh_metrics.successes());

	client.logout().await?;

	for mock in [&login, &expired, &refresh, &wallet, &logout] {
		mock.assert_async().await;
	}

	Ok(())
}

//! Request layer attaching `Authorization: Bearer <token>` from the token source chain.

// self
use crate::{
	_prelude::*,
	auth::TokenSourceChain,
	http::{ApiRequest, HeaderValue, header::AUTHORIZATION},
	obs,
	pipeline::{LayerFuture, RequestLayer},
};

/// Resolves a token on every attempt so a replay picks up a freshly refreshed session.
#[derive(Clone, Debug)]
pub struct BearerAuth {
	sources: TokenSourceChain,
}
impl BearerAuth {
	/// Creates a layer reading from `sources`.
	pub fn new(sources: TokenSourceChain) -> Self {
		Self { sources }
	}

	/// Configured token sources.
	pub fn sources(&self) -> &TokenSourceChain {
		&self.sources
	}
}
impl RequestLayer for BearerAuth {
	fn on_request<'a>(&'a self, request: &'a mut ApiRequest) -> LayerFuture<'a> {
		Box::pin(async move {
			let Some(resolved) = self.sources.resolve().await? else {
				request.headers.remove(AUTHORIZATION);
				obs::token_resolved(request, None);

				return Ok(());
			};

			match HeaderValue::from_str(&format!("Bearer {}", resolved.token.expose())) {
				Ok(mut value) => {
					value.set_sensitive(true);
					request.headers.insert(AUTHORIZATION, value);
					obs::token_resolved(request, Some(&resolved.source));
				},
				// Tokens with control characters cannot travel in a header.
				Err(_) => {
					request.headers.remove(AUTHORIZATION);
					obs::token_resolved(request, None);
				},
			}

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		config::{StorageKeys, TokenSourceSpec},
		session::SessionStore,
		store::MemoryStore,
	};

	async fn layer_over(store: MemoryStore) -> BearerAuth {
		let session = Arc::new(
			SessionStore::load(Arc::new(store), StorageKeys::default())
				.await
				.expect("Session should load from memory storage."),
		);

		BearerAuth::new(TokenSourceChain::from_specs(&TokenSourceSpec::defaults(), &session))
	}

	#[tokio::test]
	async fn legacy_token_becomes_a_bearer_header() {
		let layer = layer_over(MemoryStore::with_entries([("memberToken", "abc")])).await;
		let mut request = ApiRequest::get("/wallet");

		layer.on_request(&mut request).await.expect("Bearer layer should succeed.");

		assert_eq!(request.bearer_token(), Some("abc"));
		assert!(request.headers.get(AUTHORIZATION).is_some_and(HeaderValue::is_sensitive));
	}

	#[tokio::test]
	async fn missing_token_leaves_the_request_unauthenticated() {
		let layer = layer_over(MemoryStore::default()).await;
		let mut request = ApiRequest::get("/lottery/open");

		layer.on_request(&mut request).await.expect("Bearer layer should succeed.");

		assert!(request.headers.get(AUTHORIZATION).is_none());
	}
}

//! Explicit middleware pipeline applied around every transport call.
//!
//! Request layers run in order on each attempt before dispatch. Response layers run in order on
//! the final outcome of a request, after refresh recovery has finished, so a 401 that was
//! recovered never reaches them.

pub mod bearer;
pub mod notify;

pub use bearer::*;
pub use notify::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSourceChain,
	config::ClientConfig,
	http::{ApiRequest, ApiResponse},
};

/// Boxed future returned by [`RequestLayer::on_request`].
pub type LayerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// `(request) -> request` transform applied before dispatch.
pub trait RequestLayer
where
	Self: Send + Sync,
{
	/// Decorates `request` in place; an error aborts the attempt.
	fn on_request<'a>(&'a self, request: &'a mut ApiRequest) -> LayerFuture<'a>;
}

/// `(response | error) -> response | error` transform applied to the final outcome.
pub trait ResponseLayer
where
	Self: Send + Sync,
{
	/// Inspects or rewrites the outcome of `request`.
	fn on_outcome(&self, request: &ApiRequest, outcome: Result<ApiResponse>) -> Result<ApiResponse>;
}

/// Ordered request and response layers.
#[derive(Clone, Default)]
pub struct Pipeline {
	request_layers: Vec<Arc<dyn RequestLayer>>,
	response_layers: Vec<Arc<dyn ResponseLayer>>,
}
impl Pipeline {
	/// Bearer attachment from the configured token sources, then error notices and the login
	/// redirect.
	pub fn standard(
		config: &Arc<ClientConfig>,
		sources: TokenSourceChain,
		notifier: Arc<dyn Notifier>,
	) -> Self {
		Self::default()
			.with_request_layer(BearerAuth::new(sources))
			.with_response_layer(ErrorNotice::new(Arc::clone(config), Arc::clone(&notifier)))
			.with_response_layer(LoginRedirect::new(notifier, config.login_path.clone()))
	}

	/// Appends a request layer.
	pub fn with_request_layer(mut self, layer: impl RequestLayer + 'static) -> Self {
		self.request_layers.push(Arc::new(layer));

		self
	}

	/// Appends a response layer.
	pub fn with_response_layer(mut self, layer: impl ResponseLayer + 'static) -> Self {
		self.response_layers.push(Arc::new(layer));

		self
	}

	/// Runs every request layer in order.
	pub async fn prepare(&self, request: &mut ApiRequest) -> Result<()> {
		for layer in &self.request_layers {
			layer.on_request(request).await?;
		}

		Ok(())
	}

	/// Folds the outcome through every response layer in order.
	pub fn complete(&self, request: &ApiRequest, outcome: Result<ApiResponse>) -> Result<ApiResponse> {
		self.response_layers.iter().fold(outcome, |outcome, layer| layer.on_outcome(request, outcome))
	}
}
impl Debug for Pipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Pipeline")
			.field("request_layers", &self.request_layers.len())
			.field("response_layers", &self.response_layers.len())
			.finish()
	}
}

//! Access token refresh with a single-flight guard and session teardown on failure.
//!
//! All refreshes for one client (and its clones) serialize on one async guard. A caller that
//! waited on the guard because its request was rejected first checks whether the session already
//! holds a different access token; if so, another caller refreshed in the meantime and the waiter
//! replays with that token instead of spending the refresh token again. Any refresh failure clears
//! the session and surfaces as [`Error::AuthInvalid`].

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	client::{ApiClient, Envelope, classify},
	http::{ApiRequest, ApiTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::RefreshGrant,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
	refresh_token: &'a str,
}

impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Exchanges the stored refresh token for a new access token.
	///
	/// The refresh token is rotated when the backend returns a new one. On any failure the session
	/// is cleared and [`Error::AuthInvalid`] is returned with the underlying failure as its source.
	pub async fn refresh_access_token(&self) -> Result<TokenSecret> {
		let _singleflight = self.refresh_guard.lock().await;

		self.refresh_locked().await
	}

	/// Refreshes after `failed_token` was rejected, unless a concurrent caller already replaced it.
	pub(crate) async fn refresh_after_rejection(&self, failed_token: Option<&str>) -> Result<()> {
		let _singleflight = self.refresh_guard.lock().await;
		let replaced = self
			.session
			.access_token()
			.is_some_and(|current| Some(current.expose()) != failed_token);

		if replaced {
			self.refresh_metrics.record_coalesced();

			return Ok(());
		}

		self.refresh_locked().await.map(|_| ())
	}

	/// Clears the session and converts `error` into [`Error::AuthInvalid`].
	pub(crate) async fn tear_down(&self, error: Error) -> Error {
		let error = match error {
			invalid @ Error::AuthInvalid { .. } => invalid,
			other => Error::AuthInvalid {
				reason: "access token refresh failed".into(),
				status: other.status(),
				source: Some(Box::new(other)),
			},
		};

		if let Err(e) = self.session.clear().await {
			obs::best_effort_failed("clear_session", &e);
		}
		if let Error::AuthInvalid { reason, .. } = &error {
			obs::session_torn_down(reason);
		}

		error
	}

	async fn refresh_locked(&self) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		match span.instrument(self.exchange_refresh_token()).await {
			Ok(token) => {
				self.refresh_metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(token)
			},
			Err(e) => {
				self.refresh_metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Err(self.tear_down(e).await)
			},
		}
	}

	async fn exchange_refresh_token(&self) -> Result<TokenSecret> {
		let Some(refresh_token) = self.session.refresh_token() else {
			return Err(Error::AuthInvalid {
				reason: "no refresh token is stored".into(),
				status: None,
				source: None,
			});
		};
		let request = ApiRequest::post(self.config.endpoints.refresh.as_str())
			.json(&RefreshBody { refresh_token: refresh_token.expose() })?
			.without_refresh();
		let url = self.config.endpoint_url(&request.path)?;
		let response = classify(self.transport.execute(url, &request).await?)?;
		let grant = response.json::<Envelope<RefreshGrant>>()?.into_inner();

		self.session.apply_refresh(grant.access_token.clone(), grant.refresh_token).await?;

		Ok(grant.access_token)
	}
}

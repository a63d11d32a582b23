//! Member account operations layered on top of the authenticated client.

// self
use crate::{
	_prelude::*,
	client::{ApiClient, Envelope},
	http::{ApiRequest, ApiTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{AuthGrant, Session, UserProfile},
};

/// Pointers tried in order when reading the member out of a profile response.
const PROFILE_POINTERS: [&str; 5] = ["/data/member", "/data/user", "/data", "/member", "/user"];

/// Username and password accepted by the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
	/// Member username or phone number.
	pub username: String,
	/// Plain-text password; sent once over the transport and never logged.
	pub password: String,
}
impl LoginCredentials {
	/// Creates credentials from a username and password.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: password.into() }
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Logs in and establishes the session.
	///
	/// On failure the backend message (or the configured fallback) is kept as
	/// [`SessionStore::last_error`](crate::session::SessionStore::last_error).
	pub async fn login<C>(&self, credentials: &C) -> Result<Session>
	where
		C: ?Sized + Serialize,
	{
		let (path, fallback) = (&self.config.endpoints.login, &self.config.messages.login_failed);

		self.authenticate(FlowKind::Login, path, credentials, fallback).await
	}

	/// Registers a member and establishes the returned session.
	pub async fn register<D>(&self, data: &D) -> Result<Session>
	where
		D: ?Sized + Serialize,
	{
		let (path, fallback) =
			(&self.config.endpoints.register, &self.config.messages.register_failed);

		self.authenticate(FlowKind::Register, path, data, fallback).await
	}

	/// Ends the session.
	///
	/// The backend is told about the logout only when an access token is held, and its answer is
	/// ignored. Local state and every legacy token key are cleared regardless.
	pub async fn logout(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.logout_inner()).await;

		record_result(KIND, &result);

		result
	}

	/// Reloads the member profile and merges it into the stored user.
	///
	/// Returns `Ok(None)` without a network call when nobody is logged in. Failures are
	/// propagated and leave the session untouched.
	pub async fn refresh_user(&self) -> Result<Option<UserProfile>> {
		const KIND: FlowKind = FlowKind::Profile;

		if !self.session.is_authenticated() {
			return Ok(None);
		}

		let span = FlowSpan::new(KIND, "refresh_user");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.refresh_user_inner()).await;

		record_result(KIND, &result);

		result
	}

	/// Shallow-merges `partial` into the stored user; a no-op when no user is stored.
	pub async fn update_user(&self, partial: UserProfile) -> Result<()> {
		self.session.update_user(partial).await
	}

	async fn authenticate<B>(
		&self,
		kind: FlowKind,
		path: &str,
		body: &B,
		fallback: &str,
	) -> Result<Session>
	where
		B: ?Sized + Serialize,
	{
		let span = FlowSpan::new(kind, "authenticate");

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);
		self.session.clear_error();

		let result = span.instrument(self.establish_from(path, body)).await;

		if let Err(e) = &result {
			self.session.record_error(e.message().unwrap_or(fallback));
		}

		record_result(kind, &result);

		result
	}

	async fn establish_from<B>(&self, path: &str, body: &B) -> Result<Session>
	where
		B: ?Sized + Serialize,
	{
		let request = ApiRequest::post(path).json(body)?.without_refresh();
		let grant = self.send_json::<Envelope<AuthGrant>>(request).await?.into_inner();

		self.session.establish(grant).await?;

		Ok(self.session.snapshot())
	}

	async fn logout_inner(&self) -> Result<()> {
		if self.session.access_token().is_some() {
			let request = ApiRequest::post(self.config.endpoints.logout.as_str()).without_refresh();

			if let Err(e) = self.execute(&request).await {
				obs::best_effort_failed("logout", &e);
			}
		}

		self.session.clear().await
	}

	async fn refresh_user_inner(&self) -> Result<Option<UserProfile>> {
		let body = self.get_json::<Value>(&self.config.endpoints.profile).await?;

		if let Some(profile) = extract_profile(body) {
			self.session.merge_profile(profile).await?;
		}

		Ok(self.session.user())
	}
}

fn extract_profile(mut body: Value) -> Option<UserProfile> {
	PROFILE_POINTERS.iter().find_map(|pointer| match body.pointer_mut(pointer).map(Value::take) {
		Some(Value::Object(profile)) => Some(profile),
		_ => None,
	})
}

fn record_result<R>(kind: FlowKind, result: &Result<R>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}
}

//! User-facing error notices and the login redirect.

// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::ErrorKind,
	http::{ApiRequest, ApiResponse},
	pipeline::ResponseLayer,
};

/// Sink for user-visible notifications.
pub trait Notifier
where
	Self: Send + Sync,
{
	/// Shows `message` to the user.
	fn notify_error(&self, message: &str);

	/// Sends the user to `path`; does nothing by default.
	fn redirect_to_login(&self, path: &str) {
		let _ = path;
	}
}

/// Notifier writing notices to the log; used when no UI sink is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;
impl Notifier for LogNotifier {
	fn notify_error(&self, message: &str) {
		#[cfg(feature = "tracing")]
		::tracing::warn!(message, "User notice.");
		#[cfg(not(feature = "tracing"))]
		let _ = message;
	}

	fn redirect_to_login(&self, path: &str) {
		#[cfg(feature = "tracing")]
		::tracing::info!(path, "Login required.");
		#[cfg(not(feature = "tracing"))]
		let _ = path;
	}
}

/// Emits one notice per failed request unless its status is silent.
pub struct ErrorNotice {
	notifier: Arc<dyn Notifier>,
	config: Arc<ClientConfig>,
}
impl ErrorNotice {
	/// Reads the silent statuses and notice texts from `config`.
	pub fn new(config: Arc<ClientConfig>, notifier: Arc<dyn Notifier>) -> Self {
		Self { notifier, config }
	}

	fn notice_for(&self, error: &Error) -> Option<String> {
		let messages = &self.config.messages;

		match error.kind() {
			ErrorKind::AuthInvalid => Some(messages.relogin.clone()),
			ErrorKind::Network | ErrorKind::AuthExpired | ErrorKind::Client | ErrorKind::Server => {
				if error.status().is_some_and(|status| self.config.is_silent(status)) {
					return None;
				}

				Some(error.message().map_or_else(|| messages.fallback.clone(), ToOwned::to_owned))
			},
			ErrorKind::Decode | ErrorKind::Config | ErrorKind::Storage => None,
		}
	}
}
impl ResponseLayer for ErrorNotice {
	fn on_outcome(&self, _: &ApiRequest, outcome: Result<ApiResponse>) -> Result<ApiResponse> {
		if let Some(message) = outcome.as_ref().err().and_then(|e| self.notice_for(e)) {
			self.notifier.notify_error(&message);
		}

		outcome
	}
}
impl Debug for ErrorNotice {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ErrorNotice").field("silent", &self.config.silent_statuses).finish()
	}
}

/// Sends the user to the login path once the session is unrecoverable.
pub struct LoginRedirect {
	notifier: Arc<dyn Notifier>,
	path: String,
}
impl LoginRedirect {
	/// Creates a redirect layer targeting `path`.
	pub fn new(notifier: Arc<dyn Notifier>, path: impl Into<String>) -> Self {
		Self { notifier, path: path.into() }
	}
}
impl ResponseLayer for LoginRedirect {
	fn on_outcome(&self, _: &ApiRequest, outcome: Result<ApiResponse>) -> Result<ApiResponse> {
		if matches!(&outcome, Err(e) if e.kind() == ErrorKind::AuthInvalid) {
			self.notifier.redirect_to_login(&self.path);
		}

		outcome
	}
}
impl Debug for LoginRedirect {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRedirect").field("path", &self.path).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::TransportError;

	#[derive(Default)]
	struct Recorder {
		notices: RwLock<Vec<String>>,
		redirects: RwLock<Vec<String>>,
	}
	impl Notifier for Recorder {
		fn notify_error(&self, message: &str) {
			self.notices.write().push(message.to_owned());
		}

		fn redirect_to_login(&self, path: &str) {
			self.redirects.write().push(path.to_owned());
		}
	}

	fn notices_for(error: Error) -> Vec<String> {
		notices_with(ClientConfig::default(), error)
	}

	fn notices_with(config: ClientConfig, error: Error) -> Vec<String> {
		let recorder = Arc::new(Recorder::default());
		let layer = ErrorNotice::new(Arc::new(config), recorder.clone());

		let _ = layer.on_outcome(&ApiRequest::get("/wallet"), Err(error));

		recorder.notices.read().clone()
	}

	#[test]
	fn silent_statuses_are_not_announced() {
		assert!(notices_for(Error::Client { status: 404, message: Some("Missing".into()) }).is_empty());
		assert!(notices_for(Error::Client { status: 422, message: None }).is_empty());
	}

	#[test]
	fn configured_silent_statuses_replace_the_defaults() {
		let config = ClientConfig::builder()
			.silent_statuses([409])
			.build()
			.expect("Config should validate.");

		assert!(
			notices_with(config.clone(), Error::Client { status: 409, message: Some("Taken".into()) })
				.is_empty()
		);
		assert_eq!(notices_with(config, Error::Client { status: 404, message: None }).len(), 1);
	}

	#[test]
	fn loud_failures_prefer_the_backend_message() {
		assert_eq!(
			notices_for(Error::Server { status: 500, message: Some("Ledger offline".into()), retry_after: None }),
			["Ledger offline"],
		);
		assert_eq!(
			notices_for(Error::Client { status: 409, message: None }),
			["Something went wrong. Please try again."],
		);
		assert_eq!(
			notices_for(TransportError::Io(std::io::Error::other("reset")).into()),
			["Something went wrong. Please try again."],
		);
	}

	#[test]
	fn unrecoverable_auth_asks_for_login() {
		let invalid = || Error::AuthInvalid { reason: "no refresh token".into(), status: None, source: None };

		assert_eq!(notices_for(invalid()), ["Please log in again."]);

		let recorder = Arc::new(Recorder::default());
		let layer = LoginRedirect::new(recorder.clone(), "/member/login");

		let _ = layer.on_outcome(&ApiRequest::get("/wallet"), Err(invalid()));
		let _ = layer.on_outcome(&ApiRequest::get("/wallet"), Err(Error::AuthExpired { message: None }));

		assert_eq!(*recorder.redirects.read(), ["/member/login"]);
	}
}

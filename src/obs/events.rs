//! Debug and warning events emitted along the request lifecycle. Token values never appear here.

// self
use crate::{_prelude::*, http::ApiRequest, obs::RequestPhase};

pub(crate) fn token_resolved(request: &ApiRequest, source: Option<&str>) {
	#[cfg(feature = "tracing")]
	::tracing::debug!(
		method = %request.method,
		path = %request.path,
		has_token = source.is_some(),
		token_source = source.unwrap_or("none"),
		"Resolved bearer token."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (request, source);
}

pub(crate) fn phase(request: &ApiRequest, phase: RequestPhase) {
	#[cfg(feature = "tracing")]
	::tracing::debug!(
		method = %request.method,
		path = %request.path,
		phase = phase.as_str(),
		"Request phase changed."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (request, phase);
}

pub(crate) fn unreadable_document(key: &str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	::tracing::warn!(key, %error, "Ignoring unreadable persisted document.");
	#[cfg(not(feature = "tracing"))]
	let _ = (key, error);
}

pub(crate) fn best_effort_failed(action: &'static str, error: &Error) {
	#[cfg(feature = "tracing")]
	::tracing::warn!(action, %error, "Best-effort call failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (action, error);
}

pub(crate) fn session_torn_down(reason: &str) {
	#[cfg(feature = "tracing")]
	::tracing::info!(reason, "Session cleared after an unrecoverable auth failure.");
	#[cfg(not(feature = "tracing"))]
	let _ = reason;
}

//! Optional observability helpers for client flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured spans named `member_client.flow` with the
//!   `flow` and `stage` fields, plus debug events for token resolution and request phases.
//! - Enable `metrics` to increment the `member_client_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod events;
mod metrics;
mod tracing;

pub(crate) use events::*;
pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Client flows observed by the span and metric helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Generic API request through the pipeline.
	Request,
	/// Access token refresh.
	Refresh,
	/// Credential login.
	Login,
	/// Member registration.
	Register,
	/// Session teardown.
	Logout,
	/// Profile reload.
	Profile,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Request => "request",
			FlowKind::Refresh => "refresh",
			FlowKind::Login => "login",
			FlowKind::Register => "register",
			FlowKind::Logout => "logout",
			FlowKind::Profile => "profile",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a client helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Lifecycle of a single request through the recovery protocol.
///
/// `Initial` leads to `Done` on success, to `Refreshing` on a first 401, or to `Failed`.
/// `Refreshing` leads to `Retried` when the refresh succeeds and to `Failed` otherwise.
/// `Done`, `Retried`, and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestPhase {
	/// Dispatching the first attempt.
	Initial,
	/// First attempt hit a 401; refreshing the access token.
	Refreshing,
	/// Replayed once with the refreshed token.
	Retried,
	/// First attempt succeeded.
	Done,
	/// Failure propagated to the caller.
	Failed,
}
impl RequestPhase {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestPhase::Initial => "initial",
			RequestPhase::Refreshing => "refreshing",
			RequestPhase::Retried => "retried",
			RequestPhase::Done => "done",
			RequestPhase::Failed => "failed",
		}
	}

	/// Returns `true` for phases that end the lifecycle.
	pub const fn is_terminal(self) -> bool {
		matches!(self, RequestPhase::Retried | RequestPhase::Done | RequestPhase::Failed)
	}
}
impl Display for RequestPhase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

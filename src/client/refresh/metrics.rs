// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh calls.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	coalesced: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of refresh calls that reached the refresh step.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that stored a new access token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that tore the session down.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of 401s that reused a token refreshed by a concurrent caller.
	pub fn coalesced(&self) -> u64 {
		self.coalesced.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_coalesced(&self) {
		self.coalesced.fetch_add(1, Ordering::Relaxed);
	}
}

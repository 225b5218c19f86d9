// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh attempts of one [`Fresh`](crate::fresh::Fresh) cache.
#[derive(Debug, Default)]
pub struct FreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl FreshMetrics {
	/// Returns the total number of refresh attempts, foreground and background.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::SeqCst)
	}

	/// Returns the number of refreshes that produced a new value.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refreshes.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Counts a new attempt and returns its sequence number (starting at one).
	pub(crate) fn record_attempt(&self) -> u64 {
		self.attempts.fetch_add(1, Ordering::SeqCst) + 1
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn attempts_are_numbered_from_one() {
		let metrics = FreshMetrics::default();

		assert_eq!(metrics.record_attempt(), 1);
		assert_eq!(metrics.record_attempt(), 2);

		metrics.record_success();
		metrics.record_failure();

		assert_eq!((metrics.attempts(), metrics.successes(), metrics.failures()), (2, 1, 1));
	}
}

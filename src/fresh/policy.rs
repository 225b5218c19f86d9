// self
use crate::_prelude::*;

/// Timing rules for auto-refreshing caches.
///
/// After every successful fetch the next refresh is scheduled
/// `max(minimum_refresh_interval, expires_in - safety_margin)` from now, so short-lived tokens
/// cannot cause a refresh storm. A failed background refresh is retried after
/// `minimum_refresh_interval`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
	minimum_refresh_interval: Duration,
	safety_margin: Duration,
}
impl RefreshPolicy {
	/// Default floor between two refreshes.
	pub const DEFAULT_MINIMUM_REFRESH_INTERVAL: Duration = Duration::seconds(30);
	/// Default head start taken before a value expires.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(60);

	/// Policy with the default interval and margin.
	pub const fn new() -> Self {
		Self {
			minimum_refresh_interval: Self::DEFAULT_MINIMUM_REFRESH_INTERVAL,
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
		}
	}

	/// Overrides the minimum refresh interval; negative values clamp to zero.
	pub fn with_minimum_refresh_interval(mut self, interval: Duration) -> Self {
		self.minimum_refresh_interval = interval.max(Duration::ZERO);

		self
	}

	/// Overrides the safety margin; negative values clamp to zero.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = margin.max(Duration::ZERO);

		self
	}

	/// Floor between two refreshes, also used as the retry delay after a background failure.
	pub fn minimum_refresh_interval(&self) -> Duration {
		self.minimum_refresh_interval
	}

	/// Head start taken before a value expires.
	pub fn safety_margin(&self) -> Duration {
		self.safety_margin
	}

	/// Delay before refreshing a value that expires in `expires_in`.
	pub fn refresh_delay(&self, expires_in: Duration) -> Duration {
		self.minimum_refresh_interval.max(expires_in.saturating_sub(self.safety_margin))
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self::new()
	}
}

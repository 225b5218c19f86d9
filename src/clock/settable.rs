// self
use crate::{
	_prelude::*,
	clock::{Clock, ScheduleHandle, ScheduledTask, system, timer_delay},
	error::ScheduleError,
};

/// Wall clock with an adjustable offset whose scheduling delays can be compressed.
///
/// Scheduled tasks still run on real timers; dividing every delay by the same factor keeps their
/// relative order while letting a test observe a 30 second refresh in a fraction of a second.
/// Moving the clock with [`advance`](Self::advance) or [`set`](Self::set) changes what
/// [`now`](Clock::now) reports but does not fire pending tasks early.
#[derive(Clone, Debug)]
pub struct SettableClock {
	offset: Arc<Mutex<Duration>>,
	compression: u32,
}
impl SettableClock {
	/// Starts at the current wall time with no compression.
	pub fn new() -> Self {
		Self { offset: Default::default(), compression: 1 }
	}

	/// Divides every scheduling delay by `factor` (values below one are treated as one).
	pub fn compressed(mut self, factor: u32) -> Self {
		self.compression = factor.max(1);

		self
	}

	/// Current compression factor.
	pub fn compression(&self) -> u32 {
		self.compression
	}

	/// Moves the reported time forward by `by`.
	pub fn advance(&self, by: Duration) {
		*self.offset.lock() += by;
	}

	/// Makes the clock report `instant` from now on, then tick with wall time.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.offset.lock() = instant - OffsetDateTime::now_utc();
	}
}
impl Default for SettableClock {
	fn default() -> Self {
		Self::new()
	}
}
impl Clock for SettableClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc() + *self.offset.lock()
	}

	fn schedule(
		&self,
		delay: Duration,
		task: ScheduledTask,
	) -> Result<ScheduleHandle, ScheduleError> {
		let compressed = delay / self.compression;

		system::spawn_after(timer_delay(compressed), task)
	}
}

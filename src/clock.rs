//! Time and scheduling abstraction used by signers and freshness caches.
//!
//! [`Clock`] answers "what time is it" and "run this later". Production code uses
//! [`SystemClock`], which runs scheduled tasks on a process-wide timer runtime. Tests substitute
//! [`SettableClock`] (wall time with an adjustable offset and compressed delays) or
//! [`ManualClock`] (fully simulated time driven by the holder).

mod manual;
mod settable;
mod system;

pub use manual::*;
pub use settable::*;
pub use system::*;

// std
use std::sync::atomic::{AtomicU8, Ordering};
// crates.io
use tokio::task::AbortHandle;
// self
use crate::{_prelude::*, error::ScheduleError};

/// Deferred work handed to [`Clock::schedule`].
pub type ScheduledTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Source of the current time and of delayed execution.
pub trait Clock
where
	Self: 'static + Send + Sync,
{
	/// Current instant according to this clock.
	fn now(&self) -> OffsetDateTime;

	/// Runs `task` once `delay` has elapsed, on an execution context other than the caller's.
	///
	/// Implementations must call [`ScheduleHandle::fire`] before running the task and skip it when
	/// that returns `false`.
	fn schedule(
		&self,
		delay: Duration,
		task: ScheduledTask,
	) -> Result<ScheduleHandle, ScheduleError>;
}

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Lifecycle of a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
	/// Waiting for its delay to elapse.
	Pending,
	/// Started (or finished) running.
	Fired,
	/// Cancelled before it fired.
	Cancelled,
}

/// Cancellable reference to a task submitted through [`Clock::schedule`].
///
/// Clones share state, so the clock keeps one clone to [`fire`](Self::fire) and the caller keeps
/// another to [`cancel`](Self::cancel); exactly one of the two wins.
#[derive(Clone, Debug, Default)]
pub struct ScheduleHandle {
	state: Arc<AtomicU8>,
	abort: Option<AbortHandle>,
}
impl ScheduleHandle {
	/// Creates a pending handle.
	pub fn new() -> Self {
		Self::default()
	}

	/// Attaches the runtime task backing this handle so cancellation also frees the timer.
	pub fn with_abort(mut self, abort: AbortHandle) -> Self {
		self.abort = Some(abort);

		self
	}

	/// Marks the task as started; returns `false` when it was cancelled first.
	pub fn fire(&self) -> bool {
		self.state.compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire).is_ok()
	}

	/// Prevents a pending task from running; returns `false` when it already fired or was
	/// cancelled. A running task is never interrupted.
	pub fn cancel(&self) -> bool {
		let cancelled = self
			.state
			.compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
			.is_ok();

		if let Some(abort) = self.abort.as_ref().filter(|_| cancelled) {
			abort.abort();
		}

		cancelled
	}

	/// Current lifecycle state.
	pub fn state(&self) -> ScheduleState {
		match self.state.load(Ordering::Acquire) {
			PENDING => ScheduleState::Pending,
			FIRED => ScheduleState::Fired,
			_ => ScheduleState::Cancelled,
		}
	}

	/// Returns `true` while the task has neither fired nor been cancelled.
	pub fn is_pending(&self) -> bool {
		self.state() == ScheduleState::Pending
	}
}

/// Converts a possibly negative delay into a timer duration, clamping at zero.
pub(crate) fn timer_delay(delay: Duration) -> std::time::Duration {
	if delay.is_positive() { delay.unsigned_abs() } else { std::time::Duration::ZERO }
}

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use time::macros::datetime;
// self
use crate::{
	_prelude::*,
	clock::{Clock, ScheduleHandle, ScheduledTask},
	error::ScheduleError,
};

/// Fully simulated clock: time only moves, and scheduled tasks only run, when the holder says so.
///
/// Tasks become due once simulated time reaches their deadline and run inside
/// [`advance`](Self::advance) or [`run_due`](Self::run_due), ordered by deadline and then by
/// submission order. Tasks scheduled while those run are picked up in the same pass if they are
/// already due.
#[derive(Clone)]
pub struct ManualClock {
	state: Arc<ManualState>,
}
struct ManualState {
	now: Mutex<OffsetDateTime>,
	queue: Mutex<Vec<Queued>>,
	next_seq: AtomicU64,
}
struct Queued {
	due: OffsetDateTime,
	seq: u64,
	handle: ScheduleHandle,
	task: ScheduledTask,
}
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self {
			state: Arc::new(ManualState {
				now: Mutex::new(start),
				queue: Default::default(),
				next_seq: AtomicU64::new(0),
			}),
		}
	}

	/// Moves simulated time forward by `by` and runs every task that became due.
	///
	/// Returns how many tasks ran.
	pub async fn advance(&self, by: Duration) -> usize {
		*self.state.now.lock() += by;

		self.run_due().await
	}

	/// Runs every task whose deadline is not after the current simulated time.
	pub async fn run_due(&self) -> usize {
		let mut ran = 0;

		while let Some(queued) = self.pop_due() {
			if queued.handle.fire() {
				queued.task.await;

				ran += 1;
			}
		}

		ran
	}

	/// Number of tasks that are scheduled and neither fired nor cancelled.
	pub fn pending(&self) -> usize {
		self.state.queue.lock().iter().filter(|queued| queued.handle.is_pending()).count()
	}

	/// Earliest deadline among pending tasks.
	pub fn next_due(&self) -> Option<OffsetDateTime> {
		self.state
			.queue
			.lock()
			.iter()
			.filter(|queued| queued.handle.is_pending())
			.map(|queued| queued.due)
			.min()
	}

	fn pop_due(&self) -> Option<Queued> {
		let now = *self.state.now.lock();
		let mut queue = self.state.queue.lock();

		queue.retain(|queued| queued.handle.is_pending());

		let index = queue
			.iter()
			.enumerate()
			.filter(|(_, queued)| queued.due <= now)
			.min_by_key(|(_, queued)| (queued.due, queued.seq))
			.map(|(index, _)| index)?;

		Some(queue.swap_remove(index))
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(datetime!(2024-01-01 00:00 UTC))
	}
}
impl Debug for ManualClock {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ManualClock")
			.field("now", &*self.state.now.lock())
			.field("pending", &self.pending())
			.finish()
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.state.now.lock()
	}

	fn schedule(
		&self,
		delay: Duration,
		task: ScheduledTask,
	) -> Result<ScheduleHandle, ScheduleError> {
		let handle = ScheduleHandle::new();
		let due = self.now() + delay.max(Duration::ZERO);
		let seq = self.state.next_seq.fetch_add(1, Ordering::Relaxed);

		self.state.queue.lock().push(Queued { due, seq, handle: handle.clone(), task });

		Ok(handle)
	}
}

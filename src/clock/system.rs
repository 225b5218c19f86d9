// std
use std::sync::LazyLock;
// crates.io
use tokio::runtime::{Builder, Handle, Runtime};
// self
use crate::{
	_prelude::*,
	clock::{Clock, ScheduleHandle, ScheduledTask, timer_delay},
	error::ScheduleError,
};

// Statics are never dropped, so the runtime lives until the process exits.
static TIMER_RUNTIME: Mutex<Option<Runtime>> = parking_lot::const_mutex(None);
static SHARED: LazyLock<Arc<dyn Clock>> = LazyLock::new(|| Arc::new(SystemClock));

/// Wall-clock [`Clock`] whose scheduled tasks run on a shared background timer runtime.
///
/// The runtime is created on first use and shared by every [`SystemClock`] in the process. It is
/// independent of any runtime the caller happens to be on, so background refreshes keep running
/// after a caller's own runtime shuts down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemClock;
impl SystemClock {
	/// Process-wide instance, ready to inject wherever an `Arc<dyn Clock>` is expected.
	pub fn shared() -> Arc<dyn Clock> {
		SHARED.clone()
	}
}
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}

	fn schedule(
		&self,
		delay: Duration,
		task: ScheduledTask,
	) -> Result<ScheduleHandle, ScheduleError> {
		spawn_after(timer_delay(delay), task)
	}
}

/// Spawns `task` on the shared timer runtime after `delay`.
pub(crate) fn spawn_after(
	delay: std::time::Duration,
	task: ScheduledTask,
) -> Result<ScheduleHandle, ScheduleError> {
	let runtime = timer_handle()?;
	let handle = ScheduleHandle::new();
	let trigger = handle.clone();
	let join = runtime.spawn(async move {
		tokio::time::sleep(delay).await;

		if trigger.fire() {
			task.await;
		}
	});

	Ok(handle.with_abort(join.abort_handle()))
}

fn timer_handle() -> Result<Handle, ScheduleError> {
	let mut slot = TIMER_RUNTIME.lock();

	if let Some(runtime) = slot.as_ref() {
		return Ok(runtime.handle().clone());
	}

	let runtime = Builder::new_multi_thread()
		.worker_threads(2)
		.thread_name("oauth2-fresh-timer")
		.enable_all()
		.build()
		.map_err(|e| ScheduleError::TimerRuntime { source: Arc::new(e) })?;
	let handle = runtime.handle().clone();

	*slot = Some(runtime);

	Ok(handle)
}

//! Freshness cache that serves one value and replaces it before it goes stale.
//!
//! A [`Fresh`] starts empty. The first [`get`](Fresh::get) fetches the value through its
//! [`Refresh`] source; later calls return the cached [`Arc`] until the value expires, at which
//! point exactly one refresh is attempted. Refreshes are single-flight: callers that arrive while
//! one is running wait for it and share its outcome instead of issuing their own request.
//!
//! In auto-refresh mode every successful fetch schedules the next one on the cache's [`Clock`]
//! according to its [`RefreshPolicy`], so readers rarely wait. A failed background refresh keeps
//! the previous value, is recorded on the failure channel ([`Fresh::last_failure`] and the
//! observability layer), and is retried after the policy's minimum interval.
//!
//! Dropping the last handle cancels any pending scheduled refresh.

mod metrics;
mod policy;

pub use metrics::FreshMetrics;
pub use policy::RefreshPolicy;

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	clock::{Clock, ScheduleHandle, ScheduledTask},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Boxed future returned by [`Refresh::refresh`].
pub type RefreshFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Values that know how long they stay valid.
pub trait Expiring {
	/// Remaining lifetime measured from the moment the value was obtained; `None` never expires.
	fn expires_in(&self) -> Option<Duration>;
}

/// Source of new values for a [`Fresh`] cache.
pub trait Refresh<T>
where
	Self: 'static + Send + Sync,
{
	/// Fetches a replacement value.
	fn refresh(&self) -> RefreshFuture<'_, T>;
}

/// Record of the most recent failed refresh.
#[derive(Clone, Debug)]
pub struct RefreshFailure {
	/// Error returned by the refresh source (or by the clock, when rescheduling failed).
	pub error: Error,
	/// Instant the failure was observed.
	pub failed_at: OffsetDateTime,
	/// Whether the attempt ran from a scheduled background refresh.
	pub background: bool,
	/// Sequence number of the failed attempt, see [`FreshMetrics::attempts`].
	pub attempt: u64,
}

/// Self-refreshing cache around a single value.
///
/// Handles are cheap to clone and share one cache.
pub struct Fresh<T>
where
	T: 'static + Send + Sync + Expiring,
{
	inner: Arc<FreshInner<T>>,
}
impl<T> Fresh<T>
where
	T: 'static + Send + Sync + Expiring,
{
	/// Cache that refreshes only when a caller finds the value missing or expired.
	pub fn lazy(clock: Arc<dyn Clock>, refresher: impl Refresh<T>) -> Self {
		Self::build(clock, Box::new(refresher), RefreshPolicy::default(), false)
	}

	/// Cache that also schedules a background refresh after every successful fetch.
	///
	/// Nothing is fetched until the first [`get`](Self::get).
	pub fn auto_refreshing(
		clock: Arc<dyn Clock>,
		refresher: impl Refresh<T>,
		policy: RefreshPolicy,
	) -> Self {
		Self::build(clock, Box::new(refresher), policy, true)
	}

	fn build(
		clock: Arc<dyn Clock>,
		refresher: Box<dyn Refresh<T>>,
		policy: RefreshPolicy,
		auto: bool,
	) -> Self {
		Self {
			inner: Arc::new(FreshInner {
				slot: RwLock::new(None),
				gate: AsyncMutex::new(()),
				refresher,
				clock,
				policy,
				auto,
				pending: Mutex::new(None),
				metrics: FreshMetrics::default(),
				generation: AtomicU64::new(0),
				last_failure: Mutex::new(None),
			}),
		}
	}

	/// Returns the current value, refreshing it first when it is missing or expired.
	///
	/// A failure on first access propagates. When an expired value exists and its refresh fails,
	/// the failure is recorded and the expired value is returned.
	///
	/// Besides first population and waiting on an in-flight refresh, a call also blocks while it
	/// retries the refresh of an expired value itself. During an outage that outlives the value,
	/// every such call pays one failed attempt before it receives the stale value; use
	/// [`peek`](Self::peek) to read without any I/O.
	pub async fn get(&self) -> Result<Arc<T>> {
		self.inner.get(false).await
	}

	/// Like [`get`](Self::get), but never returns an expired value: a failed refresh is returned
	/// as an error.
	pub async fn get_fresh(&self) -> Result<Arc<T>> {
		self.inner.get(true).await
	}

	/// Refreshes unconditionally, waiting for any refresh already in flight first.
	pub async fn refresh(&self) -> Result<Arc<T>> {
		let _gate = self.inner.gate.lock().await;

		self.inner.refresh_locked(false).await
	}

	/// Cached value regardless of freshness, without I/O.
	pub fn peek(&self) -> Option<Arc<T>> {
		self.inner.current().map(|entry| entry.value)
	}

	/// Expiry instant of the cached value, when it has one.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.inner.current().and_then(|entry| entry.expires_at)
	}

	/// Instant the cached value was fetched.
	pub fn fetched_at(&self) -> Option<OffsetDateTime> {
		self.inner.current().map(|entry| entry.fetched_at)
	}

	/// Returns `true` when a value is cached and has not expired.
	pub fn is_fresh(&self) -> bool {
		let now = self.inner.clock.now();

		self.inner.current().is_some_and(|entry| entry.is_fresh_at(now))
	}

	/// Most recent refresh failure; cleared by the next success.
	pub fn last_failure(&self) -> Option<RefreshFailure> {
		self.inner.last_failure.lock().as_ref().map(|(_, failure)| failure.clone())
	}

	/// Attempt/success/failure counters.
	pub fn metrics(&self) -> &FreshMetrics {
		&self.inner.metrics
	}

	/// Timing rules applied by this cache.
	pub fn policy(&self) -> RefreshPolicy {
		self.inner.policy
	}

	/// Whether refreshes are scheduled in the background.
	pub fn is_auto_refreshing(&self) -> bool {
		self.inner.auto
	}

	/// Whether a background refresh is currently scheduled.
	pub fn has_pending_refresh(&self) -> bool {
		self.inner.pending.lock().as_ref().is_some_and(ScheduleHandle::is_pending)
	}
}
impl<T> Clone for Fresh<T>
where
	T: 'static + Send + Sync + Expiring,
{
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<T> Debug for Fresh<T>
where
	T: 'static + Send + Sync + Expiring,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Fresh")
			.field("auto", &self.inner.auto)
			.field("policy", &self.inner.policy)
			.field("fetched_at", &self.fetched_at())
			.field("expires_at", &self.expires_at())
			.field("metrics", &self.inner.metrics)
			.finish_non_exhaustive()
	}
}

struct Entry<T> {
	value: Arc<T>,
	fetched_at: OffsetDateTime,
	expires_at: Option<OffsetDateTime>,
	generation: u64,
}
impl<T> Entry<T> {
	fn is_fresh_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|expires_at| now < expires_at)
	}
}
impl<T> Clone for Entry<T> {
	fn clone(&self) -> Self {
		Self {
			value: self.value.clone(),
			fetched_at: self.fetched_at,
			expires_at: self.expires_at,
			generation: self.generation,
		}
	}
}

struct FreshInner<T> {
	slot: RwLock<Option<Entry<T>>>,
	// Single-flight refresh gate.
	gate: AsyncMutex<()>,
	refresher: Box<dyn Refresh<T>>,
	clock: Arc<dyn Clock>,
	policy: RefreshPolicy,
	auto: bool,
	pending: Mutex<Option<ScheduleHandle>>,
	metrics: FreshMetrics,
	// Completed refreshes; lets a waiter tell whether one finished while it queued on `gate`.
	generation: AtomicU64,
	last_failure: Mutex<Option<(u64, RefreshFailure)>>,
}
impl<T> FreshInner<T>
where
	T: 'static + Send + Sync + Expiring,
{
	fn current(&self) -> Option<Entry<T>> {
		self.slot.read().clone()
	}

	async fn get(self: &Arc<Self>, strict: bool) -> Result<Arc<T>> {
		let now = self.clock.now();

		if let Some(entry) = self.current().filter(|entry| entry.is_fresh_at(now)) {
			return Ok(entry.value);
		}

		let observed = self.generation();
		let _gate = self.gate.lock().await;
		let current = self.current();

		// Someone else refreshed while this caller waited; share their outcome.
		if let Some(entry) = current.as_ref().filter(|entry| entry.generation > observed) {
			return Ok(entry.value.clone());
		}

		let failure = self
			.last_failure
			.lock()
			.as_ref()
			.filter(|(generation, _)| *generation > observed)
			.map(|(_, failure)| failure.error.clone());

		if let Some(error) = failure {
			return Self::fallback(current, error, strict);
		}

		let now = self.clock.now();

		if let Some(entry) = current.as_ref().filter(|entry| entry.is_fresh_at(now)) {
			return Ok(entry.value.clone());
		}

		match self.refresh_locked(false).await {
			Ok(value) => Ok(value),
			Err(e) => Self::fallback(current, e, strict),
		}
	}

	fn fallback(current: Option<Entry<T>>, error: Error, strict: bool) -> Result<Arc<T>> {
		match current {
			Some(entry) if !strict => Ok(entry.value),
			_ => Err(error),
		}
	}

	// Callers must hold `gate`.
	async fn refresh_locked(self: &Arc<Self>, background: bool) -> Result<Arc<T>> {
		const KIND: FlowKind = FlowKind::Refresh;

		let stage = if background { "background" } else { "foreground" };
		let span = FlowSpan::new(KIND, stage);
		let attempt = self.metrics.record_attempt();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.refresher.refresh()).await;
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

		match result {
			Ok(value) => {
				let fetched_at = self.clock.now();
				let expires_in = value.expires_in();
				let expires_at = expires_in.and_then(|ttl| fetched_at.checked_add(ttl));
				let value = Arc::new(value);

				*self.slot.write() =
					Some(Entry { value: value.clone(), fetched_at, expires_at, generation });
				*self.last_failure.lock() = None;

				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				if self.auto {
					match expires_in.filter(|_| expires_at.is_some()) {
						Some(ttl) => self.schedule_refresh(self.policy.refresh_delay(ttl)),
						None => self.cancel_pending(),
					}
				}

				Ok(value)
			},
			Err(e) => {
				self.record_failure(e.clone(), background, attempt, generation);

				if background {
					self.schedule_refresh(self.policy.minimum_refresh_interval());
				}

				Err(e)
			},
		}
	}

	fn generation(&self) -> u64 {
		self.generation.load(Ordering::SeqCst)
	}

	fn record_failure(&self, error: Error, background: bool, attempt: u64, generation: u64) {
		let failed_at = self.clock.now();

		self.metrics.record_failure();
		obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Failure);
		obs::warn_refresh_failure(&error, background, attempt);

		*self.last_failure.lock() =
			Some((generation, RefreshFailure { error, failed_at, background, attempt }));
	}

	fn schedule_refresh(self: &Arc<Self>, delay: Duration) {
		let weak = Arc::downgrade(self);
		let task: ScheduledTask = Box::pin(Self::scheduled_refresh(weak));
		let mut pending = self.pending.lock();

		if let Some(previous) = pending.take() {
			previous.cancel();
		}

		match self.clock.schedule(delay, task) {
			Ok(handle) => *pending = Some(handle),
			Err(e) => {
				drop(pending);

				self.record_failure(e.into(), true, self.metrics.attempts(), self.generation());
			},
		}
	}

	fn cancel_pending(&self) {
		if let Some(previous) = self.pending.lock().take() {
			previous.cancel();
		}
	}

	async fn scheduled_refresh(weak: Weak<Self>) {
		let Some(inner) = weak.upgrade() else {
			return;
		};
		let observed = inner.generation();
		let _gate = inner.gate.lock().await;

		// A foreground refresh completed while this task waited and already rescheduled.
		if inner.current().is_some_and(|entry| entry.generation > observed) {
			return;
		}

		let _ = inner.refresh_locked(true).await;
	}
}
impl<T> Drop for FreshInner<T> {
	fn drop(&mut self) {
		if let Some(pending) = self.pending.get_mut().take() {
			pending.cancel();
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use super::*;
	use crate::{clock::ManualClock, error::TransportError};

	#[derive(Debug)]
	struct Token {
		value: &'static str,
		ttl: Option<i64>,
	}
	impl Expiring for Token {
		fn expires_in(&self) -> Option<Duration> {
			self.ttl.map(Duration::seconds)
		}
	}

	#[derive(Clone, Default)]
	struct Scripted {
		queue: Arc<Mutex<VecDeque<Result<Token>>>>,
		calls: Arc<AtomicUsize>,
		hold: Arc<AsyncMutex<()>>,
	}
	impl Scripted {
		fn ok(&self, value: &'static str, ttl: Option<i64>) -> &Self {
			self.queue.lock().push_back(Ok(Token { value, ttl }));

			self
		}

		fn err(&self) -> &Self {
			self.queue.lock().push_back(Err(outage()));

			self
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl Refresh<Token> for Scripted {
		fn refresh(&self) -> RefreshFuture<'_, Token> {
			Box::pin(async move {
				let _held = self.hold.lock().await;

				self.calls.fetch_add(1, Ordering::SeqCst);

				let next = self.queue.lock().pop_front();

				next.expect("Refresh script ran out of responses.")
			})
		}
	}

	fn outage() -> Error {
		TransportError::network(std::io::Error::other("token endpoint unreachable")).into()
	}

	fn lazy(clock: &ManualClock, script: &Scripted) -> Fresh<Token> {
		Fresh::lazy(Arc::new(clock.clone()), script.clone())
	}

	fn auto(clock: &ManualClock, script: &Scripted) -> Fresh<Token> {
		Fresh::auto_refreshing(Arc::new(clock.clone()), script.clone(), RefreshPolicy::default())
	}

	#[tokio::test]
	async fn consecutive_gets_share_cached_instance() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.ok("a", Some(300));

		let fresh = lazy(&clock, &script);
		let first = fresh.get().await.expect("First access should fetch.");
		let second = fresh.get().await.expect("Second access should hit the cache.");

		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(script.calls(), 1);
		assert!(fresh.is_fresh());
		assert_eq!(fresh.expires_at(), Some(clock.now() + Duration::seconds(300)));
	}

	#[tokio::test]
	async fn first_access_failure_propagates_then_recovers() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.err().ok("a", Some(300));

		let fresh = lazy(&clock, &script);
		let err = fresh.get().await.expect_err("Empty cache cannot hide a failure.");

		assert!(matches!(err, Error::RequestExecution(_)));
		assert!(fresh.peek().is_none());

		let failure = fresh.last_failure().expect("Failure should be recorded.");

		assert!(!failure.background);
		assert_eq!(failure.attempt, 1);
		assert_eq!(fresh.get().await.expect("Retry should succeed.").value, "a");
		assert!(fresh.last_failure().is_none());
	}

	#[tokio::test]
	async fn expired_value_triggers_exactly_one_refresh() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.ok("a", Some(60)).ok("b", Some(60));

		let fresh = lazy(&clock, &script);

		fresh.get().await.expect("First access should fetch.");
		clock.advance(Duration::seconds(60)).await;

		assert!(!fresh.is_fresh());
		assert_eq!(fresh.get().await.expect("Expired value should refresh.").value, "b");
		assert_eq!(fresh.get().await.expect("New value should be cached.").value, "b");
		assert_eq!(script.calls(), 2);
	}

	#[tokio::test]
	async fn get_serves_stale_value_while_get_fresh_reports_failure() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.ok("a", Some(60)).err().err();

		let fresh = lazy(&clock, &script);

		fresh.get().await.expect("First access should fetch.");
		clock.advance(Duration::seconds(61)).await;

		assert_eq!(fresh.get().await.expect("Stale value should be served.").value, "a");
		assert!(fresh.get_fresh().await.is_err());
		assert_eq!(fresh.metrics().failures(), 2);
		assert_eq!(fresh.metrics().attempts(), 3);
		assert_eq!(script.calls(), 3);
	}

	#[tokio::test]
	async fn auto_refresh_replaces_value_before_expiry() {
		let clock = ManualClock::default();
		let start = clock.now();
		let script = Scripted::default();

		script.ok("12345", Some(30)).ok("67890", Some(3_600));

		let fresh = auto(&clock, &script);

		assert_eq!(clock.pending(), 0);
		assert_eq!(fresh.get().await.expect("First access should fetch.").value, "12345");
		assert!(fresh.has_pending_refresh());
		assert_eq!(clock.next_due(), Some(start + Duration::seconds(30)));
		assert_eq!(clock.advance(Duration::seconds(30)).await, 1);
		assert_eq!(fresh.get().await.expect("Background value should be served.").value, "67890");
		assert_eq!(script.calls(), 2);
		assert_eq!(clock.next_due(), Some(start + Duration::seconds(30 + 3_540)));
	}

	#[tokio::test]
	async fn background_failure_keeps_value_and_reschedules() {
		let clock = ManualClock::default();
		let start = clock.now();
		let script = Scripted::default();

		script.ok("12345", Some(30)).err().ok("67890", Some(30));

		let fresh = auto(&clock, &script);

		fresh.get().await.expect("First access should fetch.");
		clock.advance(Duration::seconds(30)).await;

		let failure = fresh.last_failure().expect("Background failure should be recorded.");

		assert!(failure.background);
		assert_eq!(fresh.peek().map(|token| token.value), Some("12345"));
		assert_eq!(clock.next_due(), Some(start + Duration::seconds(60)));

		clock.advance(Duration::seconds(30)).await;

		assert_eq!(fresh.peek().map(|token| token.value), Some("67890"));
		assert!(fresh.last_failure().is_none());
		assert_eq!(script.calls(), 3);
	}

	#[tokio::test]
	async fn values_without_expiry_are_never_refreshed() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.ok("forever", None);

		let fresh = auto(&clock, &script);
		let first = fresh.get().await.expect("First access should fetch.");

		assert!(!fresh.has_pending_refresh());

		clock.advance(Duration::days(365)).await;

		let later = fresh.get().await.expect("Value should still be cached.");

		assert!(Arc::ptr_eq(&first, &later));
		assert_eq!(script.calls(), 1);
	}

	#[tokio::test]
	async fn dropping_last_handle_cancels_pending_refresh() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.ok("12345", Some(300));

		let fresh = auto(&clock, &script);
		let other = fresh.clone();

		fresh.get().await.expect("First access should fetch.");
		drop(fresh);

		assert_eq!(clock.pending(), 1);

		drop(other);

		assert_eq!(clock.pending(), 0);
		assert_eq!(clock.advance(Duration::hours(1)).await, 0);
		assert_eq!(script.calls(), 1);
	}

	#[tokio::test]
	async fn concurrent_gets_issue_single_request() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.ok("shared", Some(300));

		let fresh = lazy(&clock, &script);
		let hold = script.hold.lock().await;
		let waiters = (0..8)
			.map(|_| {
				let fresh = fresh.clone();

				tokio::spawn(async move { fresh.get().await })
			})
			.collect::<Vec<_>>();

		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		drop(hold);

		let mut values = Vec::new();

		for waiter in waiters {
			values.push(waiter.await.expect("Waiter should not panic.").expect("Get should succeed."));
		}

		assert_eq!(script.calls(), 1);
		assert!(values.iter().all(|value| Arc::ptr_eq(value, &values[0])));
	}

	#[tokio::test]
	async fn late_waiters_share_in_flight_failure() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.err().ok("unused", Some(300));

		let fresh = lazy(&clock, &script);
		let hold = script.hold.lock().await;
		let waiters = (0..4)
			.map(|_| {
				let fresh = fresh.clone();

				tokio::spawn(async move { fresh.get().await })
			})
			.collect::<Vec<_>>();

		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		drop(hold);

		for waiter in waiters {
			let result = waiter.await.expect("Waiter should not panic.");

			assert!(matches!(result, Err(Error::RequestExecution(_))));
		}

		assert_eq!(script.calls(), 1);
	}

	#[tokio::test]
	async fn explicit_refresh_bypasses_cache() {
		let clock = ManualClock::default();
		let script = Scripted::default();

		script.ok("a", Some(300)).ok("b", Some(300));

		let fresh = lazy(&clock, &script);

		fresh.get().await.expect("First access should fetch.");

		assert_eq!(fresh.refresh().await.expect("Forced refresh should succeed.").value, "b");
		assert_eq!(fresh.peek().map(|token| token.value), Some("b"));
	}
}

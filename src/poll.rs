//! Periodic job status observation.
//!
//! A [`JobPollingCoordinator`] runs at most one poll task. Each task owns a generation number;
//! observations are published under the coordinator lock and only while that generation is
//! still current, so nothing from a stopped or replaced poll reaches subscribers.

// std
use std::sync::Weak;
// crates.io
use tokio::{
	sync::{broadcast, watch},
	task::JoinHandle,
	time::{self as tokio_time, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	auth::JobId,
	jobs::{Job, JobsClient},
	obs::{self, OpKind, OpOutcome, OpSpan},
	service::ServiceDescriptor,
};

const EVENT_CAPACITY: usize = 64;

/// Notifications emitted by the poller.
#[derive(Clone, Debug)]
pub enum PollEvent {
	/// A tick observed the job.
	Updated(Job),
	/// The job reached a terminal status; sent once per poll, after the last `Updated`.
	Finished(Job),
	/// A tick failed; polling continues on the next tick.
	TickFailed {
		/// Job being polled.
		job_id: JobId,
		/// Failure of this tick.
		error: Arc<Error>,
	},
	/// Polling stopped: the session can no longer authorize calls or the job no longer exists.
	Abandoned {
		/// Job that was being polled.
		job_id: JobId,
		/// Failure that ended the poll.
		error: Arc<Error>,
	},
}

/// Handle returned by [`JobPollingCoordinator::start`].
///
/// A handle only controls the poll that produced it; once that poll is stopped or replaced,
/// [`PollHandle::cancel`] does nothing.
#[derive(Clone, Debug)]
pub struct PollHandle {
	job_id: JobId,
	generation: u64,
	inner: Weak<Inner>,
}
impl PollHandle {
	/// Job this handle observes.
	pub fn job_id(&self) -> &JobId {
		&self.job_id
	}

	/// `true` while this handle's poll is the coordinator's active poll.
	pub fn is_active(&self) -> bool {
		self.inner.upgrade().is_some_and(|inner| {
			inner.state.lock().active.as_ref().is_some_and(|active| active.generation == self.generation)
		})
	}

	/// Stops this handle's poll if it is still active. Returns whether anything was stopped.
	pub fn cancel(&self) -> bool {
		let Some(inner) = self.inner.upgrade() else {
			return false;
		};
		let mut state = inner.state.lock();

		if state.active.as_ref().is_some_and(|active| active.generation == self.generation) {
			state.cancel_active();

			true
		} else {
			false
		}
	}
}

/// Polls one job at a time and publishes its observed state.
///
/// Dropping the coordinator stops the active poll.
pub struct JobPollingCoordinator {
	jobs: JobsClient,
	period: std::time::Duration,
	inner: Arc<Inner>,
}
impl JobPollingCoordinator {
	/// Creates a coordinator polling at the descriptor's `poll_interval`.
	///
	/// A non-positive interval (possible when the descriptor skipped validation) falls back to
	/// the default interval.
	pub fn new(jobs: JobsClient) -> Self {
		let period = poll_period(jobs.gateway().lifecycle().descriptor().poll_interval);
		let (current, _) = watch::channel(None);
		let (events, _) = broadcast::channel(EVENT_CAPACITY);

		Self {
			jobs,
			period,
			inner: Arc::new(Inner { state: Mutex::new(PollState::default()), current, events }),
		}
	}

	/// Starts polling `job_id`, replacing any poll of a different job.
	///
	/// The first status fetch happens immediately. Starting the job that is already being
	/// polled returns a handle to the existing poll. Must be called inside a Tokio runtime.
	pub fn start(&self, job_id: JobId) -> PollHandle {
		let mut state = self.inner.state.lock();

		if let Some(active) = state.active.as_ref().filter(|active| active.job_id == job_id) {
			return self.handle(job_id, active.generation);
		}

		state.cancel_active();

		let generation = state.generation;
		let task = tokio::spawn(run_poll(
			self.inner.clone(),
			self.jobs.clone(),
			job_id.clone(),
			generation,
			self.period,
		));

		state.active = Some(ActivePoll { job_id: job_id.clone(), generation, task });
		self.inner.current.send_replace(None);
		obs::debug(OpKind::Poll, format_args!("Started polling {job_id}."));

		self.handle(job_id, generation)
	}

	/// Stops the active poll, if any. Safe to call repeatedly.
	pub fn stop(&self) {
		self.inner.state.lock().cancel_active();
	}

	/// Job currently being polled.
	pub fn active_job(&self) -> Option<JobId> {
		self.inner.state.lock().active.as_ref().map(|active| active.job_id.clone())
	}

	/// `true` while a poll is running.
	pub fn is_polling(&self) -> bool {
		self.inner.state.lock().active.is_some()
	}

	/// Latest observation of the current job.
	pub fn current(&self) -> Option<Job> {
		self.inner.current.borrow().clone()
	}

	/// Receiver that yields every new observation.
	pub fn watch(&self) -> watch::Receiver<Option<Job>> {
		self.inner.current.subscribe()
	}

	/// Subscribes to poll events.
	pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
		self.inner.events.subscribe()
	}

	fn handle(&self, job_id: JobId, generation: u64) -> PollHandle {
		PollHandle { job_id, generation, inner: Arc::downgrade(&self.inner) }
	}
}
impl Drop for JobPollingCoordinator {
	fn drop(&mut self) {
		self.stop();
	}
}
impl Debug for JobPollingCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JobPollingCoordinator")
			.field("period", &self.period)
			.field("active_job", &self.active_job())
			.finish_non_exhaustive()
	}
}

struct Inner {
	state: Mutex<PollState>,
	current: watch::Sender<Option<Job>>,
	events: broadcast::Sender<PollEvent>,
}
impl Inner {
	// Returns whether the poll should continue.
	fn publish(&self, generation: u64, job: Job) -> bool {
		let mut state = self.state.lock();

		if state.generation != generation {
			return false;
		}

		let terminal = job.is_terminal();

		self.current.send_replace(Some(job.clone()));

		if terminal {
			let _ = self.events.send(PollEvent::Updated(job.clone()));
			let _ = self.events.send(PollEvent::Finished(job));

			state.active = None;

			return false;
		}

		let _ = self.events.send(PollEvent::Updated(job));

		true
	}

	// Returns whether the poll should continue.
	fn report_failure(&self, generation: u64, job_id: &JobId, error: Error) -> bool {
		let mut state = self.state.lock();

		if state.generation != generation {
			return false;
		}

		let error = Arc::new(error);

		if error.ends_session() || matches!(*error, Error::Rejected { status: 404, .. }) {
			obs::warn(OpKind::Poll, format_args!("Abandoning poll of {job_id}: {error}"));

			let _ = self.events.send(PollEvent::Abandoned { job_id: job_id.clone(), error });

			state.active = None;

			return false;
		}

		obs::warn(OpKind::Poll, format_args!("Poll tick for {job_id} failed: {error}"));

		let _ = self.events.send(PollEvent::TickFailed { job_id: job_id.clone(), error });

		true
	}
}

fn poll_period(interval: Duration) -> std::time::Duration {
	if interval.is_positive() {
		interval.unsigned_abs()
	} else {
		ServiceDescriptor::default_poll_interval().unsigned_abs()
	}
}

#[derive(Default)]
struct PollState {
	generation: u64,
	active: Option<ActivePoll>,
}
impl PollState {
	// Invalidates in-flight ticks even when nothing is active.
	fn cancel_active(&mut self) {
		self.generation += 1;

		if let Some(active) = self.active.take() {
			active.task.abort();
			obs::debug(OpKind::Poll, format_args!("Stopped polling {}.", active.job_id));
		}
	}
}

struct ActivePoll {
	job_id: JobId,
	generation: u64,
	task: JoinHandle<()>,
}

async fn run_poll(
	inner: Arc<Inner>,
	jobs: JobsClient,
	job_id: JobId,
	generation: u64,
	period: std::time::Duration,
) {
	const KIND: OpKind = OpKind::Poll;

	let mut ticker = tokio_time::interval(period);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		ticker.tick().await;

		let span = OpSpan::new(KIND, "tick");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(jobs.status(&job_id)).await;

		obs::record_result(KIND, &result);

		let keep_polling = match result {
			Ok(job) => inner.publish(generation, job),
			Err(error) => inner.report_failure(generation, &job_id, error),
		};

		if !keep_polling {
			return;
		}
	}
}

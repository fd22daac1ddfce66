//! Cleanup coordination for tracked resources.
//!
//! A [`CleanupCoordinator`] owns the registration table for every resource
//! created against it and decides where each cleanup action runs:
//!
//! - **Explicit release** always runs on the caller's thread, immediately.
//! - **Drop** runs inline or hands the action to a background worker,
//!   depending on [`DispatchMode`].
//!
//! Either way an action runs exactly once. The coordinator never holds the
//! resources themselves, only their actions, so it cannot keep a resource
//! alive.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, error, trace};

use crate::config::{CoordinatorConfig, DispatchMode};
use crate::error::{CleanupError, CleanupResult};
use crate::memory_management::{
    CleanupAction, CleanupQueue, CleanupQueueStats, RegistrationId, RegistrationTable,
};
use crate::notice::{ConsoleSink, NoticeSink};

/// Callback invoked with the error of every cleanup action that panics
pub type FailureHandler = Arc<dyn Fn(&CleanupError) + Send + Sync + 'static>;

/// What caused a cleanup action to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseTrigger {
    /// The holder asked for it
    Explicit,
    /// The owning handle was dropped
    Dropped,
}

/// State shared between the coordinator, its worker and every live handle
pub(crate) struct Shared {
    config: CoordinatorConfig,
    registrations: RegistrationTable,
    queue: CleanupQueue,
    sink: Arc<dyn NoticeSink>,
    on_failure: Option<FailureHandler>,
    total_executed: AtomicUsize,
    explicit_releases: AtomicUsize,
    reclaimed: AtomicUsize,
    failed: AtomicUsize,
}

impl Shared {
    fn release(&self, id: RegistrationId) -> bool {
        match self.registrations.take(id) {
            Some(action) => {
                self.execute(id, action, ReleaseTrigger::Explicit);
                true
            }
            None => false,
        }
    }

    fn reclaim(&self, id: RegistrationId) {
        let Some(action) = self.registrations.take(id) else {
            return;
        };

        match self.config.dispatch {
            DispatchMode::Inline => self.execute(id, action, ReleaseTrigger::Dropped),
            DispatchMode::Background => {
                if let Err((id, action)) = self.queue.push(id, action) {
                    trace!(
                        coordinator = %self.config.name,
                        %id,
                        "worker stopped, running cleanup inline"
                    );
                    self.execute(id, action, ReleaseTrigger::Dropped);
                }
            }
        }
    }

    fn execute(&self, id: RegistrationId, action: CleanupAction, trigger: ReleaseTrigger) {
        let label = action.label().to_string();
        let outcome = action.run_guarded(id);

        self.total_executed.fetch_add(1, Ordering::Relaxed);
        match trigger {
            ReleaseTrigger::Explicit => self.explicit_releases.fetch_add(1, Ordering::Relaxed),
            ReleaseTrigger::Dropped => self.reclaimed.fetch_add(1, Ordering::Relaxed),
        };

        match outcome {
            Ok(()) => {
                trace!(coordinator = %self.config.name, %id, ?trigger, %label, "cleanup ran");
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(coordinator = %self.config.name, %id, ?trigger, %label, "{}", err);
                if let Some(handler) = &self.on_failure {
                    // Drop paths call into here, so a panicking handler must not unwind.
                    if panic::catch_unwind(AssertUnwindSafe(|| handler(&err))).is_err() {
                        error!(coordinator = %self.config.name, %id, "failure handler panicked");
                    }
                }
            }
        }
    }

    fn drain_pending(&self) -> usize {
        let batch = self.queue.take_all();
        let count = batch.len();
        if count == 0 {
            return 0;
        }

        if count >= self.config.parallel_threshold {
            batch
                .into_par_iter()
                .for_each(|(id, action)| self.execute(id, action, ReleaseTrigger::Dropped));
        } else {
            for (id, action) in batch {
                self.execute(id, action, ReleaseTrigger::Dropped);
            }
        }

        self.queue.finish(count);
        count
    }

    fn run_worker(&self) {
        debug!(coordinator = %self.config.name, "cleanup worker started");

        loop {
            let notified = self.queue.wait_for_work(self.config.poll_interval);
            let processed = self.drain_pending();
            if processed > 0 {
                trace!(
                    coordinator = %self.config.name,
                    processed,
                    notified,
                    "drained pending cleanups"
                );
                thread::yield_now();
            }

            if self.queue.is_closed() {
                break;
            }
        }

        // The queue refuses pushes once closed, so this drain is the last one.
        let processed = self.drain_pending();
        debug!(
            coordinator = %self.config.name,
            processed,
            "cleanup worker stopped"
        );
    }
}

/// Handle to one registration.
///
/// Dropping the handle releases the registration through the coordinator's
/// dispatch mode; [`clean`](Cleanable::clean) releases it right away.
pub struct Cleanable {
    id: RegistrationId,
    shared: Arc<Shared>,
}

impl Cleanable {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Run the cleanup action now, on this thread.
    ///
    /// Returns `true` if this call ran the action and `false` if it had
    /// already been consumed.
    pub fn clean(&self) -> bool {
        self.shared.release(self.id)
    }

    /// Whether the action is still waiting to be triggered
    pub fn is_registered(&self) -> bool {
        self.shared.registrations.contains(self.id)
    }
}

impl Drop for Cleanable {
    fn drop(&mut self) {
        self.shared.reclaim(self.id);
    }
}

impl std::fmt::Debug for Cleanable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleanable")
            .field("id", &self.id)
            .field("coordinator", &self.shared.config.name)
            .finish()
    }
}

/// Runs cleanup actions for registered resources exactly once
///
/// # Examples
///
/// ```
/// use heapstack::coordinator::CleanupCoordinator;
/// use heapstack::memory_management::CleanupAction;
/// use heapstack::notice::SilentSink;
/// use std::panic::{self, AssertUnwindSafe};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let coordinator = CleanupCoordinator::builder()
///     .sink(Arc::new(SilentSink))
///     .build()
///     .unwrap();
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
/// let cleanable = coordinator.register(CleanupAction::new("count", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// assert!(cleanable.clean());
/// assert!(!cleanable.clean());
/// drop(cleanable);
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
pub struct CleanupCoordinator {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Create a coordinator from a config, printing notices to the console
    pub fn with_config(config: CoordinatorConfig) -> CleanupResult<Self> {
        CoordinatorBuilder::new().config(config).build()
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn dispatch(&self) -> DispatchMode {
        self.shared.config.dispatch
    }

    /// Sink that resources created against this coordinator report to
    pub fn sink(&self) -> Arc<dyn NoticeSink> {
        Arc::clone(&self.shared.sink)
    }

    /// Store an action and return the handle that triggers it
    pub fn register(&self, action: CleanupAction) -> Cleanable {
        let label = action.label().to_string();
        let id = self.shared.registrations.insert(action);
        debug!(coordinator = %self.name(), %id, %label, "registered cleanup action");

        Cleanable {
            id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run the action registered under `id` now, on this thread.
    ///
    /// Returns `false` if the id is unknown or its action already ran.
    pub fn release(&self, id: RegistrationId) -> bool {
        self.shared.release(id)
    }

    /// Ask the worker to process pending cleanups.
    ///
    /// Advisory: returns immediately and guarantees nothing about when, or
    /// whether, the pending cleanups finish.
    pub fn request_reclamation(&self) {
        debug!(
            coordinator = %self.name(),
            pending = self.pending_count(),
            "reclamation requested"
        );
        if self.dispatch() == DispatchMode::Background {
            self.shared.queue.notify_work();
        }
    }

    /// Wait up to `timeout` for every pending cleanup to finish.
    ///
    /// Returns `Ok(true)` when nothing is left, `Ok(false)` on timeout, and
    /// [`CleanupError::Interrupted`] if the coordinator shuts down first.
    ///
    /// Only drops that returned before this call are covered. A drop racing
    /// with it on another thread may not be counted yet.
    pub fn await_quiescence(&self, timeout: Duration) -> CleanupResult<bool> {
        self.shared.queue.await_idle(timeout)
    }

    /// Registrations whose actions have not been triggered yet
    pub fn registered_count(&self) -> usize {
        self.shared.registrations.len()
    }

    /// Triggered cleanups the worker has not finished
    pub fn pending_count(&self) -> usize {
        self.shared.queue.outstanding()
    }

    pub fn stats(&self) -> CoordinatorStats {
        let shared = &self.shared;
        CoordinatorStats {
            name: shared.config.name.clone(),
            dispatch: shared.config.dispatch,
            total_registered: shared.registrations.total_registered(),
            total_executed: shared.total_executed.load(Ordering::Relaxed),
            explicit_releases: shared.explicit_releases.load(Ordering::Relaxed),
            reclaimed: shared.reclaimed.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
            currently_registered: shared.registrations.len(),
            currently_pending: shared.queue.outstanding(),
            worker: shared.queue.get_stats(),
        }
    }

    /// Stop the worker after it drains everything already queued.
    ///
    /// Resources dropped afterwards run their cleanup inline.
    pub fn shutdown(&self) {
        self.shared.queue.close();

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!(coordinator = %self.name(), "cleanup worker panicked");
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.is_closed()
    }
}

impl Drop for CleanupCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CleanupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupCoordinator")
            .field("name", &self.shared.config.name)
            .field("dispatch", &self.shared.config.dispatch)
            .field("registered", &self.registered_count())
            .finish()
    }
}

/// Statistics for a cleanup coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub name: String,
    pub dispatch: DispatchMode,
    /// Total actions ever registered
    pub total_registered: usize,
    /// Total actions that ran, failed ones included
    pub total_executed: usize,
    /// Actions run by explicit release
    pub explicit_releases: usize,
    /// Actions run because their handle was dropped
    pub reclaimed: usize,
    /// Actions that panicked
    pub failed: usize,
    pub currently_registered: usize,
    pub currently_pending: usize,
    /// Hand-offs to the background worker; all zero in inline mode
    pub worker: CleanupQueueStats,
}

/// Builder for [`CleanupCoordinator`]
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    sink: Option<Arc<dyn NoticeSink>>,
    on_failure: Option<FailureHandler>,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            sink: None,
            on_failure: None,
        }
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.config.dispatch = dispatch;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    pub fn parallel_threshold(mut self, threshold: usize) -> Self {
        self.config.parallel_threshold = threshold;
        self
    }

    /// Where notices go. Defaults to [`ConsoleSink`].
    pub fn sink(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Called with the error of every cleanup action that panics
    pub fn on_action_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CleanupError) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> CleanupResult<CleanupCoordinator> {
        self.config.validate()?;

        let queue = CleanupQueue::new(&self.config.name);
        let shared = Arc::new(Shared {
            registrations: RegistrationTable::new(),
            queue,
            sink: self.sink.unwrap_or_else(|| Arc::new(ConsoleSink)),
            on_failure: self.on_failure,
            total_executed: AtomicUsize::new(0),
            explicit_releases: AtomicUsize::new(0),
            reclaimed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            config: self.config,
        });

        let worker = match shared.config.dispatch {
            DispatchMode::Inline => None,
            DispatchMode::Background => Some(spawn_worker(Arc::clone(&shared))?),
        };

        debug!(
            coordinator = %shared.config.name,
            dispatch = %shared.config.dispatch,
            "cleanup coordinator created"
        );

        Ok(CleanupCoordinator {
            shared,
            worker: Mutex::new(worker),
        })
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_worker(shared: Arc<Shared>) -> CleanupResult<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("cleanup-{}", shared.config.name))
        .spawn(move || shared.run_worker())
        .map_err(|e| CleanupError::WorkerSpawn(e.to_string()))
}

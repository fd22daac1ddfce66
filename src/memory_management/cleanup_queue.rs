//! Pending cleanup queue and worker wake-up signalling
//!
//! Actions whose resources were dropped while the coordinator runs in
//! background mode wait here until the worker thread drains them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use super::registry::{CleanupAction, RegistrationId};
use crate::error::{CleanupError, CleanupResult};

/// A dropped resource's action waiting for the worker
pub type PendingCleanup = (RegistrationId, CleanupAction);

/// Thread-safe queue of cleanups awaiting the background worker
#[derive(Debug)]
pub struct CleanupQueue {
    /// Name for debugging and statistics
    name: String,
    /// Pending cleanups, also guards the closed flag transitions
    pending: Mutex<Vec<PendingCleanup>>,
    /// Cleanups taken by the worker but not yet finished
    in_flight: AtomicUsize,
    total_enqueued: AtomicUsize,
    total_processed: AtomicUsize,
    closed: AtomicBool,
    /// Work notification channel
    work_notify_sender: Sender<()>,
    work_notify_receiver: Receiver<()>,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl CleanupQueue {
    /// Create a new queue with the given name
    pub fn new(name: &str) -> Self {
        let (work_notify_sender, work_notify_receiver) = flume::bounded(1);

        Self {
            name: name.to_string(),
            pending: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            total_enqueued: AtomicUsize::new(0),
            total_processed: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            work_notify_sender,
            work_notify_receiver,
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a cleanup for the worker.
    ///
    /// Once the queue is closed the entry is handed back so the caller can
    /// run it itself; an action is never silently dropped.
    pub fn push(&self, id: RegistrationId, action: CleanupAction) -> Result<(), PendingCleanup> {
        let mut pending = self.pending.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err((id, action));
        }
        pending.push((id, action));
        drop(pending);

        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
        self.notify_work();
        Ok(())
    }

    /// Wake the worker. Never blocks; a notification already in the channel
    /// covers this one.
    pub fn notify_work(&self) {
        let _ = self.work_notify_sender.try_send(());
    }

    /// Block up to `timeout` for a work notification.
    ///
    /// Returns `true` if notified and `false` if the timeout elapsed. The
    /// queue holds its own sender, so the channel never disconnects.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        let notified = self.work_notify_receiver.recv_timeout(timeout).is_ok();

        // Drain any additional notifications that came in while waiting
        while self.work_notify_receiver.try_recv().is_ok() {}
        notified
    }

    /// Take every pending cleanup, marking them in flight until
    /// [`finish`](Self::finish) is called with the batch size.
    pub fn take_all(&self) -> Vec<PendingCleanup> {
        let mut pending = self.pending.lock();
        let batch = std::mem::take(&mut *pending);
        self.in_flight.fetch_add(batch.len(), Ordering::AcqRel);
        batch
    }

    /// Record that `count` taken cleanups have finished and wake waiters
    pub fn finish(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.total_processed.fetch_add(count, Ordering::Relaxed);
        self.in_flight.fetch_sub(count, Ordering::AcqRel);

        let _guard = self.idle_lock.lock();
        self.idle.notify_all();
    }

    /// Pending plus in-flight cleanups
    pub fn outstanding(&self) -> usize {
        let pending = self.pending.lock().len();
        pending + self.in_flight.load(Ordering::Acquire)
    }

    /// Refuse further pushes and wake the worker and any waiters
    pub fn close(&self) {
        let pending = self.pending.lock();
        self.closed.store(true, Ordering::Release);
        drop(pending);

        self.notify_work();
        let _guard = self.idle_lock.lock();
        self.idle.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Block until nothing is outstanding or `timeout` elapses.
    ///
    /// Returns `Ok(true)` once drained and `Ok(false)` on timeout. Closing the
    /// queue while cleanups are still outstanding interrupts the wait.
    pub fn await_idle(&self, timeout: Duration) -> CleanupResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.idle_lock.lock();

        loop {
            if self.outstanding() == 0 {
                return Ok(true);
            }
            if self.is_closed() {
                return Err(CleanupError::Interrupted);
            }
            if self.idle.wait_until(&mut guard, deadline).timed_out() {
                return Ok(self.outstanding() == 0);
            }
        }
    }

    /// Get statistics for this queue
    pub fn get_stats(&self) -> CleanupQueueStats {
        let currently_pending = self.pending.lock().len();

        CleanupQueueStats {
            name: self.name.clone(),
            total_enqueued: self.total_enqueued.load(Ordering::Relaxed),
            total_processed: self.total_processed.load(Ordering::Relaxed),
            currently_pending,
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for cleanup queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupQueueStats {
    /// Queue name
    pub name: String,
    /// Total cleanups handed to the worker
    pub total_enqueued: usize,
    /// Total cleanups the worker finished
    pub total_processed: usize,
    /// Cleanups waiting for the worker
    pub currently_pending: usize,
    /// Cleanups the worker is running right now
    pub in_flight: usize,
}

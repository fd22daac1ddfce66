//! Demonstration scenarios.
//!
//! The driver walks a coordinator through the lifetimes the demo is about: a
//! resource that lives for one call, a large batch that dies all at once, and
//! an explicitly released resource. After each it requests reclamation and
//! gives pending cleanups a bounded window to finish.

use std::time::Instant;

use tracing::{info, warn};

use crate::config::{DriverConfig, Scenario};
use crate::coordinator::CleanupCoordinator;
use crate::error::CleanupResult;
use crate::heap;
use crate::memory_management::TrackedResource;
use crate::notice::{Notice, SamplePoint};

/// Payload of the resource in the scoped scenario
pub const SCOPED_PAYLOAD: i64 = 23;

/// Payload of the resource in the explicit-release scenario
pub const EXPLICIT_PAYLOAD: i64 = 42;

/// Heap samples taken around the batch scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub created: usize,
    pub before: heap::HeapUsage,
    pub after: heap::HeapUsage,
    /// Whether every cleanup finished inside the pause window
    pub settled: bool,
}

/// Outcome of a full driver run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub scenarios_run: Vec<Scenario>,
    pub batch: Option<BatchReport>,
}

/// Runs demonstration scenarios against a coordinator
pub struct Driver<'a> {
    coordinator: &'a CleanupCoordinator,
    config: DriverConfig,
}

impl<'a> Driver<'a> {
    pub fn new(coordinator: &'a CleanupCoordinator, config: DriverConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Run every configured scenario in order
    pub fn run(&self) -> CleanupResult<DriverReport> {
        let mut report = DriverReport::default();

        for &scenario in &self.config.scenarios {
            info!(%scenario, "running scenario");
            match scenario {
                Scenario::Scoped => {
                    self.run_scoped()?;
                }
                Scenario::Batch => report.batch = Some(self.run_batch()?),
                Scenario::Explicit => {
                    self.run_explicit()?;
                }
            }
            report.scenarios_run.push(scenario);
        }

        self.say("End of demonstration");
        Ok(report)
    }

    /// One resource created and dropped inside a single call
    pub fn run_scoped(&self) -> CleanupResult<bool> {
        self.scoped_method();
        self.settle()
    }

    fn scoped_method(&self) {
        // The binding lives on this frame; the resource's registration lives
        // in the coordinator. Leaving the frame drops both.
        let resource = TrackedResource::new(self.coordinator, SCOPED_PAYLOAD);
        self.say(format!("Inside method: Object value = {}", resource.value()));
    }

    /// A large batch held in a growing collection, then dropped en masse
    pub fn run_batch(&self) -> CleanupResult<BatchReport> {
        let started = Instant::now();
        let mut resources = Vec::new();
        for payload in 0..self.config.batch_size {
            resources.push(TrackedResource::new(self.coordinator, payload));
        }
        let created = resources.len();
        info!(created, elapsed = ?started.elapsed(), "batch created");

        let before = heap::sample();
        self.sink_usage(SamplePoint::BeforeReclamation, before);

        drop(resources);
        let settled = self.settle()?;

        let after = heap::sample();
        self.sink_usage(SamplePoint::AfterReclamation, after);

        Ok(BatchReport {
            created,
            before,
            after,
            settled,
        })
    }

    /// A resource released twice by hand before it goes out of scope
    pub fn run_explicit(&self) -> CleanupResult<bool> {
        let resource = TrackedResource::new(self.coordinator, EXPLICIT_PAYLOAD);
        resource.release();
        if !resource.release() {
            self.say("Second release was a no-op");
        }
        drop(resource);
        self.settle()
    }

    /// Request reclamation, then wait at most the configured pause
    fn settle(&self) -> CleanupResult<bool> {
        self.say("Requesting reclamation...");
        self.coordinator.request_reclamation();

        let settled = self.coordinator.await_quiescence(self.config.pause)?;
        if !settled {
            warn!(
                pending = self.coordinator.pending_count(),
                pause = ?self.config.pause,
                "cleanups still pending after pause"
            );
        }
        Ok(settled)
    }

    fn sink_usage(&self, point: SamplePoint, usage: heap::HeapUsage) {
        self.coordinator.sink().emit(Notice::MemoryUsage {
            point,
            bytes: usage.in_use(),
        });
    }

    fn say(&self, text: impl Into<String>) {
        self.coordinator.sink().emit(Notice::message(text));
    }
}

//! Lifetime-tracked resources with exactly-once cleanup.
//!
//! A [`TrackedResource`](memory_management::TrackedResource) registers a
//! cleanup action with a [`CleanupCoordinator`](coordinator::CleanupCoordinator)
//! when it is created. The action runs once: on explicit release, or when the
//! resource is dropped, inline or on the coordinator's worker thread.

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod heap;
pub mod memory_management;
pub mod notice;
pub mod test_utils;

pub use config::{CoordinatorConfig, DispatchMode, DriverConfig, Scenario};
pub use coordinator::{Cleanable, CleanupCoordinator, CoordinatorBuilder, CoordinatorStats};
pub use error::{CleanupError, CleanupResult};
pub use memory_management::{CleanupAction, RegistrationId, TrackedResource};
pub use notice::{ConsoleSink, Notice, NoticeSink};

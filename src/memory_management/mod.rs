//! Tracked resources and the bookkeeping behind their cleanup
//!
//! ## Features
//!
//! - **Tracked Resources**: value wrappers registered for cleanup at construction
//! - **Registration Table**: identity-keyed actions, each handed out at most once
//! - **Cleanup Queue**: dropped resources' actions waiting for the background worker

// Submodules
pub mod cleanup_queue;
pub mod registry;
#[cfg(test)]
mod tests;
pub mod tracked;

// Re-export public APIs
pub use cleanup_queue::{CleanupQueue, CleanupQueueStats, PendingCleanup};
pub use registry::{CleanupAction, CleanupCallback, RegistrationId, RegistrationTable};
pub use tracked::TrackedResource;

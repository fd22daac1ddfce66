//! Test utilities for heapstack tests
//!
//! Shared fixtures so unit tests, integration tests and doc examples observe
//! notices the same way.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::DispatchMode;
use crate::coordinator::CleanupCoordinator;
use crate::notice::{Notice, NoticeSink};

/// Notice sink that records everything it receives, in arrival order.
///
/// # Examples
///
/// ```
/// use heapstack::notice::{Notice, NoticeSink};
/// use heapstack::test_utils::RecordingSink;
///
/// let sink = RecordingSink::new();
/// sink.emit(Notice::created(1));
/// sink.emit(Notice::cleaned(1));
///
/// assert_eq!(sink.created_values(), vec!["1".to_string()]);
/// assert_eq!(sink.count_cleaned("1"), 1);
/// ```
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every notice so far
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn created_values(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter_map(|notice| match notice {
                Notice::Created { value } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn cleaned_values(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter_map(|notice| match notice {
                Notice::Cleaned { value } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count_cleaned(&self, value: &str) -> usize {
        self.notices
            .lock()
            .iter()
            .filter(|notice| matches!(notice, Notice::Cleaned { value: v } if v == value))
            .count()
    }

    /// Rendered console lines, in arrival order
    pub fn lines(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl NoticeSink for RecordingSink {
    fn emit(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Coordinator wired to a fresh [`RecordingSink`].
///
/// Background coordinators poll every few milliseconds so tests settle fast.
pub fn recording_coordinator(dispatch: DispatchMode) -> (CleanupCoordinator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let coordinator = CleanupCoordinator::builder()
        .name(format!("test-{}", dispatch))
        .dispatch(dispatch)
        .poll_interval(Duration::from_millis(5))
        .sink(sink.clone())
        .build()
        .unwrap_or_else(|e| panic!("failed to build test coordinator: {}", e));
    (coordinator, sink)
}

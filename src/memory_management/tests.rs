//! Tests for tracked resources
//!
//! These exercise the resource wrapper together with a real coordinator in
//! both dispatch modes.

use super::*;
use crate::config::DispatchMode;
use crate::coordinator::CleanupCoordinator;
use crate::notice::Notice;
use crate::test_utils::{recording_coordinator, RecordingSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_creation_notice_is_emitted_immediately() {
    let (coordinator, sink) = recording_coordinator(DispatchMode::Inline);

    let resource = TrackedResource::new(&coordinator, 7);
    assert_eq!(sink.notices(), vec![Notice::created(7)]);
    assert!(!resource.is_released());
    assert_eq!(coordinator.registered_count(), 1);
}

#[test]
fn test_scope_exit_releases_inline() {
    let (coordinator, sink) = recording_coordinator(DispatchMode::Inline);

    {
        let resource = TrackedResource::new(&coordinator, 23);
        assert_eq!(*resource.value(), 23);
    }

    assert_eq!(
        sink.notices(),
        vec![Notice::created(23), Notice::cleaned(23)]
    );
    assert_eq!(coordinator.registered_count(), 0);
}

#[test]
fn test_double_release_produces_one_notice() {
    let (coordinator, sink) = recording_coordinator(DispatchMode::Inline);

    let resource = TrackedResource::new(&coordinator, 5);
    assert!(resource.release());
    assert!(!resource.release());
    assert!(resource.is_released());
    drop(resource);

    assert_eq!(sink.count_cleaned("5"), 1);
}

#[test]
fn test_released_resource_is_not_cleaned_again_by_reclamation() {
    let (coordinator, sink) = recording_coordinator(DispatchMode::Background);

    let resource = TrackedResource::new(&coordinator, 11);
    resource.release();
    drop(resource);
    coordinator.request_reclamation();

    assert_eq!(coordinator.await_quiescence(Duration::from_secs(5)), Ok(true));
    assert_eq!(sink.count_cleaned("11"), 1);
    assert_eq!(coordinator.stats().reclaimed, 0);
}

#[test]
fn test_explicit_release_runs_on_calling_thread_in_background_mode() {
    let (coordinator, sink) = recording_coordinator(DispatchMode::Background);

    let resource = TrackedResource::new(&coordinator, "socket");
    resource.release();

    // No wait needed: explicit release is synchronous.
    assert_eq!(sink.count_cleaned("socket"), 1);
}

#[test]
fn test_custom_action_runs_once() {
    let coordinator = CleanupCoordinator::builder()
        .sink(Arc::new(RecordingSink::new()))
        .build()
        .unwrap();
    let closed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&closed);

    let resource = TrackedResource::with_action(
        &coordinator,
        "handle",
        CleanupAction::new("close handle", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(*resource, "handle");
    drop(resource);

    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_each_resource_has_its_own_identity() {
    let (coordinator, _sink) = recording_coordinator(DispatchMode::Inline);

    let first = TrackedResource::new(&coordinator, 1);
    let second = TrackedResource::new(&coordinator, 1);
    assert_ne!(first.id(), second.id());

    first.release();
    assert!(first.is_released());
    assert!(!second.is_released());
}

//! Resources whose cleanup is tracked by a coordinator

use std::fmt;
use std::ops::Deref;

use super::registry::{CleanupAction, RegistrationId};
use crate::coordinator::{Cleanable, CleanupCoordinator};
use crate::notice::Notice;

/// A value wrapper with exactly one cleanup registration.
///
/// The cleanup action is registered when the resource is created. It runs
/// once, either through [`release`](TrackedResource::release) or when the
/// resource is dropped, whichever comes first.
///
/// # Examples
///
/// ```
/// use heapstack::coordinator::CleanupCoordinator;
/// use heapstack::memory_management::TrackedResource;
/// use heapstack::test_utils::RecordingSink;
/// use std::sync::Arc;
///
/// let sink = Arc::new(RecordingSink::new());
/// let coordinator = CleanupCoordinator::builder().sink(sink.clone()).build().unwrap();
///
/// let resource = TrackedResource::new(&coordinator, 23);
/// assert_eq!(*resource, 23);
///
/// assert!(resource.release());
/// assert!(!resource.release());
/// drop(resource);
///
/// assert_eq!(sink.cleaned_values(), vec!["23".to_string()]);
/// ```
pub struct TrackedResource<T> {
    value: T,
    cleanable: Cleanable,
}

impl<T> TrackedResource<T>
where
    T: fmt::Display + Clone + Send + Sync + 'static,
{
    /// Create a resource that reports its creation and cleanup as notices
    pub fn new(coordinator: &CleanupCoordinator, value: T) -> Self {
        let sink = coordinator.sink();
        sink.emit(Notice::created(&value));

        // The action gets its own copy so it never refers back to the resource.
        let captured = value.clone();
        let action = CleanupAction::new(format!("cleanup notice for {}", value), move || {
            sink.emit(Notice::cleaned(&captured));
        });

        Self::with_action(coordinator, value, action)
    }
}

impl<T> TrackedResource<T> {
    /// Create a resource with a caller-supplied cleanup action
    pub fn with_action(coordinator: &CleanupCoordinator, value: T, action: CleanupAction) -> Self {
        let cleanable = coordinator.register(action);
        Self { value, cleanable }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn id(&self) -> RegistrationId {
        self.cleanable.id()
    }

    /// Run the cleanup action now, on this thread.
    ///
    /// Returns `true` if this call ran it. Later calls, and the eventual drop,
    /// do nothing.
    pub fn release(&self) -> bool {
        self.cleanable.clean()
    }

    pub fn is_released(&self) -> bool {
        !self.cleanable.is_registered()
    }
}

impl<T> Deref for TrackedResource<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for TrackedResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedResource")
            .field("value", &self.value)
            .field("id", &self.cleanable.id())
            .field("released", &self.is_released())
            .finish()
    }
}

//! Registration table binding resource identities to cleanup actions

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::error::{CleanupError, CleanupResult};

/// Identity of a tracked resource's registration.
///
/// Ids are handed out by a [`RegistrationTable`] and never reused within it,
/// so a stale id can never release somebody else's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    /// Build an id from its raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value of this id
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A cleanup callback that runs once its resource is released
pub type CleanupCallback = Box<dyn FnOnce() + Send + Sync + 'static>;

/// A one-shot cleanup action.
///
/// The action owns everything it needs by value. It must never hold the
/// resource it cleans up, otherwise the resource could not be released.
pub struct CleanupAction {
    label: String,
    callback: CleanupCallback,
}

impl CleanupAction {
    /// Create a new action with a label used in diagnostics
    ///
    /// # Examples
    ///
    /// ```
    /// use heapstack::memory_management::CleanupAction;
    ///
    /// let action = CleanupAction::new("close file", || {});
    /// assert_eq!(action.label(), "close file");
    /// ```
    pub fn new<F>(label: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            callback: Box::new(callback),
        }
    }

    /// Diagnostic label of this action
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the action, catching any panic it raises.
    pub(crate) fn run_guarded(self, id: RegistrationId) -> CleanupResult<()> {
        let callback = self.callback;
        panic::catch_unwind(AssertUnwindSafe(callback)).map_err(|payload| {
            CleanupError::ActionPanicked {
                id,
                message: panic_message(payload.as_ref()),
            }
        })
    }
}

impl fmt::Debug for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Thread-safe table of active registrations.
///
/// Removing an entry is the single point that decides who runs an action:
/// whoever takes it out of the table owns it, so it can run at most once.
#[derive(Debug)]
pub struct RegistrationTable {
    next_id: AtomicU64,
    entries: DashMap<RegistrationId, CleanupAction>,
    total_registered: AtomicUsize,
}

impl RegistrationTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: DashMap::new(),
            total_registered: AtomicUsize::new(0),
        }
    }

    /// Store an action and return the id it was registered under
    pub fn insert(&self, action: CleanupAction) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(id, action);
        self.total_registered.fetch_add(1, Ordering::Relaxed);
        id
    }

    /// Remove an action from the table, handing ownership to the caller.
    ///
    /// Returns `None` if the id was never registered or was already taken.
    pub fn take(&self, id: RegistrationId) -> Option<CleanupAction> {
        self.entries.remove(&id).map(|(_, action)| action)
    }

    pub fn contains(&self, id: RegistrationId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of registrations ever made
    pub fn total_registered(&self) -> usize {
        self.total_registered.load(Ordering::Relaxed)
    }
}

impl Default for RegistrationTable {
    fn default() -> Self {
        Self::new()
    }
}

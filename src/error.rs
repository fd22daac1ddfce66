//! Error types for the heapstack runtime.

use thiserror::Error;

use crate::memory_management::RegistrationId;

/// Errors that can occur while coordinating cleanup actions
///
/// # Examples
///
/// ```
/// use heapstack::error::{CleanupError, CleanupResult};
///
/// let interrupted = CleanupError::Interrupted;
/// let spawn = CleanupError::WorkerSpawn("resource temporarily unavailable".to_string());
///
/// let success: CleanupResult<u32> = Ok(42);
/// let failure: CleanupResult<u32> = Err(CleanupError::Interrupted);
///
/// assert!(success.is_ok());
/// assert!(failure.is_err());
///
/// assert_eq!(interrupted.to_string(), "Wait for pending cleanups was interrupted");
/// assert_eq!(
///     spawn.to_string(),
///     "Failed to spawn cleanup worker: resource temporarily unavailable"
/// );
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CleanupError {
    /// The coordinator shut down while a caller was waiting for pending cleanups
    #[error("Wait for pending cleanups was interrupted")]
    Interrupted,
    /// A cleanup action panicked while running
    #[error("Cleanup action for registration {id} panicked: {message}")]
    ActionPanicked {
        id: RegistrationId,
        message: String,
    },
    /// The background worker thread could not be started
    #[error("Failed to spawn cleanup worker: {0}")]
    WorkerSpawn(String),
    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for cleanup operations
pub type CleanupResult<T> = Result<T, CleanupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_readable_messages() {
        let cases = [
            (
                CleanupError::Interrupted,
                "Wait for pending cleanups was interrupted",
            ),
            (
                CleanupError::ActionPanicked {
                    id: RegistrationId::from_raw(7),
                    message: "boom".into(),
                },
                "Cleanup action for registration #7 panicked: boom",
            ),
            (
                CleanupError::WorkerSpawn("no threads".into()),
                "Failed to spawn cleanup worker: no threads",
            ),
            (
                CleanupError::InvalidConfig("empty name".into()),
                "Invalid configuration: empty name",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn cleanup_result_alias_behaves_like_result() {
        fn take_result(value: CleanupResult<usize>) -> usize {
            value.unwrap_or_default()
        }

        assert_eq!(take_result(Ok(42)), 42);
        assert_eq!(take_result(Err(CleanupError::Interrupted)), 0);
    }
}

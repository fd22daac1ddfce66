//! Coordinator and driver configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CleanupError, CleanupResult};

/// How the cleanup of a dropped resource is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Run the action on the dropping thread before `drop` returns
    #[default]
    Inline,
    /// Hand the action to the coordinator's worker thread
    Background,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Inline => f.write_str("inline"),
            DispatchMode::Background => f.write_str("background"),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = CleanupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inline" => Ok(DispatchMode::Inline),
            "background" => Ok(DispatchMode::Background),
            other => Err(CleanupError::InvalidConfig(format!(
                "unknown dispatch mode '{}', expected 'inline' or 'background'",
                other
            ))),
        }
    }
}

/// Cleanup coordinator configuration
///
/// # Examples
///
/// ```
/// use heapstack::config::{CoordinatorConfig, DispatchMode};
/// use std::time::Duration;
///
/// let config = CoordinatorConfig {
///     name: "files".to_string(),
///     dispatch: DispatchMode::Background,
///     poll_interval: Duration::from_millis(50),
///     parallel_threshold: 1024,
/// };
///
/// assert!(config.validate().is_ok());
/// assert_eq!(CoordinatorConfig::default().dispatch, DispatchMode::Inline);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub name: String,
    pub dispatch: DispatchMode,
    /// How long the worker sleeps between checks when nobody notifies it
    pub poll_interval: Duration,
    /// Drained batches at least this large run on the rayon pool
    pub parallel_threshold: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            dispatch: DispatchMode::Inline,
            poll_interval: Duration::from_millis(100),
            parallel_threshold: 4096,
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> CleanupResult<()> {
        if self.name.trim().is_empty() {
            return Err(CleanupError::InvalidConfig(
                "coordinator name must not be empty".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(CleanupError::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.parallel_threshold == 0 {
            return Err(CleanupError::InvalidConfig(
                "parallel threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A demonstration the driver can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// One short-lived resource scoped to a single call
    Scoped,
    /// A large batch held in a growing collection, then dropped at once
    Batch,
    /// A resource released explicitly, twice, before it is dropped
    Explicit,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Scoped, Scenario::Batch, Scenario::Explicit];
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Scoped => f.write_str("scoped"),
            Scenario::Batch => f.write_str("batch"),
            Scenario::Explicit => f.write_str("explicit"),
        }
    }
}

impl FromStr for Scenario {
    type Err = CleanupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scoped" => Ok(Scenario::Scoped),
            "batch" => Ok(Scenario::Batch),
            "explicit" => Ok(Scenario::Explicit),
            other => Err(CleanupError::InvalidConfig(format!(
                "unknown scenario '{}'",
                other
            ))),
        }
    }
}

/// Demonstration driver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Resources created by the batch scenario
    pub batch_size: usize,
    /// Upper bound on the wait for background cleanups after each scenario
    pub pause: Duration,
    pub scenarios: Vec<Scenario>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            batch_size: 100_000,
            pause: Duration::from_millis(1000),
            scenarios: Scenario::ALL.to_vec(),
        }
    }
}

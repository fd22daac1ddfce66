//! User-facing notices emitted by tracked resources and the demo driver.
//!
//! Notices are the observable output of the crate. They are routed through a
//! [`NoticeSink`] so callers decide where they go: the console for the demo
//! binary, an in-memory recorder for tests.

use std::fmt;

/// Where a heap usage sample was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePoint {
    BeforeReclamation,
    AfterReclamation,
}

impl fmt::Display for SamplePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplePoint::BeforeReclamation => write!(f, "before reclamation"),
            SamplePoint::AfterReclamation => write!(f, "after reclamation"),
        }
    }
}

/// A single observable event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A tracked resource was constructed
    Created { value: String },
    /// A tracked resource's cleanup action ran
    Cleaned { value: String },
    /// Heap bytes in use at a sampling point
    MemoryUsage { point: SamplePoint, bytes: usize },
    /// Free-form driver narration
    Message(String),
}

impl Notice {
    pub fn created(value: impl fmt::Display) -> Self {
        Notice::Created {
            value: value.to_string(),
        }
    }

    pub fn cleaned(value: impl fmt::Display) -> Self {
        Notice::Cleaned {
            value: value.to_string(),
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Notice::Message(text.into())
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Created { value } => write!(f, "Object created with value: {}", value),
            Notice::Cleaned { value } => {
                write!(f, "Object with value: {} is being cleaned", value)
            }
            Notice::MemoryUsage { point, bytes } => {
                write!(f, "Memory used {}: {} bytes", point, bytes)
            }
            Notice::Message(text) => f.write_str(text),
        }
    }
}

/// Destination for notices. Implementations must tolerate concurrent calls
/// from the caller's thread and the cleanup worker.
pub trait NoticeSink: Send + Sync {
    fn emit(&self, notice: Notice);
}

/// Prints every notice to standard output, one per line
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl NoticeSink for ConsoleSink {
    fn emit(&self, notice: Notice) {
        println!("{}", notice);
    }
}

/// Discards every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl NoticeSink for SilentSink {
    fn emit(&self, _notice: Notice) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_render_console_lines() {
        let cases = [
            (Notice::created(23), "Object created with value: 23"),
            (Notice::cleaned(23), "Object with value: 23 is being cleaned"),
            (
                Notice::MemoryUsage {
                    point: SamplePoint::BeforeReclamation,
                    bytes: 1024,
                },
                "Memory used before reclamation: 1024 bytes",
            ),
            (
                Notice::MemoryUsage {
                    point: SamplePoint::AfterReclamation,
                    bytes: 0,
                },
                "Memory used after reclamation: 0 bytes",
            ),
            (Notice::message("Requesting reclamation..."), "Requesting reclamation..."),
        ];

        for (notice, expected) in cases {
            assert_eq!(notice.to_string(), expected);
        }
    }
}

//! Validation errors for inbound domain input.

use thiserror::Error;

/// A rejected input, carrying one message per bad field.
///
/// Validation collects every problem before failing so callers can fix a
/// request in one round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", .messages.join("; "))]
pub struct ValidationError {
    messages: Vec<String>,
}

impl ValidationError {
    /// Build from a list of field messages.
    #[must_use]
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    /// Build from a single message.
    #[must_use]
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    /// The individual field messages.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

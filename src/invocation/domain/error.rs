//! Error types for invocation domain validation and failure records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors returned when an invocation change violates its state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationDomainError {
    /// Transitioning between two lifecycle states is invalid.
    #[error("invalid invocation transition: {from} -> {to}")]
    InvalidTransition {
        /// Current lifecycle state.
        from: String,
        /// Requested target lifecycle state.
        to: String,
    },

    /// Partial results are only accepted while the call is in flight.
    #[error("progress can only be recorded while in progress (current state: {state})")]
    ProgressRequiresInProgress {
        /// Lifecycle state in canonical string form.
        state: String,
    },
}

/// Category of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorKind {
    /// The owning endpoint could not be reached or dropped the session.
    ConnectionError,
    /// The call exceeded its time bound.
    Timeout,
    /// The call was cancelled on request.
    Cancelled,
    /// The tool itself reported failure.
    RemoteToolError,
}

impl InvocationErrorKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionError => "connection_error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::RemoteToolError => "remote_tool_error",
        }
    }
}

impl fmt::Display for InvocationErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failure record attached to a failed invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct InvocationError {
    kind: InvocationErrorKind,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl InvocationError {
    /// Creates a failure record.
    #[must_use]
    pub fn new(kind: InvocationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            payload: None,
        }
    }

    /// Records a connection failure.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::ConnectionError, message)
    }

    /// Records that the call ran past `bound`.
    #[must_use]
    pub fn timed_out_after(bound: Duration) -> Self {
        Self::new(
            InvocationErrorKind::Timeout,
            format!("no response within {} ms", bound.as_millis()),
        )
    }

    /// Records an explicit cancellation.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(InvocationErrorKind::Cancelled, "invocation cancelled")
    }

    /// Records a failure reported by the tool, keeping its payload verbatim.
    #[must_use]
    pub fn remote(payload: Value) -> Self {
        let message = match &payload {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self {
            kind: InvocationErrorKind::RemoteToolError,
            message,
            payload: Some(payload),
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> InvocationErrorKind {
        self.kind
    }

    /// Returns a human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the remote error payload, if the tool supplied one.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}


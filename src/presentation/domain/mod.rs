//! Presentation descriptions produced for invocation snapshots.

use crate::invocation::domain::{InvocationErrorKind, InvocationId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Renderable description of one invocation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    /// Invocation the description was produced for.
    pub invocation_id: InvocationId,
    /// Name of the invoked tool.
    pub tool_name: String,
    /// Arguments the tool was invoked with.
    pub arguments: Value,
    /// One-line human-readable status.
    pub summary: String,
    /// State-specific content.
    pub body: PresentationBody,
}

/// State-specific content of a [`Presentation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PresentationBody {
    /// Nothing to show yet.
    Pending,
    /// Running, optionally with the latest partial output.
    InProgress {
        /// Most recent partial result, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial: Option<Value>,
    },
    /// Finished with a result.
    Complete {
        /// Final tool result.
        result: Value,
    },
    /// Finished with an error.
    Failed {
        /// Failure category, absent only for malformed snapshots.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<InvocationErrorKind>,
        /// Error message suitable for display.
        message: String,
    },
}

impl PresentationBody {
    /// Returns whether the body describes a finished invocation.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Failed { .. })
    }
}

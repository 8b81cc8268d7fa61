//! Generic presenter used when a tool has no bespoke presentation.

use crate::invocation::domain::{Invocation, InvocationState};
use crate::presentation::domain::{Presentation, PresentationBody};
use crate::presentation::ports::Presenter;
use serde_json::Value;

/// Presenter mapping each lifecycle state to a generic description.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPresenter;

impl FallbackPresenter {
    /// Creates the fallback presenter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Presenter for FallbackPresenter {
    fn present(&self, invocation: &Invocation) -> Presentation {
        let tool = invocation.tool_name();
        let (summary, body) = match invocation.state() {
            InvocationState::Pending => (format!("{tool}: waiting"), PresentationBody::Pending),
            InvocationState::InProgress => (
                format!("{tool}: running"),
                PresentationBody::InProgress {
                    partial: invocation.partial().cloned(),
                },
            ),
            InvocationState::Complete => (
                format!("{tool}: done"),
                PresentationBody::Complete {
                    result: invocation.result().cloned().unwrap_or(Value::Null),
                },
            ),
            InvocationState::Failed => {
                let error = invocation.error();
                let summary = error.map_or_else(
                    || format!("{tool}: failed"),
                    |failure| format!("{tool}: failed ({})", failure.kind()),
                );
                (
                    summary,
                    PresentationBody::Failed {
                        kind: error.map(|failure| failure.kind()),
                        message: error.map_or_else(
                            || "tool failed without an error record".to_owned(),
                            |failure| failure.message().to_owned(),
                        ),
                    },
                )
            }
        };

        Presentation {
            invocation_id: invocation.id(),
            tool_name: tool.to_owned(),
            arguments: invocation.arguments().clone(),
            summary,
            body,
        }
    }
}

//! Invocation aggregate and its lifecycle rules.

use super::{InvocationDomainError, InvocationError, InvocationId, InvocationState};
use crate::endpoint::domain::EndpointId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool call and everything observed about it so far.
///
/// `result` is set only once the invocation is complete, and `error` only
/// once it has failed. Terminal invocations never change again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    id: InvocationId,
    tool_name: String,
    owner_endpoint_id: EndpointId,
    arguments: Value,
    state: InvocationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partial: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<InvocationError>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Invocation {
    /// Creates a pending invocation.
    #[must_use]
    pub fn new(
        tool_name: impl Into<String>,
        owner_endpoint_id: EndpointId,
        arguments: Value,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: InvocationId::new(),
            tool_name: tool_name.into(),
            owner_endpoint_id,
            arguments,
            state: InvocationState::Pending,
            partial: None,
            result: None,
            error: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Returns the invocation identifier.
    #[must_use]
    pub const fn id(&self) -> InvocationId {
        self.id
    }

    /// Returns the name of the invoked tool.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the endpoint that owns the invoked tool.
    #[must_use]
    pub const fn owner_endpoint_id(&self) -> &EndpointId {
        &self.owner_endpoint_id
    }

    /// Returns the arguments supplied by the caller.
    #[must_use]
    pub const fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> InvocationState {
        self.state
    }

    /// Returns the most recent partial result, if the server streamed one.
    #[must_use]
    pub const fn partial(&self) -> Option<&Value> {
        self.partial.as_ref()
    }

    /// Returns the final result of a complete invocation.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the failure record of a failed invocation.
    #[must_use]
    pub const fn error(&self) -> Option<&InvocationError> {
        self.error.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the timestamp of the latest change.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether the invocation has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Marks the invocation as dispatched to its endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationDomainError::InvalidTransition`] unless the
    /// invocation is pending.
    pub fn mark_dispatched(&mut self, clock: &impl Clock) -> Result<(), InvocationDomainError> {
        self.transition_to(InvocationState::InProgress, clock)
    }

    /// Records a partial result streamed by the server.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationDomainError::ProgressRequiresInProgress`] unless
    /// the invocation is in progress.
    pub fn record_progress(
        &mut self,
        update: Value,
        clock: &impl Clock,
    ) -> Result<(), InvocationDomainError> {
        if self.state != InvocationState::InProgress {
            return Err(InvocationDomainError::ProgressRequiresInProgress {
                state: self.state.as_str().to_owned(),
            });
        }
        self.partial = Some(update);
        self.touch(clock);
        Ok(())
    }

    /// Completes the invocation with its final result.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationDomainError::InvalidTransition`] unless the
    /// invocation is in progress.
    pub fn complete(
        &mut self,
        result: Value,
        clock: &impl Clock,
    ) -> Result<(), InvocationDomainError> {
        self.transition_to(InvocationState::Complete, clock)?;
        self.result = Some(result);
        Ok(())
    }

    /// Fails the invocation with `error`.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationDomainError::InvalidTransition`] unless the
    /// invocation is in progress.
    pub fn fail(
        &mut self,
        error: InvocationError,
        clock: &impl Clock,
    ) -> Result<(), InvocationDomainError> {
        self.transition_to(InvocationState::Failed, clock)?;
        self.error = Some(error);
        Ok(())
    }

    fn transition_to(
        &mut self,
        target: InvocationState,
        clock: &impl Clock,
    ) -> Result<(), InvocationDomainError> {
        if !self.state.can_transition_to(target) {
            return Err(InvocationDomainError::InvalidTransition {
                from: self.state.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }
        self.state = target;
        self.touch(clock);
        Ok(())
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

//! Connector and session-handle ports.

use super::ProgressSink;
use crate::catalog::domain::ToolDefinition;
use crate::endpoint::domain::{EndpointDescriptor, EndpointId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Establishes sessions with tool servers.
///
/// Failures are scoped to the endpoint being connected; implementations must
/// not let one endpoint's failure affect sessions with other endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a session with `endpoint`.
    ///
    /// The returned handle owns exactly one underlying connection.
    async fn connect(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> ConnectorResult<Arc<dyn ConnectorHandle>>;
}

/// A live session with one tool server.
#[async_trait]
pub trait ConnectorHandle: Send + Sync {
    /// Returns the endpoint this handle is bound to.
    fn endpoint_id(&self) -> &EndpointId;

    /// Lists the tools the server currently exposes.
    ///
    /// Each call asks the server again; the result may change over time.
    async fn list_tools(&self) -> ConnectorResult<Vec<ToolDefinition>>;

    /// Invokes a tool, reporting partial results through `progress`.
    ///
    /// This may take unbounded time. Callers that need a bound must apply
    /// one themselves.
    async fn invoke(&self, call: ToolCall, progress: ProgressSink)
    -> Result<Value, ToolCallFailure>;

    /// Closes the underlying connection.
    async fn close(&self);
}

/// A request to execute one tool with structured arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    tool_name: String,
    arguments: Value,
}

impl ToolCall {
    /// Creates a tool call.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the call arguments.
    #[must_use]
    pub const fn arguments(&self) -> &Value {
        &self.arguments
    }
}

/// Reasons a tool call can fail at the connector boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolCallFailure {
    /// The tool ran and reported failure; the payload is passed on verbatim.
    #[error("tool reported an error: {0}")]
    Remote(Value),

    /// The connector gave up waiting for the server.
    #[error("tool call timed out")]
    Timeout,

    /// The session failed while the call was in flight.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors returned by connectors and session handles.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// The endpoint could not be reached.
    #[error("endpoint {endpoint_id} is unreachable: {reason}")]
    Unreachable {
        /// Endpoint identifier.
        endpoint_id: EndpointId,
        /// Reason string.
        reason: String,
    },

    /// The endpoint refused the session.
    #[error("endpoint {endpoint_id} rejected the session: {reason}")]
    Rejected {
        /// Endpoint identifier.
        endpoint_id: EndpointId,
        /// Reason string.
        reason: String,
    },

    /// The handle was used after being closed.
    #[error("session with endpoint {0} is closed")]
    Closed(EndpointId),

    /// Generic runtime failure.
    #[error("connector runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl ConnectorError {
    /// Wraps a runtime error from a connector implementation.
    #[must_use]
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}

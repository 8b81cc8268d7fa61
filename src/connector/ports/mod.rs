//! Port contracts for tool-server sessions.

mod connector;
mod progress;

pub use connector::{
    Connector, ConnectorError, ConnectorHandle, ConnectorResult, ToolCall, ToolCallFailure,
};
pub use progress::ProgressSink;

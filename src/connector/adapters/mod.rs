//! Adapter implementations for the connector ports.

pub mod memory;

pub use memory::{InMemoryConnector, RecordedCall, ScriptedResponse};

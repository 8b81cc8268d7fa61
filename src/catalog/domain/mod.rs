//! Domain model for tool catalogs and endpoint health.

mod error;
mod health;
mod tool;

pub use error::CatalogDomainError;
pub use health::{EndpointHealthSnapshot, EndpointHealthStatus, EndpointStatus};
pub use tool::{ToolDefinition, ToolDescriptor};

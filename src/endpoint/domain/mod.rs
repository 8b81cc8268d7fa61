//! Domain model for tool-server endpoints.

mod descriptor;
mod error;
mod ids;

pub use descriptor::{EndpointDescriptor, RegisteredEndpoint};
pub use error::EndpointDomainError;
pub use ids::{EndpointId, RegistrationEpoch};

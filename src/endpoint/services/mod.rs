//! Services for endpoint membership.

mod registry;

pub use registry::{EndpointRegistry, EndpointRegistryError, EndpointRegistryResult};

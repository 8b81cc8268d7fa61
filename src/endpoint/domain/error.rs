//! Error types for endpoint domain validation.

use thiserror::Error;

/// Errors returned while constructing endpoint domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointDomainError {
    /// The endpoint identifier is empty after trimming.
    #[error("endpoint identifier must not be empty")]
    EmptyEndpointId,
}

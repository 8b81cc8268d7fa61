//! Error types for catalog domain validation.

use thiserror::Error;

/// Errors returned while constructing catalog domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogDomainError {
    /// A tool definition name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyToolName,
}


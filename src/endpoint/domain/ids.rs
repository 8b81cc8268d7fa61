//! Identifier types for tool-server endpoints.

use super::EndpointDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a tool server, usually its address or URL.
///
/// Two descriptors with the same identifier denote the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointId(String);

impl EndpointId {
    /// Creates a validated endpoint identifier.
    ///
    /// Surrounding whitespace is trimmed; the identifier is otherwise kept
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointDomainError::EmptyEndpointId`] when the trimmed value
    /// is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, EndpointDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(EndpointDomainError::EmptyEndpointId);
        }
        Ok(Self(normalized))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EndpointId {
    type Error = EndpointDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EndpointId> for String {
    fn from(value: EndpointId) -> Self {
        value.0
    }
}

impl AsRef<str> for EndpointId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Monotonic stamp assigned to each successful registration.
///
/// Removing an endpoint and adding it again produces a fresh epoch, which
/// lets connection caches tell the two registrations apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationEpoch(u64);

impl RegistrationEpoch {
    /// Wraps a raw epoch value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw epoch value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationEpoch {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

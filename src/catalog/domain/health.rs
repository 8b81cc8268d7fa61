//! Endpoint connection health domain types.

use crate::endpoint::domain::EndpointDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection health of a registered endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointHealthStatus {
    /// No connection has been attempted yet.
    Unknown,
    /// A session is established and its catalog was listed.
    Connected,
    /// The last connection or listing attempt failed.
    Degraded,
}

impl EndpointHealthStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Connected => "connected",
            Self::Degraded => "degraded",
        }
    }
}

impl fmt::Display for EndpointHealthStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Timestamped health snapshot for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointHealthSnapshot {
    status: EndpointHealthStatus,
    checked_at: DateTime<Utc>,
    message: Option<String>,
}

impl EndpointHealthSnapshot {
    /// Creates a health snapshot.
    #[must_use]
    pub const fn new(status: EndpointHealthStatus, checked_at: DateTime<Utc>) -> Self {
        Self {
            status,
            checked_at,
            message: None,
        }
    }

    /// Creates an `unknown` health snapshot.
    #[must_use]
    pub const fn unknown(checked_at: DateTime<Utc>) -> Self {
        Self::new(EndpointHealthStatus::Unknown, checked_at)
    }

    /// Creates a `connected` health snapshot.
    #[must_use]
    pub const fn connected(checked_at: DateTime<Utc>) -> Self {
        Self::new(EndpointHealthStatus::Connected, checked_at)
    }

    /// Creates a `degraded` health snapshot with details.
    #[must_use]
    pub fn degraded(checked_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self::new(EndpointHealthStatus::Degraded, checked_at).with_message(message)
    }

    /// Adds an explanatory message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let normalized = message.into().trim().to_owned();
        if !normalized.is_empty() {
            self.message = Some(normalized);
        }
        self
    }

    /// Returns the health status.
    #[must_use]
    pub const fn status(&self) -> EndpointHealthStatus {
        self.status
    }

    /// Returns the check timestamp.
    #[must_use]
    pub const fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    /// Returns an optional detail message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns whether the endpoint is excluded from the catalog.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self.status, EndpointHealthStatus::Degraded)
    }
}

/// A registered endpoint paired with its latest health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    /// The registered endpoint.
    pub descriptor: EndpointDescriptor,
    /// Its latest health snapshot.
    pub health: EndpointHealthSnapshot,
}

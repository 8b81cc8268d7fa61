//! Session configuration.

use crate::endpoint::domain::EndpointDescriptor;
use crate::invocation::services::TrackerLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned while loading a [`SessionConfig`].
#[derive(Debug, Error)]
pub enum SessionConfigError {
    /// The configuration document is not valid JSON for this shape.
    #[error("invalid session configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// `maxConcurrentInvocations` must allow at least one invocation.
    #[error("maxConcurrentInvocations must be greater than zero")]
    ZeroConcurrency,

    /// `defaultTimeoutMs` must be a positive bound.
    #[error("defaultTimeoutMs must be greater than zero")]
    ZeroTimeout,
}

/// Options recognised when starting a tool session.
///
/// Every field is optional in the serialized form; missing fields take their
/// default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Endpoints registered when the session starts, in display order.
    pub initial_endpoints: Vec<EndpointDescriptor>,
    /// Maximum number of invocations that may be running at once.
    pub max_concurrent_invocations: usize,
    /// Time bound, in milliseconds, for invocations without their own. It
    /// also bounds each connect and catalog listing.
    pub default_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_endpoints: Vec::new(),
            max_concurrent_invocations: 16,
            default_timeout_ms: 30_000,
        }
    }
}

impl SessionConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`SessionConfigError::Parse`] for malformed documents and the
    /// validation errors of [`Self::validate`].
    pub fn from_json_str(raw: &str) -> Result<Self, SessionConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Adds an endpoint to the initial set.
    #[must_use]
    pub fn with_endpoint(mut self, descriptor: EndpointDescriptor) -> Self {
        self.initial_endpoints.push(descriptor);
        self
    }

    /// Checks that the limits are usable.
    ///
    /// # Errors
    ///
    /// Returns [`SessionConfigError::ZeroConcurrency`] or
    /// [`SessionConfigError::ZeroTimeout`] for zero limits.
    pub const fn validate(&self) -> Result<(), SessionConfigError> {
        if self.max_concurrent_invocations == 0 {
            return Err(SessionConfigError::ZeroConcurrency);
        }
        if self.default_timeout_ms == 0 {
            return Err(SessionConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Returns the default invocation timeout.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Returns the limits to apply to the invocation tracker.
    #[must_use]
    pub const fn tracker_limits(&self) -> TrackerLimits {
        TrackerLimits {
            max_concurrent_invocations: self.max_concurrent_invocations,
            default_timeout: self.default_timeout(),
        }
    }
}

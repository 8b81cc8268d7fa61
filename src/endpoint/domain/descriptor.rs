//! Endpoint descriptor value objects.

use super::{EndpointId, RegistrationEpoch};
use serde::{Deserialize, Serialize};

/// Describes one tool server the session may connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    endpoint_id: EndpointId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_label: Option<String>,
}

impl EndpointDescriptor {
    /// Creates a descriptor without a display label.
    #[must_use]
    pub const fn new(endpoint_id: EndpointId) -> Self {
        Self {
            endpoint_id,
            display_label: None,
        }
    }

    /// Sets a human-readable label. Blank labels are ignored.
    #[must_use]
    pub fn with_display_label(mut self, label: impl Into<String>) -> Self {
        let normalized = label.into().trim().to_owned();
        self.display_label = (!normalized.is_empty()).then_some(normalized);
        self
    }

    /// Returns the endpoint identifier.
    #[must_use]
    pub const fn id(&self) -> &EndpointId {
        &self.endpoint_id
    }

    /// Returns the display label, if one was set.
    #[must_use]
    pub fn display_label(&self) -> Option<&str> {
        self.display_label.as_deref()
    }

    /// Returns the display label, falling back to the endpoint identifier.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_label
            .as_deref()
            .unwrap_or_else(|| self.endpoint_id.as_str())
    }
}

/// A descriptor as stored in the registry, stamped with its epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEndpoint {
    descriptor: EndpointDescriptor,
    epoch: RegistrationEpoch,
}

impl RegisteredEndpoint {
    /// Pairs a descriptor with its registration epoch.
    #[must_use]
    pub const fn new(descriptor: EndpointDescriptor, epoch: RegistrationEpoch) -> Self {
        Self { descriptor, epoch }
    }

    /// Returns the stored descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    /// Returns the endpoint identifier.
    #[must_use]
    pub const fn id(&self) -> &EndpointId {
        self.descriptor.id()
    }

    /// Returns the registration epoch.
    #[must_use]
    pub const fn epoch(&self) -> RegistrationEpoch {
        self.epoch
    }

    /// Consumes the entry and returns the descriptor.
    #[must_use]
    pub fn into_descriptor(self) -> EndpointDescriptor {
        self.descriptor
    }
}

//! Tool definition and aggregated descriptor value objects.

use super::CatalogDomainError;
use crate::endpoint::domain::EndpointId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata for a tool as reported by a single tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    name: String,
    description: String,
    input_schema: Value,
}

impl ToolDefinition {
    /// Creates a tool definition.
    ///
    /// Name and description are trimmed. Servers are free to omit a
    /// description, so an empty one is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyToolName`] when the name is empty.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Result<Self, CatalogDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(CatalogDomainError::EmptyToolName);
        }

        Ok(Self {
            name: normalized_name,
            description: description.into().trim().to_owned(),
            input_schema,
        })
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the schema describing accepted arguments.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

/// A tool in the aggregated catalog, tagged with its owning endpoint.
///
/// Tool names are unique per endpoint only, so `(name, owner)` is the
/// identity of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    owner_endpoint_id: EndpointId,
    #[serde(flatten)]
    definition: ToolDefinition,
}

impl ToolDescriptor {
    /// Tags a server-reported definition with its owner.
    #[must_use]
    pub const fn new(owner_endpoint_id: EndpointId, definition: ToolDefinition) -> Self {
        Self {
            owner_endpoint_id,
            definition,
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Returns the owning endpoint identifier.
    #[must_use]
    pub const fn owner_endpoint_id(&self) -> &EndpointId {
        &self.owner_endpoint_id
    }

    /// Returns the tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.definition.description()
    }

    /// Returns the schema describing accepted arguments.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        self.definition.input_schema()
    }

    /// Returns the underlying server-reported definition.
    #[must_use]
    pub const fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Returns whether this descriptor is `name` owned by `owner`.
    #[must_use]
    pub fn matches(&self, name: &str, owner: &EndpointId) -> bool {
        self.name() == name && &self.owner_endpoint_id == owner
    }
}

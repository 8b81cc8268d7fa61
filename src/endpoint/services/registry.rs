//! Ordered, de-duplicated registry of tool-server endpoints.

use crate::endpoint::domain::{
    EndpointDescriptor, EndpointId, RegisteredEndpoint, RegistrationEpoch,
};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

/// Result type for endpoint registry operations.
pub type EndpointRegistryResult<T> = Result<T, EndpointRegistryError>;

/// Errors returned by [`EndpointRegistry`] mutations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointRegistryError {
    /// An endpoint with the same identifier is already registered.
    ///
    /// The registry is left unchanged, so repeating an `add` is harmless.
    #[error("endpoint already registered: {0}")]
    DuplicateEndpoint(EndpointId),

    /// No endpoint with the given identifier is registered.
    #[error("endpoint not registered: {0}")]
    NotFound(EndpointId),
}

/// Session-scoped registry of trusted tool-server endpoints.
///
/// Entries keep insertion order, which callers may rely on for stable
/// display. Membership checks and snapshots take a short read lock and never
/// wait on network activity.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: Vec<RegisteredEndpoint>,
    last_epoch: u64,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint and returns the epoch stamped on it.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointRegistryError::DuplicateEndpoint`] when the
    /// identifier is already present.
    pub fn add(&self, descriptor: EndpointDescriptor) -> EndpointRegistryResult<RegistrationEpoch> {
        let mut state = self.write_state();
        if state.position_of(descriptor.id()).is_some() {
            return Err(EndpointRegistryError::DuplicateEndpoint(
                descriptor.id().clone(),
            ));
        }

        state.last_epoch = state.last_epoch.saturating_add(1);
        let epoch = RegistrationEpoch::new(state.last_epoch);
        debug!(endpoint = %descriptor.id(), %epoch, "endpoint registered");
        state
            .entries
            .push(RegisteredEndpoint::new(descriptor, epoch));
        Ok(epoch)
    }

    /// Removes an endpoint and returns its registry entry.
    ///
    /// The endpoint is excluded from every subsequent snapshot as soon as
    /// this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointRegistryError::NotFound`] when the identifier is not
    /// registered.
    pub fn remove(&self, endpoint_id: &EndpointId) -> EndpointRegistryResult<RegisteredEndpoint> {
        let mut state = self.write_state();
        let position = state
            .position_of(endpoint_id)
            .ok_or_else(|| EndpointRegistryError::NotFound(endpoint_id.clone()))?;
        let removed = state.entries.remove(position);
        debug!(endpoint = %endpoint_id, epoch = %removed.epoch(), "endpoint removed");
        Ok(removed)
    }

    /// Returns the registered descriptors in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<EndpointDescriptor> {
        self.read_state()
            .entries
            .iter()
            .map(|entry| entry.descriptor().clone())
            .collect()
    }

    /// Returns the registered entries, including epochs, in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<RegisteredEndpoint> {
        self.read_state().entries.clone()
    }

    /// Returns the registry entry for `endpoint_id`, including its epoch.
    #[must_use]
    pub fn entry(&self, endpoint_id: &EndpointId) -> Option<RegisteredEndpoint> {
        let state = self.read_state();
        state
            .position_of(endpoint_id)
            .and_then(|position| state.entries.get(position))
            .cloned()
    }

    /// Returns the descriptor registered under `endpoint_id`.
    #[must_use]
    pub fn get(&self, endpoint_id: &EndpointId) -> Option<EndpointDescriptor> {
        self.entry(endpoint_id)
            .map(RegisteredEndpoint::into_descriptor)
    }

    /// Returns the epoch of the current registration of `endpoint_id`.
    #[must_use]
    pub fn epoch_of(&self, endpoint_id: &EndpointId) -> Option<RegistrationEpoch> {
        let state = self.read_state();
        state
            .position_of(endpoint_id)
            .and_then(|position| state.entries.get(position))
            .map(RegisteredEndpoint::epoch)
    }

    /// Returns whether `endpoint_id` is registered.
    #[must_use]
    pub fn contains(&self, endpoint_id: &EndpointId) -> bool {
        self.read_state().position_of(endpoint_id).is_some()
    }

    /// Returns the number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    /// Returns whether the registry holds no endpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_state().entries.is_empty()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RegistryState {
    fn position_of(&self, endpoint_id: &EndpointId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.id() == endpoint_id)
    }
}

//! Tool session facade.

use super::{SessionConfig, SessionConfigError};
use crate::catalog::domain::{EndpointStatus, ToolDescriptor};
use crate::catalog::services::{CapabilityAggregator, CapabilityAggregatorError};
use crate::connector::ports::Connector;
use crate::endpoint::domain::{EndpointDescriptor, EndpointId, RegistrationEpoch};
use crate::endpoint::services::{EndpointRegistry, EndpointRegistryError};
use crate::invocation::domain::{Invocation, InvocationId};
use crate::invocation::services::{
    CancelOutcome, InvocationTracker, InvocationTrackerError, StartInvocation,
};
use crate::presentation::domain::Presentation;
use crate::presentation::ports::Presenter;
use crate::presentation::services::PresenterRegistry;
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Result type for tool session operations.
pub type ToolSessionResult<T> = Result<T, ToolSessionError>;

/// Errors returned by [`ToolSession`] operations.
#[derive(Debug, Error)]
pub enum ToolSessionError {
    /// Session configuration was rejected.
    #[error(transparent)]
    Config(#[from] SessionConfigError),

    /// Endpoint or catalog operation failed.
    #[error(transparent)]
    Aggregator(#[from] CapabilityAggregatorError),

    /// Invocation operation failed.
    #[error(transparent)]
    Tracker(#[from] InvocationTrackerError),
}

/// One agent session's view of its tool servers and tool calls.
pub struct ToolSession<C, K>
where
    C: Connector + 'static,
    K: Clock + Send + Sync + 'static,
{
    registry: Arc<EndpointRegistry>,
    aggregator: Arc<CapabilityAggregator<C, K>>,
    tracker: InvocationTracker<C, K>,
    presenters: RwLock<PresenterRegistry>,
    resolved: RwLock<HashMap<InvocationId, Arc<dyn Presenter>>>,
}

impl<C, K> ToolSession<C, K>
where
    C: Connector + 'static,
    K: Clock + Send + Sync + 'static,
{
    /// Starts a session and registers the configured initial endpoints.
    ///
    /// Repeated identifiers in `initial_endpoints` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSessionError::Config`] when the limits are invalid.
    pub fn new(
        config: &SessionConfig,
        connector: Arc<C>,
        clock: Arc<K>,
    ) -> ToolSessionResult<Self> {
        config.validate()?;
        let registry = Arc::new(EndpointRegistry::new());
        let aggregator = Arc::new(
            CapabilityAggregator::new(Arc::clone(&registry), connector, Arc::clone(&clock))
                .with_call_timeout(config.default_timeout()),
        );
        let tracker =
            InvocationTracker::new(Arc::clone(&aggregator), clock, config.tracker_limits());

        for descriptor in &config.initial_endpoints {
            match aggregator.add_endpoint(descriptor.clone()) {
                Ok(_) => {}
                Err(CapabilityAggregatorError::Registry(
                    EndpointRegistryError::DuplicateEndpoint(id),
                )) => warn!(endpoint = %id, "skipping repeated initial endpoint"),
                Err(err) => return Err(err.into()),
            }
        }
        info!(
            endpoints = registry.len(),
            max_concurrent_invocations = config.max_concurrent_invocations,
            default_timeout_ms = config.default_timeout_ms,
            "tool session started"
        );

        Ok(Self {
            registry,
            aggregator,
            tracker,
            presenters: RwLock::new(PresenterRegistry::default()),
            resolved: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the capability aggregator backing this session.
    #[must_use]
    pub fn aggregator(&self) -> &CapabilityAggregator<C, K> {
        &self.aggregator
    }

    /// Returns the invocation tracker backing this session.
    #[must_use]
    pub const fn tracker(&self) -> &InvocationTracker<C, K> {
        &self.tracker
    }

    /// Registers an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSessionError::Aggregator`] wrapping
    /// `DuplicateEndpoint` when the identifier is already registered.
    pub fn add_endpoint(
        &self,
        descriptor: EndpointDescriptor,
    ) -> ToolSessionResult<RegistrationEpoch> {
        Ok(self.aggregator.add_endpoint(descriptor)?)
    }

    /// Removes an endpoint. Its tools leave the catalog immediately; running
    /// invocations against it are left to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSessionError::Aggregator`] wrapping `NotFound` when the
    /// identifier is not registered.
    pub fn remove_endpoint(
        &self,
        endpoint_id: &EndpointId,
    ) -> ToolSessionResult<EndpointDescriptor> {
        Ok(self.aggregator.remove_endpoint(endpoint_id)?)
    }

    /// Returns the registered endpoints in insertion order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<EndpointDescriptor> {
        self.registry.list()
    }

    /// Returns the aggregated tool catalog across reachable endpoints.
    pub async fn catalog(&self) -> Vec<ToolDescriptor> {
        self.aggregator.catalog().await
    }

    /// Returns the last observed health of every registered endpoint.
    #[must_use]
    pub fn endpoint_health(&self) -> Vec<EndpointStatus> {
        self.aggregator.endpoint_health()
    }

    /// Starts a tool invocation and fixes the presenter used for it.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSessionError::Tracker`] when the tracker rejects the
    /// request.
    pub fn start_invocation(&self, request: StartInvocation) -> ToolSessionResult<InvocationId> {
        let presenter = self
            .presenters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(request.tool_name());
        let id = self.tracker.start(request)?;
        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, presenter);
        Ok(id)
    }

    /// Returns the current snapshot of an invocation.
    #[must_use]
    pub fn snapshot(&self, id: InvocationId) -> Option<Invocation> {
        self.tracker.snapshot(id)
    }

    /// Waits for an invocation to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSessionError::Tracker`] when the invocation is unknown.
    pub async fn wait_for_terminal(&self, id: InvocationId) -> ToolSessionResult<Invocation> {
        Ok(self.tracker.wait_for_terminal(id).await?)
    }

    /// Cancels a running invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSessionError::Tracker`] when the invocation is unknown.
    pub fn cancel(&self, id: InvocationId) -> ToolSessionResult<CancelOutcome> {
        Ok(self.tracker.cancel(id)?)
    }

    /// Subscribes to snapshots of every invocation in this session.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Invocation> {
        self.tracker.subscribe()
    }

    /// Watches a single invocation.
    #[must_use]
    pub fn watch(&self, id: InvocationId) -> Option<watch::Receiver<Invocation>> {
        self.tracker.watch(id)
    }

    /// Presents the current snapshot of an invocation.
    #[must_use]
    pub fn present(&self, id: InvocationId) -> Option<Presentation> {
        self.tracker
            .snapshot(id)
            .map(|invocation| self.present_snapshot(&invocation))
    }

    /// Presents a snapshot with the presenter chosen when it started.
    ///
    /// Snapshots of invocations started elsewhere use the presenter currently
    /// registered for their tool.
    #[must_use]
    pub fn present_snapshot(&self, invocation: &Invocation) -> Presentation {
        let resolved = self
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&invocation.id())
            .cloned();
        resolved.map_or_else(
            || {
                self.presenters
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .present(invocation)
            },
            |presenter| presenter.present(invocation),
        )
    }

    /// Registers a bespoke presenter for `tool_name`.
    ///
    /// Invocations already started keep the presenter they were started with.
    pub fn register_presenter(&self, tool_name: impl Into<String>, presenter: Arc<dyn Presenter>) {
        let tool = tool_name.into();
        let mut presenters = self.presenters.write().unwrap_or_else(PoisonError::into_inner);
        if presenters.register(tool.clone(), presenter).is_some() {
            info!(tool = %tool, "presenter replaced");
        }
    }

    /// Stops tracking a finished invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSessionError::Tracker`] when the invocation is unknown
    /// or still running.
    pub fn release(&self, id: InvocationId) -> ToolSessionResult<Invocation> {
        let released = self.tracker.release(id)?;
        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        Ok(released)
    }

    /// Ends the session: cancels running invocations and closes every
    /// endpoint session.
    pub async fn shutdown(&self) {
        self.tracker.cancel_all();
        self.aggregator.shutdown().await;
        info!("tool session shut down");
    }
}

//! Aggregation of tool catalogs across registered endpoints.

use crate::catalog::domain::{
    EndpointHealthSnapshot, EndpointStatus, ToolDefinition, ToolDescriptor,
};
use crate::connector::ports::{Connector, ConnectorError, ConnectorHandle, ConnectorResult};
use crate::endpoint::{
    domain::{EndpointDescriptor, EndpointId, RegisteredEndpoint, RegistrationEpoch},
    services::{EndpointRegistry, EndpointRegistryError},
};
use futures_util::future::join_all;
use mockable::Clock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, RwLock as AsyncRwLock};
use tracing::{debug, info, warn};

/// Bound applied to connects and catalog listings unless configured.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Service-level errors for capability aggregation.
#[derive(Debug, Error)]
pub enum CapabilityAggregatorError {
    /// The endpoint is not (or no longer) registered.
    #[error("endpoint not registered: {0}")]
    UnknownEndpoint(EndpointId),
    /// Registry mutation failed.
    #[error(transparent)]
    Registry(#[from] EndpointRegistryError),
    /// Connecting to the endpoint failed.
    #[error(transparent)]
    Connector(#[from] ConnectorError),
    /// The endpoint did not answer a connect or listing request in time.
    #[error("endpoint {endpoint_id} did not respond within {} ms", bound.as_millis())]
    TimedOut {
        /// Endpoint identifier.
        endpoint_id: EndpointId,
        /// Bound that elapsed.
        bound: Duration,
    },
}

/// Result type for capability aggregation operations.
pub type CapabilityAggregatorResult<T> = Result<T, CapabilityAggregatorError>;

/// Borrowed access to an endpoint's session handle.
///
/// While a lease is alive, teardown of the handle is deferred, so work
/// started before an endpoint was removed can finish on the old session.
pub struct ConnectorLease {
    handle: Arc<dyn ConnectorHandle>,
    _usage: OwnedRwLockReadGuard<()>,
}

impl ConnectorLease {
    /// Returns the leased session handle.
    #[must_use]
    pub fn handle(&self) -> &dyn ConnectorHandle {
        self.handle.as_ref()
    }
}

/// A claim on an endpoint's session, taken while the endpoint is registered.
///
/// A reservation defers teardown just like a lease. Turning it into a lease
/// with [`CapabilityAggregator::lease_reserved`] connects if needed, even if
/// the endpoint has been removed since the reservation was taken.
pub struct ConnectorReservation {
    entry: RegisteredEndpoint,
    slot: Arc<ConnectionSlot>,
    usage: OwnedRwLockReadGuard<()>,
}

/// Per-registration connection cache entry.
struct ConnectionSlot {
    epoch: RegistrationEpoch,
    handle: Mutex<Option<Arc<dyn ConnectorHandle>>>,
    usage: Arc<AsyncRwLock<()>>,
}

impl ConnectionSlot {
    fn new(epoch: RegistrationEpoch) -> Self {
        Self {
            epoch,
            handle: Mutex::new(None),
            usage: Arc::new(AsyncRwLock::new(())),
        }
    }
}

/// Merges tool catalogs from every registered endpoint.
///
/// Handles are created lazily and cached per registration, so repeated
/// catalog reads reuse one session per endpoint. A failed or stalled
/// connection marks the endpoint as degraded and is retried on the next
/// access.
pub struct CapabilityAggregator<C, K>
where
    C: Connector,
    K: Clock + Send + Sync,
{
    registry: Arc<EndpointRegistry>,
    connector: Arc<C>,
    clock: Arc<K>,
    call_timeout: Duration,
    slots: RwLock<HashMap<EndpointId, Arc<ConnectionSlot>>>,
    health: RwLock<HashMap<EndpointId, (RegistrationEpoch, EndpointHealthSnapshot)>>,
}

impl<C, K> CapabilityAggregator<C, K>
where
    C: Connector,
    K: Clock + Send + Sync,
{
    /// Creates an aggregator over `registry`.
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>, connector: Arc<C>, clock: Arc<K>) -> Self {
        Self {
            registry,
            connector,
            clock,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            slots: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the bound applied to each connect and catalog listing.
    #[must_use]
    pub const fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Returns the registry this aggregator reads from.
    #[must_use]
    pub const fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Registers a new endpoint. No connection is made until first use.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityAggregatorError::Registry`] when the endpoint is
    /// already registered.
    pub fn add_endpoint(
        &self,
        descriptor: EndpointDescriptor,
    ) -> CapabilityAggregatorResult<RegistrationEpoch> {
        let endpoint_id = descriptor.id().clone();
        let epoch = self.registry.add(descriptor)?;
        info!(endpoint = %endpoint_id, "endpoint added");
        Ok(epoch)
    }

    /// Removes an endpoint and schedules teardown of its session.
    ///
    /// The endpoint's tools are excluded from catalog reads as soon as this
    /// returns. The session is closed once in-flight leases and reservations
    /// are released.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityAggregatorError::Registry`] when the endpoint is
    /// not registered.
    pub fn remove_endpoint(
        &self,
        endpoint_id: &EndpointId,
    ) -> CapabilityAggregatorResult<EndpointDescriptor> {
        let removed = self.registry.remove(endpoint_id)?;
        self.health
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(endpoint_id);
        let slot = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(endpoint_id);
        if let Some(stale) = slot {
            spawn_teardown(endpoint_id.clone(), stale);
        }
        info!(endpoint = %endpoint_id, "endpoint removed");
        Ok(removed.into_descriptor())
    }

    /// Returns the merged catalog of every reachable registered endpoint.
    ///
    /// Endpoints are queried concurrently and each query is bounded, so a
    /// stalled endpoint only delays the read by the call timeout. Tools keep
    /// registry order across endpoints and server order within an endpoint.
    /// Tools sharing a name on different endpoints are all retained,
    /// distinguished by owner. Endpoints removed while the read was in
    /// flight are left out.
    pub async fn catalog(&self) -> Vec<ToolDescriptor> {
        let entries = self.registry.entries();
        let listings = join_all(entries.iter().map(|entry| self.list_endpoint(entry))).await;

        let live: HashSet<(EndpointId, RegistrationEpoch)> = self
            .registry
            .entries()
            .into_iter()
            .map(|entry| (entry.id().clone(), entry.epoch()))
            .collect();

        entries
            .into_iter()
            .zip(listings)
            .filter(|(entry, _)| live.contains(&(entry.id().clone(), entry.epoch())))
            .flat_map(|(entry, tools)| {
                let owner = entry.id().clone();
                tools
                    .into_iter()
                    .map(move |tool| ToolDescriptor::new(owner.clone(), tool))
            })
            .collect()
    }

    /// Finds a single tool by name on its owning endpoint.
    pub async fn find_tool(&self, name: &str, owner: &EndpointId) -> Option<ToolDescriptor> {
        let entry = self.registry.entry(owner)?;
        self.list_endpoint(&entry)
            .await
            .into_iter()
            .find(|tool| tool.name() == name)
            .map(|tool| ToolDescriptor::new(owner.clone(), tool))
    }

    /// Returns every registered endpoint with its latest health snapshot.
    #[must_use]
    pub fn endpoint_health(&self) -> Vec<EndpointStatus> {
        let health = self.health.read().unwrap_or_else(PoisonError::into_inner);
        self.registry
            .entries()
            .into_iter()
            .map(|entry| {
                let snapshot = health
                    .get(entry.id())
                    .filter(|(epoch, _)| *epoch == entry.epoch())
                    .map_or_else(
                        || EndpointHealthSnapshot::unknown(self.clock.utc()),
                        |(_, snapshot)| snapshot.clone(),
                    );
                EndpointStatus {
                    descriptor: entry.into_descriptor(),
                    health: snapshot,
                }
            })
            .collect()
    }

    /// Claims the session of a registered endpoint without waiting.
    ///
    /// Once this returns, removing the endpoint no longer tears the session
    /// down until the reservation (or the lease made from it) is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityAggregatorError::UnknownEndpoint`] when the
    /// endpoint is not registered.
    pub fn reserve(
        &self,
        endpoint_id: &EndpointId,
    ) -> CapabilityAggregatorResult<ConnectorReservation> {
        let entry = self
            .registry
            .entry(endpoint_id)
            .ok_or_else(|| CapabilityAggregatorError::UnknownEndpoint(endpoint_id.clone()))?;
        self.reserve_registered(entry)
    }

    /// Turns a reservation into a lease, connecting lazily if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityAggregatorError::Connector`] when connecting fails
    /// and [`CapabilityAggregatorError::TimedOut`] when the connect stalls.
    pub async fn lease_reserved(
        &self,
        reservation: ConnectorReservation,
    ) -> CapabilityAggregatorResult<ConnectorLease> {
        let ConnectorReservation { entry, slot, usage } = reservation;
        let mut cached = slot.handle.lock().await;
        if let Some(handle) = cached.as_ref() {
            return Ok(ConnectorLease {
                handle: Arc::clone(handle),
                _usage: usage,
            });
        }

        debug!(endpoint = %entry.id(), "connecting to endpoint");
        let handle = match self
            .bounded(&entry, self.connector.connect(entry.descriptor()))
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                warn!(endpoint = %entry.id(), error = %err, "endpoint connection failed");
                self.record_health(
                    &entry,
                    EndpointHealthSnapshot::degraded(self.clock.utc(), err.to_string()),
                );
                return Err(err);
            }
        };

        // A slot that was removed meanwhile still owns the handle; its
        // teardown closes it once this lease is dropped.
        *cached = Some(Arc::clone(&handle));
        info!(endpoint = %entry.id(), "endpoint connected");
        Ok(ConnectorLease {
            handle,
            _usage: usage,
        })
    }

    /// Leases the session handle for a registered endpoint, connecting
    /// lazily if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityAggregatorError::UnknownEndpoint`] when the
    /// endpoint is not registered, [`CapabilityAggregatorError::Connector`]
    /// when connecting fails, and [`CapabilityAggregatorError::TimedOut`]
    /// when the connect stalls.
    pub async fn lease(
        &self,
        endpoint_id: &EndpointId,
    ) -> CapabilityAggregatorResult<ConnectorLease> {
        let reservation = self.reserve(endpoint_id)?;
        self.lease_reserved(reservation).await
    }

    /// Closes every cached session. Registry contents are left untouched.
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        join_all(
            slots
                .into_iter()
                .map(|(endpoint_id, slot)| teardown(endpoint_id, slot)),
        )
        .await;
    }

    fn reserve_registered(
        &self,
        entry: RegisteredEndpoint,
    ) -> CapabilityAggregatorResult<ConnectorReservation> {
        // The registry is checked under the slot lock, so a removal either
        // happens first or tears the slot down after the usage guard is held.
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if self.registry.epoch_of(entry.id()) != Some(entry.epoch()) {
            return Err(CapabilityAggregatorError::UnknownEndpoint(entry.id().clone()));
        }

        let slot = current_slot(&mut slots, &entry);
        // Teardown is only spawned for slots already taken out of the map, so
        // a slot still in the map never has a writer queued.
        let usage = Arc::clone(&slot.usage)
            .try_read_owned()
            .map_err(|_| CapabilityAggregatorError::UnknownEndpoint(entry.id().clone()))?;
        drop(slots);
        Ok(ConnectorReservation { entry, slot, usage })
    }

    async fn list_endpoint(&self, entry: &RegisteredEndpoint) -> Vec<ToolDefinition> {
        let Ok(reservation) = self.reserve_registered(entry.clone()) else {
            return Vec::new();
        };
        let Ok(lease) = self.lease_reserved(reservation).await else {
            return Vec::new();
        };

        match self.bounded(entry, lease.handle().list_tools()).await {
            Ok(tools) => {
                debug!(endpoint = %entry.id(), count = tools.len(), "listed tools");
                self.record_health(entry, EndpointHealthSnapshot::connected(self.clock.utc()));
                tools
            }
            Err(err) => {
                warn!(endpoint = %entry.id(), error = %err, "tool listing failed");
                drop(lease);
                self.record_health(
                    entry,
                    EndpointHealthSnapshot::degraded(self.clock.utc(), err.to_string()),
                );
                self.evict(entry);
                Vec::new()
            }
        }
    }

    async fn bounded<T, F>(
        &self,
        entry: &RegisteredEndpoint,
        request: F,
    ) -> CapabilityAggregatorResult<T>
    where
        F: Future<Output = ConnectorResult<T>>,
    {
        match tokio::time::timeout(self.call_timeout, request).await {
            Ok(outcome) => outcome.map_err(CapabilityAggregatorError::from),
            Err(_) => Err(CapabilityAggregatorError::TimedOut {
                endpoint_id: entry.id().clone(),
                bound: self.call_timeout,
            }),
        }
    }

    fn evict(&self, entry: &RegisteredEndpoint) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(entry.id())
            .is_some_and(|slot| slot.epoch == entry.epoch())
            && let Some(stale) = slots.remove(entry.id())
        {
            spawn_teardown(entry.id().clone(), stale);
        }
    }

    fn record_health(&self, entry: &RegisteredEndpoint, snapshot: EndpointHealthSnapshot) {
        if self.registry.epoch_of(entry.id()) != Some(entry.epoch()) {
            return;
        }
        self.health
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.id().clone(), (entry.epoch(), snapshot));
    }
}

/// Returns the slot for `entry`'s registration, replacing a stale one.
fn current_slot(
    slots: &mut HashMap<EndpointId, Arc<ConnectionSlot>>,
    entry: &RegisteredEndpoint,
) -> Arc<ConnectionSlot> {
    if let Some(slot) = slots.get(entry.id())
        && slot.epoch == entry.epoch()
    {
        return Arc::clone(slot);
    }

    let slot = Arc::new(ConnectionSlot::new(entry.epoch()));
    if let Some(stale) = slots.insert(entry.id().clone(), Arc::clone(&slot)) {
        spawn_teardown(entry.id().clone(), stale);
    }
    slot
}

/// Closes a slot's session once every outstanding lease has been released.
async fn teardown(endpoint_id: EndpointId, slot: Arc<ConnectionSlot>) {
    let _exclusive = Arc::clone(&slot.usage).write_owned().await;
    let handle = slot.handle.lock().await.take();
    if let Some(handle) = handle {
        handle.close().await;
        debug!(endpoint = %endpoint_id, "endpoint session closed");
    }
}

fn spawn_teardown(endpoint_id: EndpointId, slot: Arc<ConnectionSlot>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(teardown(endpoint_id, slot));
        }
        Err(_) => {
            warn!(
                endpoint = %endpoint_id,
                "no async runtime available; dropping session without closing it"
            );
        }
    }
}

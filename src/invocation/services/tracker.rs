//! Dispatches tool calls and tracks them through their lifecycle.
//!
//! Each started invocation reserves its owning endpoint's session before
//! `start` returns, so a later removal of the endpoint cannot strand it. A
//! driver task on the ambient Tokio runtime then leases the session, forwards
//! streamed partial results, and races the call against its timeout and a
//! cancellation token.
//! Whichever terminal transition lands first wins; later ones are rejected by
//! the invocation state machine and dropped.

use crate::catalog::services::{
    CapabilityAggregator, CapabilityAggregatorError, ConnectorReservation,
};
use crate::connector::ports::{Connector, ProgressSink, ToolCall, ToolCallFailure};
use crate::endpoint::domain::EndpointId;
use crate::invocation::domain::{
    Invocation, InvocationDomainError, InvocationError, InvocationErrorKind, InvocationId,
};
use mockable::Clock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Capacity of the snapshot broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Result type for invocation tracker operations.
pub type InvocationTrackerResult<T> = Result<T, InvocationTrackerError>;

/// Errors returned by [`InvocationTracker`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationTrackerError {
    /// The owning endpoint is not registered.
    #[error("endpoint not registered: {0}")]
    UnknownEndpoint(EndpointId),

    /// Too many invocations are still running.
    #[error("concurrency limit reached: {limit} invocations in flight")]
    ConcurrencyLimitReached {
        /// Configured maximum number of non-terminal invocations.
        limit: usize,
    },

    /// No Tokio runtime is available to drive the call.
    #[error("no async runtime available to dispatch the invocation")]
    RuntimeUnavailable,

    /// No tracked invocation has the given identifier.
    #[error("invocation not found: {0}")]
    NotFound(InvocationId),

    /// The invocation has not finished yet.
    #[error("invocation still running: {0}")]
    NotTerminal(InvocationId),
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The invocation was running and is now failed with `cancelled`.
    Cancelled,
    /// The invocation had already finished and was left untouched.
    AlreadyTerminal,
}

/// Limits applied to every invocation started through a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerLimits {
    /// Maximum number of non-terminal invocations at any moment.
    pub max_concurrent_invocations: usize,
    /// Time bound applied when a request does not carry its own.
    pub default_timeout: Duration,
}

impl Default for TrackerLimits {
    fn default() -> Self {
        Self {
            max_concurrent_invocations: 16,
            default_timeout: Duration::from_millis(30_000),
        }
    }
}

/// Request to invoke a tool on a specific endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StartInvocation {
    tool_name: String,
    owner_endpoint_id: EndpointId,
    arguments: Value,
    timeout: Option<Duration>,
}

impl StartInvocation {
    /// Creates a request using the tracker's default timeout.
    #[must_use]
    pub fn new(
        tool_name: impl Into<String>,
        owner_endpoint_id: EndpointId,
        arguments: Value,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            owner_endpoint_id,
            arguments,
            timeout: None,
        }
    }

    /// Overrides the time bound for this call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the owning endpoint.
    #[must_use]
    pub const fn owner_endpoint_id(&self) -> &EndpointId {
        &self.owner_endpoint_id
    }
}

type TrackedInvocations = HashMap<InvocationId, TrackedInvocation>;

struct TrackedInvocation {
    snapshot: watch::Sender<Invocation>,
    cancel: CancellationToken,
}

struct TrackerInner<C, K>
where
    C: Connector,
    K: Clock + Send + Sync,
{
    aggregator: Arc<CapabilityAggregator<C, K>>,
    clock: Arc<K>,
    limits: TrackerLimits,
    invocations: RwLock<TrackedInvocations>,
    events: broadcast::Sender<Invocation>,
}

/// Starts tool calls and keeps an observable record of each one.
///
/// Snapshots are published through a per-invocation `watch` channel and a
/// tracker-wide broadcast. Both only ever move forward through the state
/// machine.
pub struct InvocationTracker<C, K>
where
    C: Connector,
    K: Clock + Send + Sync,
{
    inner: Arc<TrackerInner<C, K>>,
}

impl<C, K> Clone for InvocationTracker<C, K>
where
    C: Connector,
    K: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, K> InvocationTracker<C, K>
where
    C: Connector + 'static,
    K: Clock + Send + Sync + 'static,
{
    /// Creates a tracker dispatching through `aggregator`.
    #[must_use]
    pub fn new(
        aggregator: Arc<CapabilityAggregator<C, K>>,
        clock: Arc<K>,
        limits: TrackerLimits,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(TrackerInner {
                aggregator,
                clock,
                limits,
                invocations: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Starts an invocation and returns its identifier immediately.
    ///
    /// The invocation is already `in_progress` when this returns; the call
    /// itself runs on a background task.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationTrackerError::UnknownEndpoint`] when the owner is
    /// not registered, [`InvocationTrackerError::ConcurrencyLimitReached`]
    /// when the tracker is saturated, and
    /// [`InvocationTrackerError::RuntimeUnavailable`] outside a Tokio
    /// runtime. No invocation is created in any of these cases.
    pub fn start(&self, request: StartInvocation) -> InvocationTrackerResult<InvocationId> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| InvocationTrackerError::RuntimeUnavailable)?;
        let Ok(reservation) = self.inner.aggregator.reserve(&request.owner_endpoint_id) else {
            return Err(InvocationTrackerError::UnknownEndpoint(
                request.owner_endpoint_id,
            ));
        };

        let StartInvocation {
            tool_name,
            owner_endpoint_id,
            arguments,
            timeout,
        } = request;
        let bound = timeout.unwrap_or(self.inner.limits.default_timeout);
        let call = ToolCall::new(tool_name.clone(), arguments.clone());
        let invocation = Invocation::new(
            tool_name,
            owner_endpoint_id.clone(),
            arguments,
            self.inner.clock.as_ref(),
        );
        let id = invocation.id();
        let cancel = CancellationToken::new();

        {
            let mut invocations = self.inner.write_invocations();
            let running = invocations
                .values()
                .filter(|tracked| !tracked.snapshot.borrow().is_terminal())
                .count();
            let limit = self.inner.limits.max_concurrent_invocations;
            if running >= limit {
                warn!(
                    limit,
                    tool = call.tool_name(),
                    "invocation rejected at concurrency limit"
                );
                return Err(InvocationTrackerError::ConcurrencyLimitReached { limit });
            }
            self.inner.publish(&invocation);
            let (snapshot, _) = watch::channel(invocation);
            let tracked = TrackedInvocation {
                snapshot,
                cancel: cancel.clone(),
            };
            self.inner
                .apply_to(&tracked, id, |invocation, clock| invocation.mark_dispatched(clock));
            invocations.insert(id, tracked);
        }

        info!(
            invocation = %id,
            tool = call.tool_name(),
            endpoint = %owner_endpoint_id,
            timeout = ?bound,
            "invocation started"
        );

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            inner
                .drive(id, &owner_endpoint_id, reservation, call, bound, &cancel)
                .await;
        });
        Ok(id)
    }

    /// Returns the latest snapshot of an invocation without waiting.
    #[must_use]
    pub fn snapshot(&self, id: InvocationId) -> Option<Invocation> {
        self.inner
            .read_invocations()
            .get(&id)
            .map(|tracked| tracked.snapshot.borrow().clone())
    }

    /// Returns snapshots of every tracked invocation, oldest first.
    #[must_use]
    pub fn snapshots(&self) -> Vec<Invocation> {
        let mut snapshots: Vec<Invocation> = self
            .inner
            .read_invocations()
            .values()
            .map(|tracked| tracked.snapshot.borrow().clone())
            .collect();
        snapshots.sort_by_key(Invocation::created_at);
        snapshots
    }

    /// Returns a receiver that observes every change to one invocation.
    #[must_use]
    pub fn watch(&self, id: InvocationId) -> Option<watch::Receiver<Invocation>> {
        self.inner
            .read_invocations()
            .get(&id)
            .map(|tracked| tracked.snapshot.subscribe())
    }

    /// Returns a receiver of snapshots for all invocations.
    ///
    /// A receiver that falls behind by more than the channel capacity
    /// observes `RecvError::Lagged`; [`Self::snapshot`] remains authoritative.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Invocation> {
        self.inner.events.subscribe()
    }

    /// Waits until the invocation reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationTrackerError::NotFound`] when the invocation is
    /// unknown or released while waiting.
    pub async fn wait_for_terminal(
        &self,
        id: InvocationId,
    ) -> InvocationTrackerResult<Invocation> {
        let mut receiver = self
            .watch(id)
            .ok_or(InvocationTrackerError::NotFound(id))?;
        let terminal = receiver
            .wait_for(Invocation::is_terminal)
            .await
            .map_err(|_| InvocationTrackerError::NotFound(id))?
            .clone();
        Ok(terminal)
    }

    /// Requests cancellation of a running invocation.
    ///
    /// The transition to `failed` with kind `cancelled` is applied before
    /// this returns. Cancelling a finished invocation changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationTrackerError::NotFound`] for unknown identifiers.
    pub fn cancel(&self, id: InvocationId) -> InvocationTrackerResult<CancelOutcome> {
        let invocations = self.inner.read_invocations();
        let tracked = invocations
            .get(&id)
            .ok_or(InvocationTrackerError::NotFound(id))?;
        let cancelled = self.inner.apply_to(tracked, id, |invocation, clock| {
            invocation.fail(InvocationError::cancelled(), clock)
        });
        if cancelled {
            tracked.cancel.cancel();
            info!(invocation = %id, "invocation cancelled");
            Ok(CancelOutcome::Cancelled)
        } else {
            debug!(invocation = %id, "cancel ignored for finished invocation");
            Ok(CancelOutcome::AlreadyTerminal)
        }
    }

    /// Stops tracking a finished invocation and returns its final snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationTrackerError::NotFound`] for unknown identifiers
    /// and [`InvocationTrackerError::NotTerminal`] while the call is running.
    pub fn release(&self, id: InvocationId) -> InvocationTrackerResult<Invocation> {
        let mut invocations = self.inner.write_invocations();
        let snapshot = invocations
            .get(&id)
            .map(|tracked| tracked.snapshot.borrow().clone())
            .ok_or(InvocationTrackerError::NotFound(id))?;
        if !snapshot.is_terminal() {
            return Err(InvocationTrackerError::NotTerminal(id));
        }
        invocations.remove(&id);
        debug!(invocation = %id, "invocation released");
        Ok(snapshot)
    }

    /// Cancels every running invocation.
    pub fn cancel_all(&self) {
        let invocations = self.inner.read_invocations();
        for (id, tracked) in invocations.iter() {
            if self.inner.apply_to(tracked, *id, |invocation, clock| {
                invocation.fail(InvocationError::cancelled(), clock)
            }) {
                tracked.cancel.cancel();
            }
        }
    }
}

impl<C, K> TrackerInner<C, K>
where
    C: Connector + 'static,
    K: Clock + Send + Sync + 'static,
{
    async fn drive(
        &self,
        id: InvocationId,
        owner: &EndpointId,
        reservation: ConnectorReservation,
        call: ToolCall,
        bound: Duration,
        cancel: &CancellationToken,
    ) {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            outcome = tokio::time::timeout(bound, self.execute(id, reservation, call)) => {
                outcome.unwrap_or_else(|_| {
                    warn!(invocation = %id, endpoint = %owner, "invocation timed out");
                    Err(InvocationError::timed_out_after(bound))
                })
            }
        };

        let finished = self.apply(id, |invocation, clock| match outcome {
            Ok(result) => invocation.complete(result, clock),
            Err(error) => invocation.fail(error, clock),
        });
        if finished && let Some(snapshot) = self.snapshot_of(id) {
            info!(invocation = %id, state = %snapshot.state(), "invocation finished");
        }
    }

    async fn execute(
        &self,
        id: InvocationId,
        reservation: ConnectorReservation,
        call: ToolCall,
    ) -> Result<Value, InvocationError> {
        let lease = self
            .aggregator
            .lease_reserved(reservation)
            .await
            .map_err(|err| lease_failure(&err))?;
        let (sink, mut updates) = ProgressSink::channel();
        let mut invoke = lease.handle().invoke(call, sink);
        let outcome = loop {
            tokio::select! {
                outcome = &mut invoke => break outcome,
                Some(update) = updates.recv() => self.record_progress(id, update),
            }
        };
        while let Ok(update) = updates.try_recv() {
            self.record_progress(id, update);
        }
        outcome.map_err(call_failure)
    }

    fn record_progress(&self, id: InvocationId, update: Value) {
        trace!(invocation = %id, "partial result received");
        self.apply(id, |invocation, clock| invocation.record_progress(update, clock));
    }

    fn snapshot_of(&self, id: InvocationId) -> Option<Invocation> {
        self.read_invocations()
            .get(&id)
            .map(|tracked| tracked.snapshot.borrow().clone())
    }

    /// Applies `change` to a tracked invocation. Returns whether it applied.
    fn apply<F>(&self, id: InvocationId, change: F) -> bool
    where
        F: FnOnce(&mut Invocation, &K) -> Result<(), InvocationDomainError>,
    {
        let invocations = self.read_invocations();
        invocations
            .get(&id)
            .is_some_and(|tracked| self.apply_to(tracked, id, change))
    }

    fn apply_to<F>(&self, tracked: &TrackedInvocation, id: InvocationId, change: F) -> bool
    where
        F: FnOnce(&mut Invocation, &K) -> Result<(), InvocationDomainError>,
    {
        // Publishing inside the watch lock keeps broadcast order per invocation
        // identical to the order of applied transitions.
        tracked.snapshot.send_if_modified(|invocation| {
            match change(invocation, self.clock.as_ref()) {
                Ok(()) => {
                    self.publish(invocation);
                    true
                }
                Err(err) => {
                    debug!(invocation = %id, error = %err, "invocation change rejected");
                    false
                }
            }
        })
    }

    fn publish(&self, invocation: &Invocation) {
        if self.events.send(invocation.clone()).is_err() {
            trace!(invocation = %invocation.id(), "no snapshot subscribers");
        }
    }

    fn read_invocations(&self) -> RwLockReadGuard<'_, TrackedInvocations> {
        self.invocations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_invocations(&self) -> RwLockWriteGuard<'_, TrackedInvocations> {
        self.invocations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maps a failure to obtain the endpoint's session onto an error record.
fn lease_failure(err: &CapabilityAggregatorError) -> InvocationError {
    match err {
        CapabilityAggregatorError::TimedOut { bound, .. } => {
            InvocationError::timed_out_after(*bound)
        }
        other => InvocationError::connection(other.to_string()),
    }
}

/// Maps a connector-level call failure onto an error record.
fn call_failure(failure: ToolCallFailure) -> InvocationError {
    match failure {
        ToolCallFailure::Remote(payload) => InvocationError::remote(payload),
        ToolCallFailure::Timeout => {
            InvocationError::new(InvocationErrorKind::Timeout, "tool server timed out")
        }
        ToolCallFailure::Transport(reason) => InvocationError::connection(reason),
    }
}

//! In-memory connector adapter.

use crate::catalog::domain::ToolDefinition;
use crate::connector::ports::{
    Connector, ConnectorError, ConnectorHandle, ConnectorResult, ProgressSink, ToolCall,
    ToolCallFailure,
};
use crate::endpoint::domain::{EndpointDescriptor, EndpointId};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Scripted outcome for a tool invoked through [`InMemoryConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    /// Report `progress` updates, wait `delay`, then return `result`.
    Reply {
        /// Final tool result.
        result: Value,
        /// Partial results reported before the delay.
        progress: Vec<Value>,
        /// Time taken before the result is returned.
        delay: Duration,
    },
    /// Fail with a remote tool error carrying `payload`.
    RemoteError(Value),
    /// Fail as if the session dropped mid-call.
    TransportFailure(String),
    /// Never respond.
    Hang,
}

impl ScriptedResponse {
    /// Replies immediately with `result`.
    #[must_use]
    pub const fn reply(result: Value) -> Self {
        Self::Reply {
            result,
            progress: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    /// Delays a scripted reply. Other variants are returned unchanged.
    #[must_use]
    pub fn after(self, wait: Duration) -> Self {
        match self {
            Self::Reply {
                result, progress, ..
            } => Self::Reply {
                result,
                progress,
                delay: wait,
            },
            other => other,
        }
    }

    /// Adds progress updates to a scripted reply. Other variants are returned
    /// unchanged.
    #[must_use]
    pub fn with_progress(self, updates: impl IntoIterator<Item = Value>) -> Self {
        match self {
            Self::Reply { result, delay, .. } => Self::Reply {
                result,
                progress: updates.into_iter().collect(),
                delay,
            },
            other => other,
        }
    }
}

/// A tool call observed by [`InMemoryConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Endpoint the call was sent to.
    pub endpoint_id: EndpointId,
    /// Tool name and arguments.
    pub call: ToolCall,
}

/// In-memory connector adapter.
///
/// This adapter models tool servers without any network traffic. Catalogs,
/// reachability and per-tool replies are scripted up front, and the adapter
/// counts connection attempts and closes so callers can assert on session
/// reuse.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    state: Arc<RwLock<InMemoryConnectorState>>,
}

#[derive(Debug, Default)]
struct InMemoryConnectorState {
    catalogs: HashMap<EndpointId, Vec<ToolDefinition>>,
    unreachable: HashMap<EndpointId, String>,
    rejecting: HashMap<EndpointId, String>,
    listing_failures: HashMap<EndpointId, String>,
    stalled_connects: HashSet<EndpointId>,
    stalled_listings: HashSet<EndpointId>,
    scripts: HashMap<(EndpointId, String), ScriptedResponse>,
    connect_delay: Duration,
    connect_attempts: HashMap<EndpointId, usize>,
    closes: HashMap<EndpointId, usize>,
    calls: Vec<RecordedCall>,
}

fn poisoned(err: impl ToString) -> ConnectorError {
    ConnectorError::runtime(std::io::Error::other(err.to_string()))
}

impl InMemoryConnector {
    /// Creates a connector with no scripted endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a tool catalog with an endpoint, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn set_tool_catalog(
        &self,
        endpoint_id: EndpointId,
        tools: Vec<ToolDefinition>,
    ) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.catalogs.insert(endpoint_id, tools);
        Ok(())
    }

    /// Makes future connection attempts to an endpoint fail.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn set_unreachable(
        &self,
        endpoint_id: EndpointId,
        reason: impl Into<String>,
    ) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state
            .unreachable
            .insert(endpoint_id, reason.into().trim().to_owned());
        Ok(())
    }

    /// Makes future session requests to a reachable endpoint be refused.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn set_rejecting(
        &self,
        endpoint_id: EndpointId,
        reason: impl Into<String>,
    ) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state
            .rejecting
            .insert(endpoint_id, reason.into().trim().to_owned());
        Ok(())
    }

    /// Makes an endpoint reachable again.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn set_reachable(&self, endpoint_id: &EndpointId) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.unreachable.remove(endpoint_id);
        state.rejecting.remove(endpoint_id);
        state.stalled_connects.remove(endpoint_id);
        Ok(())
    }

    /// Makes catalog listing on an endpoint fail while connects still succeed.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn fail_listing(
        &self,
        endpoint_id: EndpointId,
        reason: impl Into<String>,
    ) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state
            .listing_failures
            .insert(endpoint_id, reason.into().trim().to_owned());
        Ok(())
    }

    /// Makes future connection attempts to an endpoint never complete.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn stall_connect(&self, endpoint_id: EndpointId) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.stalled_connects.insert(endpoint_id);
        Ok(())
    }

    /// Makes catalog listing on an endpoint never complete.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn stall_listing(&self, endpoint_id: EndpointId) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.stalled_listings.insert(endpoint_id);
        Ok(())
    }

    /// Scripts the outcome of invoking `tool_name` on an endpoint.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn script(
        &self,
        endpoint_id: EndpointId,
        tool_name: impl Into<String>,
        response: ScriptedResponse,
    ) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state
            .scripts
            .insert((endpoint_id, tool_name.into()), response);
        Ok(())
    }

    /// Slows every connection attempt down by `delay`.
    ///
    /// # Errors
    ///
    /// Returns connector runtime errors when lock acquisition fails.
    pub fn set_connect_delay(&self, delay: Duration) -> ConnectorResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.connect_delay = delay;
        Ok(())
    }

    /// Returns how many times a connection to `endpoint_id` was attempted.
    #[must_use]
    pub fn connect_attempts(&self, endpoint_id: &EndpointId) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .connect_attempts
            .get(endpoint_id)
            .copied()
            .unwrap_or_default()
    }

    /// Returns how many sessions with `endpoint_id` have been closed.
    #[must_use]
    pub fn close_count(&self, endpoint_id: &EndpointId) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.closes.get(endpoint_id).copied().unwrap_or_default()
    }

    /// Returns every tool call received so far, in arrival order.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.calls.clone()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> ConnectorResult<Arc<dyn ConnectorHandle>> {
        let (delay, stalled) = {
            let mut state = self.state.write().map_err(poisoned)?;
            *state
                .connect_attempts
                .entry(endpoint.id().clone())
                .or_default() += 1;
            if let Some(reason) = state.unreachable.get(endpoint.id()) {
                return Err(ConnectorError::Unreachable {
                    endpoint_id: endpoint.id().clone(),
                    reason: reason.clone(),
                });
            }
            if let Some(reason) = state.rejecting.get(endpoint.id()) {
                return Err(ConnectorError::Rejected {
                    endpoint_id: endpoint.id().clone(),
                    reason: reason.clone(),
                });
            }
            (
                state.connect_delay,
                state.stalled_connects.contains(endpoint.id()),
            )
        };

        if stalled {
            return std::future::pending().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(Arc::new(InMemoryConnectorHandle {
            endpoint_id: endpoint.id().clone(),
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct InMemoryConnectorHandle {
    endpoint_id: EndpointId,
    state: Arc<RwLock<InMemoryConnectorState>>,
    closed: AtomicBool,
}

impl InMemoryConnectorHandle {
    fn ensure_open(&self) -> ConnectorResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnectorError::Closed(self.endpoint_id.clone()));
        }
        Ok(())
    }

    fn record_and_resolve(&self, call: &ToolCall) -> Result<ScriptedResponse, ToolCallFailure> {
        let mut state = self
            .state
            .write()
            .map_err(|err| ToolCallFailure::Transport(err.to_string()))?;
        state.calls.push(RecordedCall {
            endpoint_id: self.endpoint_id.clone(),
            call: call.clone(),
        });

        let key = (self.endpoint_id.clone(), call.tool_name().to_owned());
        if let Some(scripted) = state.scripts.get(&key) {
            return Ok(scripted.clone());
        }

        let is_known = state
            .catalogs
            .get(&self.endpoint_id)
            .is_some_and(|tools| tools.iter().any(|tool| tool.name() == call.tool_name()));
        if !is_known {
            return Ok(ScriptedResponse::RemoteError(json!({
                "error": format!("unknown tool: {}", call.tool_name()),
            })));
        }

        Ok(ScriptedResponse::reply(json!({
            "tool": call.tool_name(),
            "arguments": call.arguments(),
        })))
    }
}

#[async_trait]
impl ConnectorHandle for InMemoryConnectorHandle {
    fn endpoint_id(&self) -> &EndpointId {
        &self.endpoint_id
    }

    async fn list_tools(&self) -> ConnectorResult<Vec<ToolDefinition>> {
        self.ensure_open()?;
        let stalled = self
            .state
            .read()
            .map_err(poisoned)?
            .stalled_listings
            .contains(&self.endpoint_id);
        if stalled {
            return std::future::pending().await;
        }
        let state = self.state.read().map_err(poisoned)?;
        if let Some(reason) = state.listing_failures.get(&self.endpoint_id) {
            return Err(ConnectorError::runtime(std::io::Error::other(
                reason.clone(),
            )));
        }
        Ok(state
            .catalogs
            .get(&self.endpoint_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn invoke(
        &self,
        call: ToolCall,
        progress: ProgressSink,
    ) -> Result<Value, ToolCallFailure> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ToolCallFailure::Transport(format!(
                "session with endpoint {} is closed",
                self.endpoint_id
            )));
        }

        match self.record_and_resolve(&call)? {
            ScriptedResponse::Reply {
                result,
                progress: updates,
                delay,
            } => {
                for update in updates {
                    if !progress.report(update) {
                        break;
                    }
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(result)
            }
            ScriptedResponse::RemoteError(payload) => Err(ToolCallFailure::Remote(payload)),
            ScriptedResponse::TransportFailure(reason) => Err(ToolCallFailure::Transport(reason)),
            ScriptedResponse::Hang => std::future::pending().await,
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state.closes.entry(self.endpoint_id.clone()).or_default() += 1;
    }
}

//! Presenter lookup keyed by tool name.

use crate::invocation::domain::Invocation;
use crate::presentation::adapters::FallbackPresenter;
use crate::presentation::domain::Presentation;
use crate::presentation::ports::Presenter;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps tool names to presenters, with a mandatory fallback.
#[derive(Clone)]
pub struct PresenterRegistry {
    presenters: HashMap<String, Arc<dyn Presenter>>,
    fallback: Arc<dyn Presenter>,
}

impl PresenterRegistry {
    /// Creates a registry that falls back to `fallback`.
    #[must_use]
    pub fn new(fallback: Arc<dyn Presenter>) -> Self {
        Self {
            presenters: HashMap::new(),
            fallback,
        }
    }

    /// Registers a presenter for `tool_name`, returning the one it replaces.
    pub fn register(
        &mut self,
        tool_name: impl Into<String>,
        presenter: Arc<dyn Presenter>,
    ) -> Option<Arc<dyn Presenter>> {
        self.presenters.insert(tool_name.into(), presenter)
    }

    /// Returns whether a bespoke presenter exists for `tool_name`.
    #[must_use]
    pub fn has_presenter(&self, tool_name: &str) -> bool {
        self.presenters.contains_key(tool_name)
    }

    /// Resolves the presenter for `tool_name`.
    #[must_use]
    pub fn resolve(&self, tool_name: &str) -> Arc<dyn Presenter> {
        self.presenters
            .get(tool_name)
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }

    /// Presents `invocation` with the presenter registered for its tool.
    #[must_use]
    pub fn present(&self, invocation: &Invocation) -> Presentation {
        self.resolve(invocation.tool_name()).present(invocation)
    }
}

impl Default for PresenterRegistry {
    fn default() -> Self {
        Self::new(Arc::new(FallbackPresenter::new()))
    }
}

impl fmt::Debug for PresenterRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tools: Vec<&str> = self.presenters.keys().map(String::as_str).collect();
        tools.sort_unstable();
        formatter
            .debug_struct("PresenterRegistry")
            .field("tools", &tools)
            .finish_non_exhaustive()
    }
}

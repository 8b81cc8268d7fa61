//! Session-scoped facade over the registry, catalog, tracker and presenters.
//!
//! A [`ToolSession`] is created from a [`SessionConfig`] at session start and
//! torn down with [`ToolSession::shutdown`] at session end.

mod config;
mod service;

pub use config::{SessionConfig, SessionConfigError};
pub use service::{ToolSession, ToolSessionError, ToolSessionResult};

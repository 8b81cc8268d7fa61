//! Switchyard: tool discovery and invocation tracking for agent sessions.
//!
//! This crate lets a conversational agent discover and invoke tools exposed
//! by remote tool servers, and tracks the live state of every tool call so a
//! caller can render progress and results.
//!
//! # Architecture
//!
//! Switchyard follows hexagonal architecture principles:
//!
//! - **Domain**: Pure types and state machines with no transport concerns
//! - **Ports**: Abstract trait interfaces for tool-server connectors and
//!   presenters
//! - **Adapters**: Concrete implementations of ports (in-memory connector,
//!   fallback presenter)
//!
//! # Modules
//!
//! - [`endpoint`]: Registry of trusted tool-server endpoints
//! - [`connector`]: Contract for reaching a tool server
//! - [`catalog`]: Aggregated tool catalog and per-endpoint health
//! - [`invocation`]: Tool call lifecycle tracking
//! - [`presentation`]: Rendering contracts for invocation snapshots
//! - [`session`]: Session facade and configuration

pub mod catalog;
pub mod connector;
pub mod endpoint;
pub mod invocation;
pub mod presentation;
pub mod session;

//! Endpoint registry for tool servers trusted by a session.
//!
//! The registry holds the ordered set of tool-server endpoints a session may
//! talk to. It is the single source of truth for endpoint membership: the
//! catalog and the invocation tracker both consult it on every read, so a
//! removal is visible to them as soon as [`services::EndpointRegistry::remove`]
//! returns.
//!
//! - Domain types in [`domain`]
//! - The registry itself in [`services`]

pub mod domain;
pub mod services;

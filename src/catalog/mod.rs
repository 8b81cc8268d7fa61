//! Capability aggregation across every connected tool server.
//!
//! The aggregator merges the tool catalogs of all registered endpoints into a
//! single catalog, tagging each tool with the endpoint that owns it. An
//! unreachable endpoint is recorded as degraded and skipped; it never hides
//! tools from healthy endpoints.
//!
//! - Domain types in [`domain`]
//! - The aggregator in [`services`]

pub mod domain;
pub mod services;

//! Connector contract for reaching tool servers.
//!
//! A connector turns an endpoint descriptor into a live session handle. The
//! core depends only on the traits in [`ports`]; concrete transports live
//! outside this crate. [`adapters`] provides an in-memory implementation for
//! tests and local deterministic flows.

pub mod adapters;
pub mod ports;

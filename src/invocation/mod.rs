//! Execution tracking for individual tool calls.
//!
//! Every tool call is an [`domain::Invocation`] that moves through
//! `pending -> in_progress -> complete | failed`. The tracker in [`services`]
//! dispatches calls through the owning endpoint's session, bounds them with a
//! timeout, supports cancellation, and publishes a snapshot on every change.
//!
//! - Domain types in [`domain`]
//! - The tracker in [`services`]

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;

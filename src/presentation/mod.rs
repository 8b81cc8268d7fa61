//! Rendering contracts for invocation snapshots.
//!
//! A presenter turns an [`Invocation`](crate::invocation::domain::Invocation)
//! snapshot into a [`domain::Presentation`]. Tools without a bespoke
//! presenter use the [`adapters::FallbackPresenter`], which covers the four
//! lifecycle cases generically.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

//! Orchestration services for tool invocations.

mod tracker;

pub use tracker::{
    CancelOutcome, InvocationTracker, InvocationTrackerError, InvocationTrackerResult,
    StartInvocation, TrackerLimits,
};

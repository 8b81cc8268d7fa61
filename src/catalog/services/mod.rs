//! Services for building the aggregated tool catalog.

mod aggregator;

pub use aggregator::{
    CapabilityAggregator, CapabilityAggregatorError, CapabilityAggregatorResult, ConnectorLease,
    ConnectorReservation,
};

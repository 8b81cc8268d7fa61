//! Endpoint registry behaviour observed through a tool session.

use crate::in_memory::helpers::{SessionContext, context, endpoint_id, session_with};
use rstest::rstest;
use switchyard::{
    catalog::services::CapabilityAggregatorError,
    endpoint::{domain::EndpointDescriptor, services::EndpointRegistryError},
    session::{SessionConfig, ToolSessionError},
};

fn listed(context: &SessionContext) -> Vec<String> {
    context
        .session
        .endpoints()
        .iter()
        .map(|descriptor| descriptor.id().as_str().to_owned())
        .collect()
}

#[rstest]
fn initial_endpoints_keep_configured_order(context: SessionContext) {
    assert_eq!(listed(&context), ["A", "B"]);
}

#[rstest]
fn repeated_initial_endpoints_are_registered_once() {
    let config = SessionConfig::default()
        .with_endpoint(EndpointDescriptor::new(endpoint_id("A")))
        .with_endpoint(EndpointDescriptor::new(endpoint_id("A")).with_display_label("Again"))
        .with_endpoint(EndpointDescriptor::new(endpoint_id("B")));

    let context = session_with(&config);

    assert_eq!(listed(&context), ["A", "B"]);
    let first = context.session.endpoints();
    assert_eq!(first.first().and_then(EndpointDescriptor::display_label), None);
}

#[rstest]
fn adding_existing_endpoint_reports_duplicate(context: SessionContext) {
    let result = context
        .session
        .add_endpoint(EndpointDescriptor::new(endpoint_id("A")));

    assert!(matches!(
        result,
        Err(ToolSessionError::Aggregator(CapabilityAggregatorError::Registry(
            EndpointRegistryError::DuplicateEndpoint(_)
        )))
    ));
    assert_eq!(listed(&context), ["A", "B"]);
}

#[rstest]
fn removing_unknown_endpoint_reports_not_found(context: SessionContext) {
    let result = context.session.remove_endpoint(&endpoint_id("C"));

    assert!(matches!(
        result,
        Err(ToolSessionError::Aggregator(CapabilityAggregatorError::Registry(
            EndpointRegistryError::NotFound(_)
        )))
    ));
}

#[rstest]
#[tokio::test]
async fn list_tracks_adds_minus_removes(context: SessionContext) {
    context
        .session
        .add_endpoint(EndpointDescriptor::new(endpoint_id("C")))
        .expect("add C");
    context
        .session
        .remove_endpoint(&endpoint_id("A"))
        .expect("remove A");
    context
        .session
        .add_endpoint(EndpointDescriptor::new(endpoint_id("A")))
        .expect("re-add A");

    assert_eq!(listed(&context), ["B", "C", "A"]);
}

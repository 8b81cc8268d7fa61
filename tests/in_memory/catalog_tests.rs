//! Catalog aggregation across multiple endpoints.

use crate::in_memory::helpers::{SessionContext, catalog_pairs, context, endpoint_id, tool};
use rstest::rstest;
use std::time::Duration;
use switchyard::{
    catalog::domain::EndpointHealthStatus, endpoint::domain::EndpointDescriptor,
};

fn pair(tool: &str, owner: &str) -> (String, String) {
    (tool.to_owned(), owner.to_owned())
}

#[rstest]
#[tokio::test]
async fn catalog_keeps_same_named_tools_per_owner(context: SessionContext) {
    let catalog = context.session.catalog().await;

    assert_eq!(
        catalog_pairs(&catalog),
        [
            pair("getWeather", "A"),
            pair("getWeather", "B"),
            pair("listRepos", "B"),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn unreachable_endpoint_does_not_hide_others(context: SessionContext) {
    context
        .connector
        .set_tool_catalog(endpoint_id("C"), vec![tool("search")])
        .expect("catalog for C");
    context
        .connector
        .set_unreachable(endpoint_id("C"), "connection refused")
        .expect("make C unreachable");
    context
        .session
        .add_endpoint(EndpointDescriptor::new(endpoint_id("C")))
        .expect("add C");

    let catalog = context.session.catalog().await;

    assert_eq!(catalog.len(), 3);
    assert!(catalog.iter().all(|tool| tool.owner_endpoint_id().as_str() != "C"));
    let degraded: Vec<_> = context
        .session
        .endpoint_health()
        .into_iter()
        .filter(|status| status.health.is_degraded())
        .map(|status| status.descriptor.id().as_str().to_owned())
        .collect();
    assert_eq!(degraded, ["C"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stalled_endpoint_is_degraded_after_the_default_bound(context: SessionContext) {
    context
        .connector
        .stall_connect(endpoint_id("H"))
        .expect("stall H");
    context
        .session
        .add_endpoint(EndpointDescriptor::new(endpoint_id("H")))
        .expect("add H");

    let started = tokio::time::Instant::now();
    let catalog = tokio::time::timeout(Duration::from_secs(3600), context.session.catalog())
        .await
        .expect("catalog read should finish despite the stalled endpoint");

    assert_eq!(catalog.len(), 3);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(5000) && waited < Duration::from_secs(6));
    let stalled = context
        .session
        .endpoint_health()
        .into_iter()
        .find(|status| status.descriptor.id().as_str() == "H")
        .expect("H should be listed");
    assert_eq!(stalled.health.status(), EndpointHealthStatus::Degraded);
}

#[rstest]
#[tokio::test]
async fn degraded_endpoint_recovers_on_next_read(context: SessionContext) {
    context
        .connector
        .set_unreachable(endpoint_id("A"), "connection refused")
        .expect("make A unreachable");
    assert_eq!(context.session.catalog().await.len(), 2);

    context
        .connector
        .set_reachable(&endpoint_id("A"))
        .expect("make A reachable");

    assert_eq!(context.session.catalog().await.len(), 3);
    assert_eq!(context.connector.connect_attempts(&endpoint_id("A")), 2);
}

#[rstest]
#[tokio::test]
async fn health_is_unknown_until_first_read(context: SessionContext) {
    let before: Vec<_> = context
        .session
        .endpoint_health()
        .into_iter()
        .map(|status| status.health.status())
        .collect();
    assert_eq!(before, [EndpointHealthStatus::Unknown, EndpointHealthStatus::Unknown]);

    let _catalog = context.session.catalog().await;

    let after: Vec<_> = context
        .session
        .endpoint_health()
        .into_iter()
        .map(|status| status.health.status())
        .collect();
    assert_eq!(
        after,
        [EndpointHealthStatus::Connected, EndpointHealthStatus::Connected]
    );
}

#[rstest]
#[tokio::test]
async fn repeated_reads_reuse_sessions(context: SessionContext) {
    for _ in 0..3 {
        let _catalog = context.session.catalog().await;
    }

    assert_eq!(context.connector.connect_attempts(&endpoint_id("A")), 1);
    assert_eq!(context.connector.connect_attempts(&endpoint_id("B")), 1);
}

#[rstest]
#[tokio::test]
async fn remote_catalog_changes_show_on_next_read(context: SessionContext) {
    assert_eq!(context.session.catalog().await.len(), 3);

    context
        .connector
        .set_tool_catalog(endpoint_id("A"), vec![tool("getWeather"), tool("getAlerts")])
        .expect("update catalog for A");

    assert_eq!(context.session.catalog().await.len(), 4);
}

#[rstest]
#[tokio::test]
async fn find_tool_is_scoped_to_owner(context: SessionContext) {
    let aggregator = context.session.aggregator();

    let on_b = aggregator.find_tool("listRepos", &endpoint_id("B")).await;
    let on_a = aggregator.find_tool("listRepos", &endpoint_id("A")).await;

    assert_eq!(
        on_b.map(|tool| tool.owner_endpoint_id().as_str().to_owned()),
        Some("B".to_owned())
    );
    assert!(on_a.is_none());
}

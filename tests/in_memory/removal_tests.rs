//! Endpoint removal racing catalog reads and running invocations.

use std::time::Duration;

use crate::in_memory::helpers::{SessionContext, catalog_pairs, context, endpoint_id};
use eyre::ensure;
use rstest::rstest;
use serde_json::json;
use switchyard::{
    connector::adapters::ScriptedResponse,
    invocation::{
        domain::InvocationState,
        services::{InvocationTrackerError, StartInvocation},
    },
    session::ToolSessionError,
};

#[rstest]
#[tokio::test]
async fn removed_endpoint_leaves_catalog_immediately(context: SessionContext) -> eyre::Result<()> {
    ensure!(context.session.catalog().await.len() == 3);

    context.session.remove_endpoint(&endpoint_id("B"))?;
    let catalog = context.session.catalog().await;

    ensure!(catalog_pairs(&catalog) == [("getWeather".to_owned(), "A".to_owned())]);
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn removal_lets_running_invocation_finish(context: SessionContext) -> eyre::Result<()> {
    context.connector.script(
        endpoint_id("A"),
        "getWeather",
        ScriptedResponse::reply(json!({"forecast": "rain"})).after(Duration::from_millis(200)),
    )?;
    let id = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({"city": "Leeds"}),
    ))?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    ensure!(context.connector.recorded_calls().len() == 1, "call should be dispatched");

    context.session.remove_endpoint(&endpoint_id("A"))?;

    let listed: Vec<String> = context
        .session
        .endpoints()
        .iter()
        .map(|descriptor| descriptor.id().as_str().to_owned())
        .collect();
    ensure!(listed == ["B"]);
    ensure!(
        context.session.snapshot(id).map(|invocation| invocation.state())
            == Some(InvocationState::InProgress)
    );
    ensure!(context.connector.close_count(&endpoint_id("A")) == 0);

    let finished = context.session.wait_for_terminal(id).await?;
    ensure!(finished.state() == InvocationState::Complete);
    ensure!(finished.result() == Some(&json!({"forecast": "rain"})));

    tokio::time::sleep(Duration::from_millis(1)).await;
    ensure!(context.connector.close_count(&endpoint_id("A")) == 1);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn removal_without_yielding_after_start_keeps_invocation(
    context: SessionContext,
) -> eyre::Result<()> {
    let id = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({"city": "York"}),
    ))?;
    context.session.remove_endpoint(&endpoint_id("A"))?;

    let finished = context.session.wait_for_terminal(id).await?;

    ensure!(
        finished.state() == InvocationState::Complete,
        "removal must not fail an accepted invocation: {:?}",
        finished.error()
    );
    ensure!(context.connector.recorded_calls().len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn calls_against_removed_endpoint_are_rejected(context: SessionContext) -> eyre::Result<()> {
    context.session.remove_endpoint(&endpoint_id("A"))?;

    let result = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({}),
    ));

    ensure!(matches!(
        result,
        Err(ToolSessionError::Tracker(InvocationTrackerError::UnknownEndpoint(_)))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn catalog_reads_racing_removal_never_tear(context: SessionContext) -> eyre::Result<()> {
    context
        .connector
        .set_connect_delay(Duration::from_millis(5))?;

    let read = context.session.catalog();
    let remove = async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        context.session.remove_endpoint(&endpoint_id("B"))
    };
    let (catalog, removed) = tokio::join!(read, remove);
    removed?;

    let pairs = catalog_pairs(&catalog);
    let before = vec![
        ("getWeather".to_owned(), "A".to_owned()),
        ("getWeather".to_owned(), "B".to_owned()),
        ("listRepos".to_owned(), "B".to_owned()),
    ];
    let after = vec![("getWeather".to_owned(), "A".to_owned())];
    ensure!(pairs == before || pairs == after, "torn catalog: {pairs:?}");
    ensure!(catalog_pairs(&context.session.catalog().await) == after);
    Ok(())
}

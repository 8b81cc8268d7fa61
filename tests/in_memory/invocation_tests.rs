//! Invocation lifecycle through a tool session.

use std::time::Duration;

use crate::in_memory::helpers::{SessionContext, context, endpoint_id, session_with, tool};
use eyre::{ensure, eyre};
use rstest::rstest;
use serde_json::json;
use switchyard::{
    connector::adapters::ScriptedResponse,
    endpoint::domain::EndpointDescriptor,
    invocation::{
        domain::{InvocationErrorKind, InvocationState},
        services::{CancelOutcome, InvocationTrackerError, StartInvocation},
    },
    session::{SessionConfig, ToolSessionError},
};
use tokio::time::Instant;

#[rstest]
#[tokio::test]
async fn delayed_reply_yields_pending_in_progress_complete(
    context: SessionContext,
) -> eyre::Result<()> {
    context.connector.script(
        endpoint_id("A"),
        "getWeather",
        ScriptedResponse::reply(json!({"forecast": "sunny"})).after(Duration::from_millis(20)),
    )?;
    let mut events = context.session.subscribe();

    let id = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({"city": "NYC"}),
    ))?;

    let mut states = Vec::new();
    loop {
        let snapshot = events.recv().await?;
        ensure!(snapshot.id() == id, "snapshot belongs to another invocation");
        states.push(snapshot.state());
        if snapshot.is_terminal() {
            ensure!(snapshot.result() == Some(&json!({"forecast": "sunny"})));
            break;
        }
    }
    ensure!(
        states
            == [
                InvocationState::Pending,
                InvocationState::InProgress,
                InvocationState::Complete,
            ],
        "unexpected state sequence: {states:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn silent_server_times_out_within_bound(context: SessionContext) -> eyre::Result<()> {
    context
        .connector
        .script(endpoint_id("B"), "listRepos", ScriptedResponse::Hang)?;
    let started = Instant::now();

    let id = context.session.start_invocation(StartInvocation::new(
        "listRepos",
        endpoint_id("B"),
        json!({"owner": "octocat"}),
    ))?;
    let finished = context.session.wait_for_terminal(id).await?;

    ensure!(finished.state() == InvocationState::Failed);
    ensure!(finished.error().map(|error| error.kind()) == Some(InvocationErrorKind::Timeout));
    let elapsed = started.elapsed();
    ensure!(
        elapsed >= Duration::from_millis(5000) && elapsed < Duration::from_millis(5100),
        "timed out after {elapsed:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn unknown_owner_is_rejected(context: SessionContext) {
    let result = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("C"),
        json!({}),
    ));

    assert!(matches!(
        result,
        Err(ToolSessionError::Tracker(InvocationTrackerError::UnknownEndpoint(_)))
    ));
    assert!(context.session.tracker().snapshots().is_empty());
}

#[rstest]
#[tokio::test]
async fn same_named_tools_dispatch_to_their_owner(context: SessionContext) -> eyre::Result<()> {
    context.connector.script(
        endpoint_id("A"),
        "getWeather",
        ScriptedResponse::reply(json!("from A")),
    )?;
    context.connector.script(
        endpoint_id("B"),
        "getWeather",
        ScriptedResponse::reply(json!("from B")),
    )?;

    let on_b = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("B"),
        json!({}),
    ))?;
    let finished = context.session.wait_for_terminal(on_b).await?;

    ensure!(finished.result() == Some(&json!("from B")));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn concurrent_invocations_on_one_endpoint_are_independent(
    context: SessionContext,
) -> eyre::Result<()> {
    let first = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("B"),
        json!({"city": "Paris"}),
    ))?;
    let second = context.session.start_invocation(StartInvocation::new(
        "listRepos",
        endpoint_id("B"),
        json!({"owner": "rust-lang"}),
    ))?;

    let first_done = context.session.wait_for_terminal(first).await?;
    let second_done = context.session.wait_for_terminal(second).await?;

    ensure!(
        first_done.result()
            == Some(&json!({"tool": "getWeather", "arguments": {"city": "Paris"}}))
    );
    ensure!(
        second_done.result()
            == Some(&json!({"tool": "listRepos", "arguments": {"owner": "rust-lang"}}))
    );
    ensure!(context.connector.connect_attempts(&endpoint_id("B")) == 1);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn cancelled_invocation_fails_with_cancelled(context: SessionContext) -> eyre::Result<()> {
    context
        .connector
        .script(endpoint_id("A"), "getWeather", ScriptedResponse::Hang)?;
    let id = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({}),
    ))?;

    ensure!(context.session.cancel(id)? == CancelOutcome::Cancelled);
    let finished = context.session.wait_for_terminal(id).await?;

    ensure!(finished.error().map(|error| error.kind()) == Some(InvocationErrorKind::Cancelled));
    ensure!(context.session.cancel(id)? == CancelOutcome::AlreadyTerminal);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn session_limit_rejects_excess_invocations() -> eyre::Result<()> {
    let config = SessionConfig {
        max_concurrent_invocations: 1,
        ..SessionConfig::default()
    }
    .with_endpoint(EndpointDescriptor::new(endpoint_id("A")));
    let context = session_with(&config);
    context
        .connector
        .set_tool_catalog(endpoint_id("A"), vec![tool("getWeather")])?;
    context
        .connector
        .script(endpoint_id("A"), "getWeather", ScriptedResponse::Hang)?;
    let request = StartInvocation::new("getWeather", endpoint_id("A"), json!({}));

    let _running = context.session.start_invocation(request.clone())?;
    let rejected = context.session.start_invocation(request);

    ensure!(matches!(
        rejected,
        Err(ToolSessionError::Tracker(
            InvocationTrackerError::ConcurrencyLimitReached { limit: 1 }
        ))
    ));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn dropped_session_fails_with_connection_error(context: SessionContext) -> eyre::Result<()> {
    context.connector.script(
        endpoint_id("A"),
        "getWeather",
        ScriptedResponse::TransportFailure("connection reset by peer".to_owned()),
    )?;

    let id = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({}),
    ))?;
    let finished = context.session.wait_for_terminal(id).await?;
    let error = finished
        .error()
        .ok_or_else(|| eyre!("failed invocation should carry an error"))?;

    ensure!(error.kind() == InvocationErrorKind::ConnectionError);
    ensure!(error.message() == "connection reset by peer");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn shutdown_cancels_running_invocations(context: SessionContext) -> eyre::Result<()> {
    context
        .connector
        .script(endpoint_id("A"), "getWeather", ScriptedResponse::Hang)?;
    let id = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({}),
    ))?;

    context.session.shutdown().await;

    let snapshot = context
        .session
        .snapshot(id)
        .ok_or_else(|| eyre!("invocation should still be tracked"))?;
    ensure!(snapshot.error().map(|error| error.kind()) == Some(InvocationErrorKind::Cancelled));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn watchers_observe_partial_then_result(context: SessionContext) -> eyre::Result<()> {
    context.connector.script(
        endpoint_id("B"),
        "listRepos",
        ScriptedResponse::reply(json!(["switchyard"]))
            .with_progress([json!({"page": 1})])
            .after(Duration::from_millis(20)),
    )?;
    let id = context.session.start_invocation(StartInvocation::new(
        "listRepos",
        endpoint_id("B"),
        json!({"owner": "octocat"}),
    ))?;
    let mut watcher = context
        .session
        .watch(id)
        .ok_or_else(|| eyre!("started invocation should be watchable"))?;

    let partial = watcher
        .wait_for(|invocation| invocation.partial().is_some())
        .await?
        .partial()
        .cloned();
    ensure!(partial == Some(json!({"page": 1})));

    let finished = watcher.wait_for(|invocation| invocation.is_terminal()).await?.clone();
    ensure!(finished.result() == Some(&json!(["switchyard"])));
    Ok(())
}

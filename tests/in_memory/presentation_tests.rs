//! Presenter selection for invocation snapshots.

use std::sync::Arc;

use crate::in_memory::helpers::{SessionContext, context, endpoint_id};
use eyre::{ensure, eyre};
use rstest::rstest;
use serde_json::json;
use switchyard::{
    connector::adapters::ScriptedResponse,
    invocation::{
        domain::{Invocation, InvocationErrorKind},
        services::StartInvocation,
    },
    presentation::{
        domain::{Presentation, PresentationBody},
        ports::Presenter,
    },
};

struct WeatherCard;

impl Presenter for WeatherCard {
    fn present(&self, invocation: &Invocation) -> Presentation {
        Presentation {
            invocation_id: invocation.id(),
            tool_name: invocation.tool_name().to_owned(),
            arguments: invocation.arguments().clone(),
            summary: "weather card".to_owned(),
            body: PresentationBody::Pending,
        }
    }
}

#[rstest]
#[tokio::test]
async fn fallback_presents_completed_result(context: SessionContext) -> eyre::Result<()> {
    let id = context.session.start_invocation(StartInvocation::new(
        "listRepos",
        endpoint_id("B"),
        json!({"owner": "octocat"}),
    ))?;
    context.session.wait_for_terminal(id).await?;

    let presentation = context
        .session
        .present(id)
        .ok_or_else(|| eyre!("finished invocation should be presentable"))?;

    ensure!(presentation.tool_name == "listRepos");
    ensure!(presentation.arguments == json!({"owner": "octocat"}));
    ensure!(
        presentation.body
            == PresentationBody::Complete {
                result: json!({"tool": "listRepos", "arguments": {"owner": "octocat"}}),
            }
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn fallback_presents_remote_error_text(context: SessionContext) -> eyre::Result<()> {
    context.connector.script(
        endpoint_id("A"),
        "getWeather",
        ScriptedResponse::RemoteError(json!("Unable to fetch forecast data for this location.")),
    )?;
    let id = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({"latitude": 0, "longitude": 0}),
    ))?;
    context.session.wait_for_terminal(id).await?;

    let presentation = context
        .session
        .present(id)
        .ok_or_else(|| eyre!("finished invocation should be presentable"))?;

    ensure!(
        presentation.body
            == PresentationBody::Failed {
                kind: Some(InvocationErrorKind::RemoteToolError),
                message: "Unable to fetch forecast data for this location.".to_owned(),
            }
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn presenter_is_fixed_when_invocation_starts(context: SessionContext) -> eyre::Result<()> {
    context
        .session
        .register_presenter("getWeather", Arc::new(WeatherCard));
    let with_card = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({}),
    ))?;
    context.session.wait_for_terminal(with_card).await?;

    let second = context.session.start_invocation(StartInvocation::new(
        "listRepos",
        endpoint_id("B"),
        json!({}),
    ))?;
    context
        .session
        .register_presenter("listRepos", Arc::new(WeatherCard));
    context.session.wait_for_terminal(second).await?;

    let card = context
        .session
        .present(with_card)
        .ok_or_else(|| eyre!("first invocation should be presentable"))?;
    let fallback = context
        .session
        .present(second)
        .ok_or_else(|| eyre!("second invocation should be presentable"))?;

    ensure!(card.summary == "weather card");
    ensure!(fallback.summary == "listRepos: done");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn released_invocation_is_no_longer_presentable(context: SessionContext) -> eyre::Result<()> {
    let id = context.session.start_invocation(StartInvocation::new(
        "getWeather",
        endpoint_id("A"),
        json!({}),
    ))?;
    context.session.wait_for_terminal(id).await?;

    context.session.release(id)?;

    ensure!(context.session.present(id).is_none());
    Ok(())
}

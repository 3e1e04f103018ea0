//! Route handlers.
//!
//! Handlers are thin: pick the configured source, hand it to the pipeline,
//! wrap the result in JSON. Every failure leaves as an [`Error`] response.

use super::SharedState;
use crate::error::{Error, Result};
use crate::models::{
    AuthStatus, Feed, LoginRequest, MessageResponse, SourceQuery, SummaryResponse, TrendItem,
    TrendingRepository, TrendsRequest,
};
use crate::scrapers::feed::parse_feed;
use crate::scrapers::pipeline::{summarize_text, summarize_url};
use crate::scrapers::trending::parse_trending;
use crate::session::{
    Identity, SessionState, revocation_cookie, session_cookie, token_from_headers,
};
use crate::utils::parse_source_url;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use itertools::Itertools;
use tracing::{debug, info, instrument};

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| Error::invalid(rejection.body_text()))
}

#[instrument(level = "info", skip_all)]
pub async fn login(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(payload)?;
    let session = state
        .gate
        .issue(&request.username, &request.password, Utc::now())?;

    info!(username = %session.identity.username, "Login succeeded");
    Ok((
        [(SET_COOKIE, session_cookie(&session))],
        Json(MessageResponse::new("logged in")),
    )
        .into_response())
}

/// Always succeeds; the client is told to drop its cookie either way.
pub async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let now = Utc::now();
    match state.gate.state(token_from_headers(&headers), now) {
        SessionState::Authenticated(identity) => {
            info!(username = %identity.username, "Logged out")
        }
        SessionState::Anonymous => debug!("Logout without a valid session"),
    }
    (
        [(SET_COOKIE, revocation_cookie(now))],
        Json(MessageResponse::new("logged out")),
    )
        .into_response()
}

pub async fn check_auth(Extension(identity): Extension<Identity>) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: true,
        username: identity.username,
    })
}

/// Fetch and parse the catalog feed called `name`.
#[instrument(level = "info", skip(state))]
pub async fn load_feed(state: &SharedState, name: &str) -> Result<Feed> {
    let source = state
        .catalog
        .feeds
        .get(name)
        .ok_or_else(|| Error::invalid(format!("unknown feed {name}")))?;
    let url = parse_source_url(&source.url)?;
    let body = state.plain.get_text(&url).await?;
    let feed = parse_feed(&body)?;
    info!(items = feed.items.len(), "Feed loaded");
    Ok(feed)
}

pub async fn feed(State(state): State<SharedState>, Path(name): Path<String>) -> Result<Json<Feed>> {
    load_feed(&state, &name).await.map(Json)
}

/// Fetch and parse the catalog trending page called `name`.
#[instrument(level = "info", skip(state))]
pub async fn load_trending(state: &SharedState, name: &str) -> Result<Vec<TrendingRepository>> {
    let source = state
        .catalog
        .trending
        .get(name)
        .ok_or_else(|| Error::invalid(format!("unknown trending page {name}")))?;
    let url = parse_source_url(&source.url)?;
    let body = state.plain.get_text(&url).await?;
    Ok(parse_trending(&body))
}

/// Render the catalog page called `name` and return its container markup.
#[instrument(level = "info", skip(state))]
pub async fn load_rendered(state: &SharedState, name: &str) -> Result<String> {
    let page = state
        .catalog
        .pages
        .get(name)
        .ok_or_else(|| Error::invalid(format!("unknown page {name}")))?;
    let url = parse_source_url(&page.url)?;
    Ok(state.rendered.render(&url, &page.wait_for).await?)
}

pub async fn article_summary(
    State(state): State<SharedState>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<SummaryResponse>> {
    let profile = &state.catalog.summaries.article;
    let summary = summarize_url(
        &state.source_for(profile),
        &state.summarizer,
        query.url.as_deref().unwrap_or_default(),
        &profile.selectors,
        &profile.instruction,
    )
    .await?;
    Ok(Json(SummaryResponse { summary }))
}

pub async fn repository_summary(
    State(state): State<SharedState>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<SummaryResponse>> {
    let profile = &state.catalog.summaries.repository;
    let summary = summarize_url(
        &state.source_for(profile),
        &state.summarizer,
        query.url.as_deref().unwrap_or_default(),
        &profile.selectors,
        &profile.instruction,
    )
    .await?;
    Ok(Json(SummaryResponse { summary }))
}

fn render_trend_items(items: &[TrendItem]) -> Result<String> {
    if items.is_empty() {
        return Err(Error::invalid("items must not be empty"));
    }
    if let Some(index) = items.iter().position(|item| item.title.trim().is_empty()) {
        return Err(Error::invalid(format!("item {} has no title", index + 1)));
    }

    Ok(items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut block = format!("=== item #{} ===\ntitle: {}", i + 1, item.title.trim());
            if !item.link.is_empty() {
                block.push_str(&format!("\nlink: {}", item.link));
            }
            if !item.description.is_empty() {
                block.push_str(&format!("\ndescription: {}", item.description));
            }
            block
        })
        .join("\n\n"))
}

#[instrument(level = "info", skip_all)]
pub async fn trends_summary(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<TrendsRequest>, JsonRejection>,
) -> Result<Json<SummaryResponse>> {
    let request = json_body(payload)?;
    let body = render_trend_items(&request.items)?;
    info!(items = request.items.len(), "Summarizing trends");

    let summary = summarize_text(
        &state.summarizer,
        &state.catalog.summaries.trends.instruction,
        &body,
    )
    .await?;
    Ok(Json(SummaryResponse { summary }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str, description: &str) -> TrendItem {
        TrendItem {
            title: title.into(),
            link: link.into(),
            description: description.into(),
        }
    }

    #[test]
    fn test_render_trend_items() {
        let text = render_trend_items(&[
            item("Go 1.24", "https://go.dev/blog/go1.24", "Swiss tables"),
            item(" Rust 2024 ", "", ""),
        ])
        .unwrap();
        assert_eq!(
            text,
            "=== item #1 ===\ntitle: Go 1.24\nlink: https://go.dev/blog/go1.24\ndescription: Swiss tables\n\n\
             === item #2 ===\ntitle: Rust 2024"
        );
    }

    #[test]
    fn test_render_trend_items_rejects_empty() {
        assert!(matches!(render_trend_items(&[]), Err(Error::InvalidInput(_))));
        assert!(matches!(
            render_trend_items(&[item("ok", "", ""), item("  ", "", "")]),
            Err(Error::InvalidInput(msg)) if msg.contains("item 2")
        ));
    }
}

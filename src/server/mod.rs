//! HTTP surface.
//!
//! # Routes
//!
//! | Method | Path | Auth | Response |
//! |--------|------|------|----------|
//! | POST | `/api/login` | no | sets `auth_token` |
//! | POST | `/api/logout` | no | expires `auth_token` |
//! | GET | `/api/check-auth` | yes | `{authenticated, username}` |
//! | GET | `/feeds/:name`, `/rss`, `/rss-ja`, legacy `*-content` aliases | yes | feed JSON |
//! | GET | `/github-trending`, `/golang-repository-trending` | yes | repository list |
//! | GET | `/tiobe-graph` | yes | rendered markup as a JSON string |
//! | GET | `/ai-article-summary?url=` | yes | `{summary}` |
//! | GET | `/ai-repository-summary?url=` | yes | `{summary}` |
//! | POST | `/ai-trends-summary` | yes | `{summary}` |
//!
//! Protected routes sit behind [`auth::require_session`]. The whole router
//! is wrapped in a request timeout longer than any component timeout, and in
//! a `tower-http` trace layer.

mod auth;
mod routes;

use crate::api::GeminiClient;
use crate::config::{Settings, SourceCatalog, SourceKind, SummaryProfile};
use crate::error::Result;
use crate::scrapers::Source;
use crate::scrapers::github::RepositoryClient;
use crate::scrapers::plain::{PAGE_TIMEOUT, PlainFetcher};
use crate::scrapers::rendered::{RENDER_TIMEOUT, RenderedFetcher};
use crate::session::SessionGate;
use axum::Router;
use axum::extract::State;
use axum::middleware;
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Upper bound on handling one request. Must outlast a rendered fetch plus
/// its session close, so slow pages still answer with a tagged fetch error.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Older paths that serve a catalog feed directly.
const FEED_ALIASES: &[(&str, &str)] = &[
    ("/rss", "infoq"),
    ("/rss-ja", "infoq-ja"),
    ("/golang-weekly-content", "golang-weekly"),
    ("/google-cloud-content", "google-cloud"),
    ("/google-cloud-content-ja", "google-cloud-ja"),
    ("/aws-content", "aws"),
    ("/aws-content-ja", "aws-ja"),
    ("/azure-content", "azure"),
    ("/azure-content-ja", "azure-ja"),
];

const TRENDING_ROUTES: &[(&str, &str)] = &[
    ("/github-trending", "all"),
    ("/golang-repository-trending", "go"),
];

/// Everything handlers share. Read-only after startup.
#[derive(Debug)]
pub struct AppState {
    pub gate: SessionGate,
    pub plain: PlainFetcher,
    pub rendered: RenderedFetcher,
    pub repositories: RepositoryClient,
    pub summarizer: GeminiClient,
    pub catalog: SourceCatalog,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            gate: SessionGate::new(&settings.jwt_secret, settings.credentials.clone()),
            plain: PlainFetcher::new(PAGE_TIMEOUT)?,
            rendered: RenderedFetcher::new(&settings.webdriver_url, RENDER_TIMEOUT)?,
            repositories: RepositoryClient::new(&settings.github_api, settings.github_token.clone())?,
            summarizer: GeminiClient::new(
                settings.gemini_api_key.clone(),
                &settings.gemini_endpoint,
                &settings.gemini_model,
            )?,
            catalog: settings.catalog.clone(),
        })
    }

    /// The source a summary profile reads from.
    pub fn source_for<'a>(&'a self, profile: &'a SummaryProfile) -> Source<'a> {
        match profile.via {
            SourceKind::Plain => Source::Plain(&self.plain),
            SourceKind::Rendered => Source::Rendered(
                self.rendered
                    .waiting_for(profile.wait_for.as_deref().unwrap_or("body")),
            ),
            SourceKind::Repository => Source::Repository(&self.repositories),
        }
    }
}

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    let mut protected = Router::new()
        .route("/api/check-auth", get(routes::check_auth))
        .route("/feeds/:name", get(routes::feed))
        .route(
            "/tiobe-graph",
            get(|State(state): State<SharedState>| async move {
                routes::load_rendered(&state, "tiobe").await.map(axum::Json)
            }),
        )
        .route("/ai-article-summary", get(routes::article_summary))
        .route("/ai-repository-summary", get(routes::repository_summary))
        .route("/ai-trends-summary", post(routes::trends_summary));

    for &(path, name) in FEED_ALIASES {
        protected = protected.route(
            path,
            get(move |State(state): State<SharedState>| async move {
                routes::load_feed(&state, name).await.map(axum::Json)
            }),
        );
    }
    for &(path, name) in TRENDING_ROUTES {
        protected = protected.route(
            path,
            get(move |State(state): State<SharedState>| async move {
                routes::load_trending(&state, name).await.map(axum::Json)
            }),
        );
    }

    let protected =
        protected.route_layer(middleware::from_fn_with_state(state.clone(), auth::require_session));

    Router::new()
        .route("/api/login", post(routes::login))
        .route("/api/logout", post(routes::logout))
        .merge(protected)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

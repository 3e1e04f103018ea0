//! Browser-rendered fetcher driving a WebDriver endpoint through `fantoccini`.
//!
//! Each call opens its own headless browser session on the driver
//! (chromedriver, geckodriver, ...), navigates, waits for a container element
//! to become visible, captures that element's outer markup and closes the
//! session. Sessions are never shared between calls.
//!
//! All four steps share one deadline. Whichever step is running when it
//! passes fails with its own [`RenderStep`] tag, so a timeout is never
//! reported without the step that caused it.
//!
//! Session cleanup happens on every exit path. The normal paths await the
//! close explicitly; if the calling future is dropped mid-flight the
//! [`SessionGuard`] spawns the close from its `Drop`.

use super::{Fetch, SourceContent};
use crate::error::{FetchError, RenderStep, Result};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Deadline for a whole rendered fetch, from session creation to capture.
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on closing the session once the fetch is over.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between checks while waiting for the container.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct RenderedFetcher {
    endpoint: String,
    timeout: Duration,
}

impl RenderedFetcher {
    /// `endpoint` is the driver's base URL, e.g. `http://localhost:9515`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Render `url` and return the outer markup of the first element matching
    /// `container` once it is visible.
    #[instrument(level = "info", skip_all, fields(%url, %container))]
    pub async fn render(&self, url: &Url, container: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let deadline = t0 + self.timeout;

        let client = run_step(url, RenderStep::Session, deadline, open_session(&self.endpoint)).await?;
        let guard = SessionGuard(Some(client.clone()));

        let outcome = capture(&client, url, container, deadline).await;
        guard.close().await;

        let markup = outcome?;
        info!(
            bytes = markup.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Captured rendered container"
        );
        Ok(markup)
    }

    /// Bind a container selector, producing something that satisfies [`Fetch`].
    pub fn waiting_for<'a>(&'a self, container: &'a str) -> RenderedSource<'a> {
        RenderedSource {
            fetcher: self,
            container,
        }
    }
}

/// A [`RenderedFetcher`] paired with the container it waits for.
#[derive(Debug, Clone, Copy)]
pub struct RenderedSource<'a> {
    fetcher: &'a RenderedFetcher,
    container: &'a str,
}

impl Fetch for RenderedSource<'_> {
    async fn fetch(&self, url: &Url) -> Result<SourceContent> {
        Ok(SourceContent::Markup(
            self.fetcher.render(url, self.container).await?,
        ))
    }
}

async fn open_session(endpoint: &str) -> Result<Client, fantoccini::error::NewSessionError> {
    let mut capabilities = serde_json::Map::new();
    capabilities.insert("browserName".to_string(), json!("chrome"));
    capabilities.insert(
        "goog:chromeOptions".to_string(),
        json!({ "args": ["--headless=new", "--disable-gpu", "--no-sandbox"] }),
    );

    let client = ClientBuilder::native()
        .capabilities(capabilities)
        .connect(endpoint)
        .await?;
    debug!("Opened WebDriver session");
    Ok(client)
}

async fn capture(client: &Client, url: &Url, container: &str, deadline: Instant) -> Result<String, FetchError> {
    run_step(url, RenderStep::Navigate, deadline, client.goto(url.as_str())).await?;

    let element = run_step(url, RenderStep::Wait, deadline, async {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let element = client
            .wait()
            .at_most(remaining)
            .every(POLL_INTERVAL)
            .for_element(Locator::Css(container))
            .await?;
        while !element.is_displayed().await? {
            sleep(POLL_INTERVAL).await;
        }
        Ok::<_, fantoccini::error::CmdError>(element)
    })
    .await?;

    run_step(url, RenderStep::Capture, deadline, element.html(false)).await
}

/// Run one step against the shared deadline, tagging any failure with `step`.
async fn run_step<T, E, F>(url: &Url, step: RenderStep, deadline: Instant, fut: F) -> Result<T, FetchError>
where
    E: fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    let detail = match timeout_at(deadline, fut).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => e.to_string(),
        Err(_) => "deadline exceeded".to_string(),
    };
    warn!(%step, %detail, "Rendered fetch step failed");
    Err(FetchError::Render {
        url: url.to_string(),
        step,
        detail,
    })
}

/// Holds a handle to the live session and closes it when dropped.
struct SessionGuard(Option<Client>);

impl SessionGuard {
    async fn close(mut self) {
        if let Some(client) = self.0.take() {
            close_session(client).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(client) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close_session(client));
            }
            Err(_) => warn!("No runtime available to close WebDriver session"),
        }
    }
}

async fn close_session(client: Client) {
    match timeout(CLOSE_TIMEOUT, client.close()).await {
        Ok(Ok(())) => debug!("Closed WebDriver session"),
        Ok(Err(e)) => warn!(error = %e, "Failed to close WebDriver session"),
        Err(_) => warn!(timeout = ?CLOSE_TIMEOUT, "WebDriver session close timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Key under which WebDriver returns element references.
    const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

    #[derive(Clone, Default)]
    struct Driver {
        deleted: Arc<AtomicUsize>,
        polls: Arc<AtomicUsize>,
        fail_navigate: bool,
        never_visible: bool,
        slow_session: bool,
    }

    fn driver_error(status: StatusCode, error: &str, message: &str) -> (StatusCode, Json<serde_json::Value>) {
        (
            status,
            Json(json!({ "value": { "error": error, "message": message, "stacktrace": "" } })),
        )
    }

    fn driver_router(driver: Driver) -> Router {
        Router::new()
            .route(
                "/session",
                post(|State(d): State<Driver>| async move {
                    if d.slow_session {
                        sleep(Duration::from_secs(5)).await;
                    }
                    Json(json!({ "value": { "sessionId": "s-1", "capabilities": {} } }))
                }),
            )
            .route(
                "/session/:id",
                axum::routing::delete(|State(d): State<Driver>| async move {
                    d.deleted.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "value": null }))
                }),
            )
            .route(
                "/session/:id/url",
                get(|| async { Json(json!({ "value": "about:blank" })) }).post(
                    |State(d): State<Driver>| async move {
                        if d.fail_navigate {
                            driver_error(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                "unknown error",
                                "net::ERR_NAME_NOT_RESOLVED",
                            )
                        } else {
                            (StatusCode::OK, Json(json!({ "value": null })))
                        }
                    },
                ),
            )
            .route(
                "/session/:id/element",
                post(|State(d): State<Driver>| async move {
                    // Element shows up on the second poll.
                    if d.polls.fetch_add(1, Ordering::SeqCst) == 0 {
                        driver_error(StatusCode::NOT_FOUND, "no such element", "#container")
                    } else {
                        (StatusCode::OK, Json(json!({ "value": { ELEMENT_KEY: "el-7" } })))
                    }
                }),
            )
            .route(
                "/session/:id/element/:el/displayed",
                get(|State(d): State<Driver>| async move { Json(json!({ "value": !d.never_visible })) }),
            )
            .route(
                "/session/:id/element/:el/property/outerHTML",
                get(|Path((_id, el)): Path<(String, String)>| async move {
                    Json(json!({ "value": format!("<div id=\"container\" data-el=\"{el}\"><svg></svg></div>") }))
                }),
            )
            .fallback(|| async { Json(json!({ "value": null })) })
            .with_state(driver)
    }

    fn target() -> Url {
        Url::parse("https://www.tiobe.com/tiobe-index/").unwrap()
    }

    async fn wait_for_delete(deleted: &AtomicUsize) {
        for _ in 0..50 {
            if deleted.load(Ordering::SeqCst) > 0 {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_render_captures_outer_html_and_closes_session() {
        let driver = Driver::default();
        let endpoint = serve(driver_router(driver.clone())).await;

        let fetcher = RenderedFetcher::new(&endpoint, Duration::from_secs(5)).unwrap();
        let markup = fetcher.render(&target(), "#container").await.unwrap();

        assert_eq!(markup, "<div id=\"container\" data-el=\"el-7\"><svg></svg></div>");
        assert_eq!(driver.polls.load(Ordering::SeqCst), 2);
        assert_eq!(driver.deleted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigate_failure_is_tagged_and_session_closed() {
        let driver = Driver {
            fail_navigate: true,
            ..Driver::default()
        };
        let endpoint = serve(driver_router(driver.clone())).await;

        let fetcher = RenderedFetcher::new(&endpoint, Duration::from_secs(5)).unwrap();
        match fetcher.render(&target(), "#container").await {
            Err(FetchError::Render { step, .. }) => assert_eq!(step, RenderStep::Navigate),
            other => panic!("expected navigate failure, got {other:?}"),
        }
        assert_eq!(driver.deleted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invisible_container_fails_wait_step() {
        let driver = Driver {
            never_visible: true,
            ..Driver::default()
        };
        let endpoint = serve(driver_router(driver.clone())).await;

        let fetcher = RenderedFetcher::new(&endpoint, Duration::from_millis(800)).unwrap();
        for _ in 0..3 {
            match fetcher.render(&target(), "#container").await {
                Err(FetchError::Render { step, .. }) => assert_eq!(step, RenderStep::Wait),
                other => panic!("expected wait failure, got {other:?}"),
            }
        }
        assert_eq!(driver.deleted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unreachable_driver_fails_session_step() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = RenderedFetcher::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        match fetcher.render(&target(), "#container").await {
            Err(FetchError::Render { step, .. }) => assert_eq!(step, RenderStep::Session),
            other => panic!("expected session failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_session_is_bounded_by_deadline() {
        let driver = Driver {
            slow_session: true,
            ..Driver::default()
        };
        let endpoint = serve(driver_router(driver)).await;

        let fetcher = RenderedFetcher::new(&endpoint, Duration::from_millis(300)).unwrap();
        let t0 = Instant::now();
        match fetcher.render(&target(), "#container").await {
            Err(FetchError::Render { step, detail, .. }) => {
                assert_eq!(step, RenderStep::Session);
                assert_eq!(detail, "deadline exceeded");
            }
            other => panic!("expected session timeout, got {other:?}"),
        }
        assert!(t0.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_dropped_render_still_closes_session() {
        let driver = Driver {
            never_visible: true,
            ..Driver::default()
        };
        let endpoint = serve(driver_router(driver.clone())).await;

        let fetcher = RenderedFetcher::new(&endpoint, Duration::from_secs(30)).unwrap();
        let cancelled = timeout(Duration::from_millis(400), fetcher.render(&target(), "#container")).await;
        assert!(cancelled.is_err());

        wait_for_delete(&driver.deleted).await;
        assert_eq!(driver.deleted.load(Ordering::SeqCst), 1);
    }
}

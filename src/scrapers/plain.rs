//! Plain HTTP GET fetcher.
//!
//! One bounded attempt per call: the timeout is set on the `reqwest` client,
//! so an expired request is aborted at the transport rather than abandoned.
//! Only HTTP 200 counts as success.

use super::{Fetch, SourceContent};
use crate::error::{Error, FetchError, Result};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use url::Url;

/// User-Agent sent with every outbound request.
pub const USER_AGENT: &str = concat!("trends_summary/", env!("CARGO_PKG_VERSION"));

/// Timeout used for static pages, feeds and trending pages.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PlainFetcher {
    client: Client,
    timeout: Duration,
}

impl PlainFetcher {
    /// Build a fetcher whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// GET `url` and return the decoded body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Status`] for any status other than 200
    /// - [`FetchError::Timeout`] when the request exceeds the timeout
    /// - [`FetchError::Transport`] for connection or body-read failures
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), self.timeout, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Source responded with non-200 status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), self.timeout, e))?;

        info!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched source"
        );
        Ok(body)
    }
}

impl Fetch for PlainFetcher {
    async fn fetch(&self, url: &Url) -> Result<SourceContent> {
        Ok(SourceContent::Markup(self.get_text(url).await?))
    }
}

//! Generative-language API client.
//!
//! This module talks to the Gemini `generateContent` endpoint. A prompt goes
//! out as a single-turn request holding exactly one text part; the reply's
//! first candidate is flattened back into a string.
//!
//! # Architecture
//!
//! - [`Summarize`]: the async capability the pipeline depends on
//! - [`GeminiClient`]: the HTTP implementation, one bounded attempt per call
//! - [`first_candidate_text`]: pure extraction over the decoded response,
//!   independent of the transport
//!
//! # Failure Modes
//!
//! | Situation | Error |
//! |-----------|-------|
//! | No API key configured | [`Error::Configuration`] |
//! | Connection failure or timeout | [`SummarizeError::Transport`] |
//! | Non-200 upstream status | [`SummarizeError::Status`] with the body |
//! | Body is not the expected JSON | [`SummarizeError::Malformed`] |
//! | Zero candidates, or zero parts | [`SummarizeError::EmptyResponse`] |
//!
//! Nothing is retried. Token usage and `finishReason` are logged, not returned.

use crate::error::{Error, Result, SummarizeError};
use crate::utils::truncate_for_log;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Default API root.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default model name.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Upper bound on one `generateContent` call.
pub const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Async text-in, text-out summarization.
///
/// Implementors take a fully built prompt and return the generated text.
#[allow(async_fn_in_trait)]
pub trait Summarize {
    async fn summarize(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn single_turn(text: &'a str) -> Self {
        Self {
            contents: [RequestContent {
                parts: [RequestPart { text }],
            }],
        }
    }
}

/// Decoded `generateContent` response. Every field is optional upstream.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<u64>,
    #[serde(default)]
    pub candidates_token_count: Option<u64>,
    #[serde(default)]
    pub total_token_count: Option<u64>,
}

/// Text of the first candidate, its parts concatenated in order.
///
/// # Errors
///
/// [`SummarizeError::EmptyResponse`] when there is no candidate, the first
/// candidate has no content parts, or none of its parts carries text.
pub fn first_candidate_text(
    response: &GenerateContentResponse,
) -> Result<String, SummarizeError> {
    let parts = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();

    let mut texts = parts.iter().filter_map(|p| p.text.as_deref()).peekable();
    if texts.peek().is_none() {
        return Err(SummarizeError::EmptyResponse);
    }
    Ok(texts.collect())
}

/// HTTP client for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    /// `api_key` is checked on each call so the rest of the service can run
    /// without one.
    pub fn new(api_key: Option<String>, endpoint: &str, model: &str) -> Result<Self> {
        Self::with_timeout(api_key, endpoint, model, SUMMARIZE_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: Option<String>,
        endpoint: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }
}

impl Summarize for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model, prompt_bytes = prompt.len()))]
    async fn summarize(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::missing_config("GEMINI_API_KEY"))?;

        let t0 = Instant::now();
        let response = self
            .http
            .post(self.generate_url())
            .query(&[("key", api_key)])
            .json(&GenerateContentRequest::single_turn(prompt))
            .send()
            .await
            .map_err(|e| {
                // Strip the URL so the key never reaches a log line.
                let e = e.without_url();
                warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "Summarization request failed");
                SummarizeError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SummarizeError::Transport(e.without_url().to_string()))?;

        if status != StatusCode::OK {
            error!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, 500),
                "Summarization service returned an error"
            );
            return Err(SummarizeError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let decoded: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, body = %truncate_for_log(&body, 500), "Unreadable summarization response");
            SummarizeError::Malformed(e.to_string())
        })?;

        let finish_reason = decoded
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("unknown");
        let usage = decoded.usage_metadata.as_ref();
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            candidates = decoded.candidates.len(),
            finish_reason,
            prompt_tokens = usage.and_then(|u| u.prompt_token_count),
            candidate_tokens = usage.and_then(|u| u.candidates_token_count),
            total_tokens = usage.and_then(|u| u.total_token_count),
            "Summarization finished"
        );

        Ok(first_candidate_text(&decoded)?)
    }
}

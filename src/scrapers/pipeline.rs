//! Fetch, extract, prompt, summarize.
//!
//! Each step runs strictly after the previous one and the first failure
//! stops the run. Caller input (URL and selectors) is validated before any
//! network access.

use super::extract::{NamedSelector, extract};
use super::{Fetch, SourceContent};
use crate::api::Summarize;
use crate::error::Result;
use crate::utils::parse_source_url;
use scraper::Html;
use std::fmt;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Instruction text followed by the content it applies to.
///
/// Built once and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(instruction: &str, body: &str) -> Self {
        Prompt(format!("{}\n\n{}", instruction.trim_end(), body))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fetch `raw_url` through `source` and return the delimited extraction text.
///
/// Markup is narrowed by `selectors`; text content (from the repository API)
/// is returned unchanged. A result with no matches at all is still `Ok`.
///
/// # Errors
///
/// - [`Error::InvalidInput`](crate::error::Error::InvalidInput) for an empty
///   or malformed URL or selector, before anything is fetched
/// - whatever `source` fails with; nothing after the fetch runs
#[instrument(level = "info", skip_all, fields(url = %raw_url, selectors = selectors.len()))]
pub async fn extract_from_url<F, S>(source: &F, raw_url: &str, selectors: &[S]) -> Result<String>
where
    F: Fetch,
    S: AsRef<str>,
{
    let url = parse_source_url(raw_url)?;
    let selectors = NamedSelector::parse_all(selectors)?;

    let markup = match source.fetch(&url).await? {
        SourceContent::Text(text) => return Ok(text),
        SourceContent::Markup(markup) => markup,
    };

    let document = Html::parse_document(&markup);
    let result = extract(&document, &selectors);
    if result.is_empty() {
        warn!("No selector matched any element");
    } else {
        info!(matches = result.match_count(), "Extracted fragments");
    }
    Ok(result.to_string())
}

/// Run [`extract_from_url`], prefix `instruction`, and summarize.
#[instrument(level = "info", skip_all, fields(url = %raw_url))]
pub async fn summarize_url<F, M, S>(
    source: &F,
    summarizer: &M,
    raw_url: &str,
    selectors: &[S],
    instruction: &str,
) -> Result<String>
where
    F: Fetch,
    M: Summarize,
    S: AsRef<str>,
{
    let t0 = Instant::now();
    let extracted = extract_from_url(source, raw_url, selectors).await?;
    let summary = summarize_text(summarizer, instruction, &extracted).await?;
    info!(
        elapsed_ms_total = t0.elapsed().as_millis() as u64,
        summary_bytes = summary.len(),
        "Summarized source"
    );
    Ok(summary)
}

/// Summarize caller-assembled text with `instruction` in front.
pub async fn summarize_text<M: Summarize>(
    summarizer: &M,
    instruction: &str,
    body: &str,
) -> Result<String> {
    let prompt = Prompt::new(instruction, body);
    summarizer.summarize(prompt.as_str()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, FetchError, SummarizeError};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    enum Reply {
        Markup(&'static str),
        Text(&'static str),
        Status(u16),
    }

    struct StubSource {
        calls: AtomicUsize,
        reply: Reply,
    }

    impl StubSource {
        fn new(reply: Reply) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
            }
        }
    }

    impl Fetch for StubSource {
        async fn fetch(&self, url: &Url) -> Result<SourceContent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Markup(m) => Ok(SourceContent::Markup(m.to_string())),
                Reply::Text(t) => Ok(SourceContent::Text(t.to_string())),
                Reply::Status(status) => Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                }
                .into()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSummarizer {
        prompts: Mutex<Vec<String>>,
    }

    impl Summarize for RecordingSummarizer {
        async fn summarize(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("summary".to_string())
        }
    }

    const ARTICLE: &str = r#"<html><body><div class="article__data"><p>Body text</p></div></body></html>"#;

    #[tokio::test]
    async fn test_invalid_url_makes_no_fetch() {
        let source = StubSource::new(Reply::Markup(ARTICLE));
        for raw in ["not-a-url", "", "ftp://example.com/file"] {
            let err = extract_from_url(&source, raw, &["div"]).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{raw}: {err:?}");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_selector_makes_no_fetch() {
        let source = StubSource::new(Reply::Markup(ARTICLE));
        let err = extract_from_url(&source, "https://example.com/a", &["div[[broken"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extracts_selected_markup() {
        let source = StubSource::new(Reply::Markup(ARTICLE));
        let text = extract_from_url(&source, "https://example.com/a", &["div.article__data"])
            .await
            .unwrap();
        assert!(text.contains("=== div.article__data #1 ===\n<p>Body text</p>"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_matches_is_ok() {
        let source = StubSource::new(Reply::Markup("<html><body></body></html>"));
        let text = extract_from_url(&source, "https://example.com/a", &["div.a", "div.b"])
            .await
            .unwrap();
        assert_eq!(text.matches("=== div.").count(), 2);
    }

    #[tokio::test]
    async fn test_text_content_bypasses_selectors() {
        let source = StubSource::new(Reply::Text("name: tokio-rs/tokio"));
        let text = extract_from_url(&source, "https://github.com/tokio-rs/tokio", &["div.a"])
            .await
            .unwrap();
        assert_eq!(text, "name: tokio-rs/tokio");
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_before_summarize() {
        let source = StubSource::new(Reply::Status(404));
        let summarizer = RecordingSummarizer::default();
        let err = summarize_url(&source, &summarizer, "https://example.com/gone", &["div"], "Summarize.")
            .await
            .unwrap_err();
        match err {
            Error::Fetch(fetch) => assert_eq!(fetch.status(), Some(404)),
            other => panic!("expected fetch error, got {other:?}"),
        }
        assert!(summarizer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_is_instruction_then_extraction() {
        let source = StubSource::new(Reply::Markup(ARTICLE));
        let summarizer = RecordingSummarizer::default();
        let summary = summarize_url(
            &source,
            &summarizer,
            "https://example.com/a",
            &["div.article__data"],
            "Summarize the article.\n",
        )
        .await
        .unwrap();
        assert_eq!(summary, "summary");

        let prompts = summarizer.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Summarize the article.\n\n=== div.article__data ===\n"));
        assert!(prompts[0].contains("<p>Body text</p>"));
    }

    #[tokio::test]
    async fn test_summarizer_errors_propagate() {
        struct Empty;
        impl Summarize for Empty {
            async fn summarize(&self, _prompt: &str) -> Result<String> {
                Err(SummarizeError::EmptyResponse.into())
            }
        }

        let err = summarize_text(&Empty, "Summarize.", "body").await.unwrap_err();
        assert!(matches!(err, Error::Summarize(SummarizeError::EmptyResponse)));
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = Prompt::new("Do this.  \n", "content");
        assert_eq!(prompt.as_str(), "Do this.\n\ncontent");
        assert_eq!(prompt.to_string(), prompt.as_str());
    }
}

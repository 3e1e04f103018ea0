//! Source fetching and content extraction.
//!
//! Every external source satisfies one contract, [`Fetch`]: given a URL,
//! return its content or a typed failure. The implementations differ only in
//! how the content is obtained.
//!
//! # Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Static pages, feeds | [`plain`] | HTTP GET | Only HTTP 200 counts as success |
//! | Script-rendered pages | [`rendered`] | WebDriver | Waits for a container to be displayed |
//! | Repositories | [`github`] | REST API | Metadata plus decoded README |
//!
//! Content comes back as [`SourceContent`]: markup still to be run through
//! the [`extract`] step, or text ready to be prompted as-is.
//!
//! The remaining modules parse specific document shapes: [`feed`] for
//! RSS/Atom and [`trending`] for the trending repositories page.
//! [`pipeline`] composes fetching, extraction and summarization.

pub mod extract;
pub mod feed;
pub mod github;
pub mod pipeline;
pub mod plain;
pub mod rendered;
pub mod trending;

use crate::error::Result;
use github::RepositoryClient;
use plain::PlainFetcher;
use rendered::RenderedSource;
use url::Url;

/// What a source handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
    /// Markup to be parsed and narrowed by selectors.
    Markup(String),
    /// Already-assembled text; selectors do not apply.
    Text(String),
}

/// Retrieve the content behind a URL in a single bounded attempt.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, url: &Url) -> Result<SourceContent>;
}

/// A configured source, chosen per summary profile.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    Plain(&'a PlainFetcher),
    Rendered(RenderedSource<'a>),
    Repository(&'a RepositoryClient),
}

impl Fetch for Source<'_> {
    async fn fetch(&self, url: &Url) -> Result<SourceContent> {
        match self {
            Source::Plain(fetcher) => fetcher.fetch(url).await,
            Source::Rendered(source) => source.fetch(url).await,
            Source::Repository(client) => client.fetch(url).await,
        }
    }
}

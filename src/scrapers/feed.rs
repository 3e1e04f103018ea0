//! RSS 2.0 and Atom feed parsing.
//!
//! `feed-rs` normalises both dialects (and RSS 1.0 / JSON Feed) into one
//! model and keeps namespaced extensions such as `media:` or `dc:` apart from
//! the core elements. That model is then flattened into [`Feed`].

use crate::error::{Error, Result};
use crate::models::{Feed, FeedItem};
use chrono::{DateTime, SecondsFormat, Utc};
use feed_rs::model::{Entry, Link, Text};
use tracing::{debug, instrument};

/// Parse an RSS 2.0 or Atom document.
///
/// # Errors
///
/// [`Error::Parse`] when the document is not a feed or is not well-formed XML.
#[instrument(level = "debug", skip_all, fields(bytes = xml.len()))]
pub fn parse_feed(xml: &str) -> Result<Feed> {
    let parsed = feed_rs::parser::parse(xml.as_bytes()).map_err(|e| Error::Parse {
        what: "feed",
        detail: e.to_string(),
    })?;

    let feed = Feed {
        title: text(parsed.title.as_ref()),
        description: text(parsed.description.as_ref()),
        items: parsed.entries.iter().map(item).collect(),
    };
    debug!(items = feed.items.len(), title = %feed.title, "Parsed feed");
    Ok(feed)
}

fn text(value: Option<&Text>) -> String {
    value.map(|t| t.content.trim().to_string()).unwrap_or_default()
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Prefer rel="alternate" (or no rel), fall back to any href.
fn primary_link(links: &[Link]) -> String {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default()
}

fn item(entry: &Entry) -> FeedItem {
    let description = match &entry.summary {
        Some(summary) => summary.content.trim().to_string(),
        None => entry
            .content
            .as_ref()
            .and_then(|c| c.body.as_deref())
            .map(|body| body.trim().to_string())
            .unwrap_or_default(),
    };

    FeedItem {
        title: text(entry.title.as_ref()),
        link: primary_link(&entry.links),
        published: timestamp(entry.published.or(entry.updated)),
        description,
    }
}

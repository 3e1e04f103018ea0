//! Data models exchanged with clients.
//!
//! - [`Feed`] / [`FeedItem`]: a parsed syndication feed
//! - [`TrendingRepository`]: one row of a trending-repositories page
//! - Request and response bodies for the login and summary endpoints

use serde::{Deserialize, Serialize};

/// A parsed RSS or Atom feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub title: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

/// A single feed entry, in feed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Publication (or last update) time as RFC 3339 UTC; empty when the feed gives none.
    pub published: String,
    /// Entry description; may contain HTML.
    pub description: String,
}

/// A repository listed on a trending page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingRepository {
    /// `owner / repo`
    pub name: String,
    /// Absolute repository URL.
    pub url: String,
    pub description: String,
    pub language: String,
    /// Star count as displayed, e.g. `"12,345"`.
    pub stars: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// Query string for endpoints that act on one source URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceQuery {
    #[serde(default)]
    pub url: Option<String>,
}

/// Body of a trends summary request: the news items the client is showing.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendsRequest {
    #[serde(default)]
    pub items: Vec<TrendItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendItem {
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
}

//! Runtime settings and the source catalog.
//!
//! [`Settings`] is resolved once at startup from the [`Cli`] (flags, then
//! environment, then `.env`). Empty values are treated as unset. Only the
//! signing secret and a valid catalog are required to start; every other
//! secret is checked by the component that needs it, on first use.
//!
//! The [`SourceCatalog`] lists the feeds, trending pages, rendered pages and
//! summary profiles the server knows about. A built-in catalog is compiled
//! in from `sources.yaml`; `--sources` replaces it wholesale.

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::scrapers::extract::NamedSelector;
use crate::utils::parse_source_url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{info, warn};

const BUILTIN_CATALOG: &str = include_str!("../sources.yaml");

/// How a summary profile obtains its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Plain,
    Rendered,
    Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSource {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingSource {
    pub url: String,
}

/// A page that needs a browser, and the element to wait for.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderedPage {
    pub url: String,
    pub wait_for: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryProfile {
    pub via: SourceKind,
    #[serde(default)]
    pub selectors: Vec<String>,
    /// Container to wait for; required when `via` is `rendered`.
    #[serde(default)]
    pub wait_for: Option<String>,
    pub instruction: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendsProfile {
    pub instruction: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryProfiles {
    pub article: SummaryProfile,
    pub repository: SummaryProfile,
    pub trends: TrendsProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceCatalog {
    #[serde(default)]
    pub feeds: BTreeMap<String, FeedSource>,
    #[serde(default)]
    pub trending: BTreeMap<String, TrendingSource>,
    #[serde(default)]
    pub pages: BTreeMap<String, RenderedPage>,
    pub summaries: SummaryProfiles,
}

impl SourceCatalog {
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read source catalog {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a catalog document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let catalog: SourceCatalog = serde_yaml::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid source catalog: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Every URL must be absolute http(s) and every selector must parse.
    pub fn validate(&self) -> Result<()> {
        let urls = self
            .feeds
            .iter()
            .map(|(name, f)| (name, &f.url))
            .chain(self.trending.iter().map(|(name, t)| (name, &t.url)))
            .chain(self.pages.iter().map(|(name, p)| (name, &p.url)));
        for (name, url) in urls {
            parse_source_url(url).map_err(|e| catalog_error(name, e))?;
        }

        for (name, page) in &self.pages {
            NamedSelector::parse(&page.wait_for).map_err(|e| catalog_error(name, e))?;
        }

        for (name, profile) in [
            ("summaries.article", &self.summaries.article),
            ("summaries.repository", &self.summaries.repository),
        ] {
            NamedSelector::parse_all(&profile.selectors).map_err(|e| catalog_error(name, e))?;
            match (profile.via, profile.wait_for.as_deref()) {
                (SourceKind::Rendered, None) => {
                    return Err(Error::Configuration(format!(
                        "{name}: rendered profiles need wait_for"
                    )));
                }
                (_, Some(wait_for)) => {
                    NamedSelector::parse(wait_for).map_err(|e| catalog_error(name, e))?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn catalog_error(name: &str, e: Error) -> Error {
    Error::Configuration(format!("source catalog entry {name}: {e}"))
}

/// Everything the server needs, resolved at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    pub credentials: Option<(String, String)>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub github_token: Option<String>,
    pub github_api: String,
    pub webdriver_url: String,
    pub catalog: SourceCatalog,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Resolve settings from parsed arguments.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when `JWT_SECRET` is unset or the source
    /// catalog cannot be read or validated.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let jwt_secret = non_empty(cli.jwt_secret).ok_or_else(|| Error::missing_config("JWT_SECRET"))?;

        let credentials = match (non_empty(cli.auth_username), non_empty(cli.auth_password)) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (None, None) => {
                warn!("AUTH_USERNAME and AUTH_PASSWORD are not set; login is disabled");
                None
            }
            _ => {
                warn!("Only one of AUTH_USERNAME and AUTH_PASSWORD is set; login is disabled");
                None
            }
        };

        let gemini_api_key = non_empty(cli.gemini_api_key);
        if gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY is not set; summaries are disabled");
        }
        let github_token = non_empty(cli.github_token);
        if github_token.is_none() {
            warn!("GITHUB_TOKEN is not set; repository summaries are disabled");
        }

        let catalog = match &cli.sources {
            Some(path) => {
                info!(path = %path.display(), "Loading source catalog");
                SourceCatalog::load(path)?
            }
            None => SourceCatalog::builtin()?,
        };
        info!(
            feeds = catalog.feeds.len(),
            trending = catalog.trending.len(),
            pages = catalog.pages.len(),
            "Source catalog ready"
        );

        Ok(Self {
            bind: cli.bind,
            jwt_secret,
            credentials,
            gemini_api_key,
            gemini_model: cli.gemini_model,
            gemini_endpoint: cli.gemini_endpoint,
            github_token,
            github_api: cli.github_api,
            webdriver_url: cli.webdriver_url,
            catalog,
        })
    }
}

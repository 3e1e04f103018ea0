//! Code-hosting REST API source.
//!
//! Turns a repository page URL (`https://github.com/<owner>/<repo>/...`) into
//! plain text built from the repository metadata and its decoded README.

use super::{Fetch, SourceContent};
use crate::error::{Error, FetchError, Result};
use crate::utils::decode_base64_text;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

/// Default API root.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Timeout for each API call.
pub const API_TIMEOUT: Duration = Duration::from_secs(10);

const API_VERSION: &str = "2022-11-28";

static REPOSITORY_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?(?:/.*)?$").unwrap());

/// Owner and name of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    /// Extract `owner/name` from a repository page URL.
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url.host_str().unwrap_or_default();
        if host != "github.com" && host != "www.github.com" {
            return Err(Error::invalid(format!("{url} is not a github.com repository URL")));
        }
        let caps = REPOSITORY_PATH
            .captures(url.path())
            .ok_or_else(|| Error::invalid(format!("{url} does not name a repository")))?;
        Ok(Self {
            owner: caps[1].to_string(),
            name: caps[2].to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryMetadata {
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReadmePayload {
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RepositoryClient {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl RepositoryClient {
    /// `token` is checked on first use, not here.
    pub fn new(api_base: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(super::plain::USER_AGENT)
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::missing_config("GITHUB_TOKEN"))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token()?))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, API_TIMEOUT, e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            status => {
                warn!(%url, status = status.as_u16(), "Code-hosting API call failed");
                return Err(FetchError::Status {
                    url,
                    status: status.as_u16(),
                }
                .into());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, API_TIMEOUT, e))?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| Error::Parse {
                what: "code-hosting API response",
                detail: e.to_string(),
            })
    }

    /// Fetch metadata and README for `repo` and render them as prompt text.
    ///
    /// A repository that does not exist is a [`FetchError::Status`] 404; a
    /// repository without a README yields metadata only.
    #[instrument(level = "info", skip_all, fields(owner = %repo.owner, repo = %repo.name))]
    pub async fn describe(&self, repo: &RepositoryRef) -> Result<String> {
        let base = format!(
            "/repos/{}/{}",
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        );

        let metadata: RepositoryMetadata =
            self.get_json(&base).await?.ok_or_else(|| FetchError::Status {
                url: format!("{}{base}", self.api_base),
                status: 404,
            })?;

        let readme = match self.get_json::<ReadmePayload>(&format!("{base}/readme")).await? {
            Some(payload) => Some(decode_readme(payload)?),
            None => {
                info!("Repository has no README");
                None
            }
        };

        let text = render_repository(&metadata, readme.as_deref());
        info!(bytes = text.len(), "Described repository");
        Ok(text)
    }
}

fn decode_readme(payload: ReadmePayload) -> Result<String> {
    match payload.encoding.as_deref() {
        None | Some("base64") => decode_base64_text(&payload.content),
        Some("utf-8") | Some("none") => Ok(payload.content),
        Some(other) => Err(Error::Parse {
            what: "README",
            detail: format!("unsupported encoding {other}"),
        }),
    }
}

fn render_repository(metadata: &RepositoryMetadata, readme: Option<&str>) -> String {
    let description = metadata.description.as_deref().unwrap_or_default();
    let topics = metadata.topics.iter().join(", ");
    format!(
        "=== Repository ===\nname: {}\ndescription: {}\ntopics: {}\n\n=== README ===\n{}\n",
        metadata.full_name,
        description,
        topics,
        readme.unwrap_or("(no README)")
    )
}

impl Fetch for RepositoryClient {
    async fn fetch(&self, url: &Url) -> Result<SourceContent> {
        let repo = RepositoryRef::from_url(url)?;
        Ok(SourceContent::Text(self.describe(&repo).await?))
    }
}

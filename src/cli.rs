//! Command-line interface definitions for Trends Summary.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also be provided through an environment variable, and a
//! `.env` file in the working directory is loaded before parsing.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command-line arguments for the Trends Summary server.
///
/// Only `JWT_SECRET` is required to start. The other secrets gate single
/// capabilities and are checked when those are used.
///
/// # Examples
///
/// ```sh
/// # Minimal start, login and summaries disabled
/// JWT_SECRET=change-me trends_summary
///
/// # Everything enabled, custom catalog
/// trends_summary --bind 127.0.0.1:3000 --sources ./sources.yaml \
///     --jwt-secret change-me --gemini-api-key KEY \
///     --auth-username admin --auth-password secret --github-token ghp_xxx
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Optional path to a YAML source catalog (replaces the built-in one)
    #[arg(short, long, env = "SOURCES_FILE")]
    pub sources: Option<PathBuf>,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Username accepted at login
    #[arg(long, env = "AUTH_USERNAME")]
    pub auth_username: Option<String>,

    /// Password accepted at login
    #[arg(long, env = "AUTH_PASSWORD", hide_env_values = true)]
    pub auth_password: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = crate::api::DEFAULT_MODEL)]
    pub gemini_model: String,

    /// Gemini API root
    #[arg(long, env = "GEMINI_ENDPOINT", default_value = crate::api::DEFAULT_ENDPOINT)]
    pub gemini_endpoint: String,

    /// GitHub token for repository summaries
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub REST API root
    #[arg(long, env = "GITHUB_API", default_value = crate::scrapers::github::DEFAULT_API_BASE)]
    pub github_api: String,

    /// WebDriver endpoint (e.g. chromedriver) for rendered pages
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    pub webdriver_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["trends_summary"]).unwrap();

        assert_eq!(cli.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cli.gemini_model, "gemini-1.5-flash");
        assert_eq!(cli.webdriver_url, "http://localhost:9515");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "trends_summary",
            "--bind",
            "127.0.0.1:3000",
            "--sources",
            "/etc/trends/sources.yaml",
            "--jwt-secret",
            "s3cret",
            "--auth-username",
            "admin",
            "--auth-password",
            "secret",
        ])
        .unwrap();

        assert_eq!(cli.bind.port(), 3000);
        assert_eq!(cli.sources, Some(PathBuf::from("/etc/trends/sources.yaml")));
        assert_eq!(cli.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(cli.auth_username.as_deref(), Some("admin"));
        assert_eq!(cli.auth_password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::try_parse_from(["trends_summary", "-b", "[::1]:9000", "-s", "./s.yaml"]).unwrap();

        assert!(cli.bind.is_ipv6());
        assert_eq!(cli.sources, Some(PathBuf::from("./s.yaml")));
    }

    #[test]
    fn test_cli_rejects_bad_address() {
        assert!(Cli::try_parse_from(["trends_summary", "--bind", "not-an-address"]).is_err());
    }
}

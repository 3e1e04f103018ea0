//! # Trends Summary
//!
//! A small HTTP service that gathers technology-news signals and summarizes
//! them with a generative-language API, behind a cookie session.
//!
//! ## Features
//!
//! - Reads RSS and Atom feeds (InfoQ, Golang Weekly, Google Cloud, AWS, Azure)
//! - Scrapes the trending repositories page
//! - Renders script-heavy pages (the TIOBE index) through a WebDriver endpoint
//! - Summarizes an article, a repository or a list of news items with Gemini
//! - Guards everything but login/logout with a signed `auth_token` cookie
//!
//! ## Usage
//!
//! ```sh
//! JWT_SECRET=change-me GEMINI_API_KEY=... AUTH_USERNAME=admin AUTH_PASSWORD=secret \
//!     trends_summary --bind 0.0.0.0:8080
//! ```
//!
//! ## Architecture
//!
//! Each summary request runs one sequential pipeline:
//! 1. **Fetch**: plain GET, browser render, or repository API ([`scrapers`])
//! 2. **Extract**: narrow markup to the configured selectors
//! 3. **Prompt**: prepend the profile's instruction
//! 4. **Summarize**: one `generateContent` call ([`api`])

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod scrapers;
mod server;
mod session;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::Settings;
use server::AppState;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Environment ---
    // A missing .env is normal outside development.
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "trends_summary starting up");
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    // Parse CLI
    let args = Cli::parse();

    // The only place a configuration problem stops the process.
    let settings = Settings::from_cli(args).inspect_err(|e| {
        error!(error = %e, "Invalid configuration; refusing to start");
    })?;

    let state = Arc::new(AppState::from_settings(&settings)?);
    let app = server::router(state);

    let listener = TcpListener::bind(settings.bind).await.inspect_err(|e| {
        error!(addr = %settings.bind, error = %e, "Cannot bind listen address");
    })?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received; draining connections"),
        Err(e) => error!(error = %e, "Cannot listen for Ctrl-C; shutting down"),
    }
}

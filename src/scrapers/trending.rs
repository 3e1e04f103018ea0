//! Trending repositories page scraper.
//!
//! Each repository is an `article.Box-row`; the name link lives in the `h2`,
//! the description in the first `p`, the language in
//! `[itemprop='programmingLanguage']` and the star count in the first
//! `a.Link--muted`.

use crate::models::TrendingRepository;
use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument};

/// Base for the relative repository links on the trending page.
const REPOSITORY_BASE: &str = "https://github.com";

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("article.Box-row").unwrap());
static NAME_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("h2 a").unwrap());
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static LANGUAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[itemprop='programmingLanguage']").unwrap());
static STARS: Lazy<Selector> = Lazy::new(|| Selector::parse("a.Link--muted").unwrap());

fn first_text(row: &ElementRef<'_>, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

/// Parse a trending page into repositories, in page order.
///
/// Rows without a name link are skipped. A page with no rows yields an empty
/// list.
#[instrument(level = "info", skip_all, fields(bytes = html.len()))]
pub fn parse_trending(html: &str) -> Vec<TrendingRepository> {
    let document = Html::parse_document(html);

    let repositories: Vec<TrendingRepository> = document
        .select(&ROW)
        .filter_map(|row| {
            let anchor = row.select(&NAME_LINK).next()?;
            let href = anchor.value().attr("href")?.trim();
            Some(TrendingRepository {
                name: collapse_whitespace(&anchor.text().collect::<String>()),
                url: format!("{REPOSITORY_BASE}{href}"),
                description: first_text(&row, &DESCRIPTION),
                language: first_text(&row, &LANGUAGE),
                stars: first_text(&row, &STARS),
            })
        })
        .collect();

    info!(count = repositories.len(), "Parsed trending repositories");
    repositories
}

//! Selector-based extraction of markup fragments.
//!
//! Given a parsed document and an ordered list of CSS selectors, produce one
//! section per selector holding the inner markup of every match in document
//! order. A selector that matches nothing still produces its section header,
//! so the rendered text always has exactly one header per selector.
//!
//! # Rendered layout
//!
//! ```text
//! === div.a ===
//! === div.a #1 ===
//! <p>first match</p>
//!
//! === div.a #2 ===
//! <p>second match</p>
//!
//!
//! === div.b ===
//!
//! ```

use crate::error::{Error, Result};
use scraper::{Html, Selector};
use std::fmt;

/// A CSS selector together with the text it was parsed from.
#[derive(Debug, Clone)]
pub struct NamedSelector {
    source: String,
    selector: Selector,
}

impl NamedSelector {
    /// Parse one selector. Malformed syntax is [`Error::InvalidInput`].
    pub fn parse(source: &str) -> Result<Self> {
        let selector = Selector::parse(source)
            .map_err(|e| Error::invalid(format!("selector {source:?} is invalid: {e}")))?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }

    /// Parse a whole selector list, failing on the first malformed entry.
    pub fn parse_all<S: AsRef<str>>(sources: &[S]) -> Result<Vec<Self>> {
        sources.iter().map(|s| Self::parse(s.as_ref())).collect()
    }
}

/// The matches of one selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSection {
    pub selector: String,
    /// Inner markup of each match, in document order.
    pub fragments: Vec<String>,
}

/// Ordered, selector-tagged fragments pulled out of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub sections: Vec<SelectorSection>,
}

impl ExtractionResult {
    /// Total number of matched elements across all selectors.
    pub fn match_count(&self) -> usize {
        self.sections.iter().map(|s| s.fragments.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.match_count() == 0
    }
}

impl fmt::Display for ExtractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "=== {} ===", section.selector)?;
            for (index, fragment) in section.fragments.iter().enumerate() {
                write!(f, "=== {} #{} ===\n{}\n\n", section.selector, index + 1, fragment)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Run every selector against `document`.
///
/// Pure: the document is only read. Zero matches is not an error.
pub fn extract(document: &Html, selectors: &[NamedSelector]) -> ExtractionResult {
    let sections = selectors
        .iter()
        .map(|named| SelectorSection {
            selector: named.source.clone(),
            fragments: document
                .select(&named.selector)
                .map(|element| element.inner_html())
                .collect(),
        })
        .collect();
    ExtractionResult { sections }
}

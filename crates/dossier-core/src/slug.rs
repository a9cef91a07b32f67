//! # Slugs
//!
//! Human-readable unique keys derived from entity names.
//!
//! A slug is lowercase ASCII alphanumerics separated by single hyphens.
//! Deliverables reference entities through the same `Slug` type, so the
//! project join is an equality on this type rather than on loose strings.

use crate::DossierError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Derive a URL-safe slug from free text.
///
/// Lowercases, drops every character that is not `a-z`, `0-9`, whitespace or
/// `-`, then collapses whitespace and hyphen runs into one hyphen. Leading
/// and trailing separators are dropped, which makes the function idempotent.
#[must_use]
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_separator = false;

    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_separator = true;
        }
    }

    out
}

/// A normalized, non-empty slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Slugify `raw` and reject the result if nothing is left.
    pub fn new(raw: &str) -> Result<Self, DossierError> {
        let slug = slugify(raw);
        if slug.is_empty() {
            return Err(DossierError::Validation("Slug is required.".to_string()));
        }
        Ok(Self(slug))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = DossierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slug::new(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic_name() {
        assert_eq!(slugify("Barnett Family Partners"), "barnett-family-partners");
    }

    #[test]
    fn slugify_drops_punctuation_without_splitting() {
        assert_eq!(slugify("O'Neil & Sons, LLC"), "oneil-sons-llc");
        assert_eq!(slugify("a.b"), "ab");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Acme --  Fund   II "), "acme-fund-ii");
        assert_eq!(slugify("-leading and trailing-"), "leading-and-trailing");
    }

    #[test]
    fn slugify_non_ascii_is_dropped() {
        assert_eq!(slugify("Café Zürich"), "caf-zrich");
        assert_eq!(slugify("🏢"), "");
    }

    #[test]
    fn slug_new_rejects_empty() {
        assert!(Slug::new("   ").is_err());
        assert!(Slug::new("!!!").is_err());
        assert_eq!(Slug::new("Parker Street").unwrap().as_str(), "parker-street");
    }

    #[test]
    fn slug_deserialize_normalizes() {
        let slug: Slug = serde_json::from_str("\"SHS Lakeland\"").unwrap();
        assert_eq!(slug.as_str(), "shs-lakeland");
        assert!(serde_json::from_str::<Slug>("\"\"").is_err());
    }
}

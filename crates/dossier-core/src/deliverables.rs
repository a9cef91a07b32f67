//! # Deliverable Catalog
//!
//! Agent-produced artifacts (reports, decks, sites ...) and the feed filter
//! over them.
//!
//! The catalog is static data compiled into the binary. A deliverable's
//! `project` is a `Slug`, so linking a deliverable to an entity is an
//! equality on `Slug` rather than a comparison of free-form strings.

use crate::DossierError;
use crate::slug::Slug;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

/// JSON source of the built-in catalog.
const BUILTIN_CATALOG: &str = include_str!("../data/deliverables.json");

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// What kind of artifact a deliverable is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableType {
    Report,
    Presentation,
    Site,
    Dashboard,
    Design,
    Document,
    Tool,
    Dataset,
}

impl DeliverableType {
    pub const ALL: [DeliverableType; 8] = [
        DeliverableType::Report,
        DeliverableType::Presentation,
        DeliverableType::Site,
        DeliverableType::Dashboard,
        DeliverableType::Design,
        DeliverableType::Document,
        DeliverableType::Tool,
        DeliverableType::Dataset,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DeliverableType::Report => "report",
            DeliverableType::Presentation => "presentation",
            DeliverableType::Site => "site",
            DeliverableType::Dashboard => "dashboard",
            DeliverableType::Design => "design",
            DeliverableType::Document => "document",
            DeliverableType::Tool => "tool",
            DeliverableType::Dataset => "dataset",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DeliverableType::Report => "Report",
            DeliverableType::Presentation => "Deck",
            DeliverableType::Site => "Site",
            DeliverableType::Dashboard => "Dashboard",
            DeliverableType::Design => "Design",
            DeliverableType::Document => "Document",
            DeliverableType::Tool => "Tool",
            DeliverableType::Dataset => "Dataset",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            DeliverableType::Report => "📊",
            DeliverableType::Presentation => "📑",
            DeliverableType::Site => "🌐",
            DeliverableType::Dashboard => "📈",
            DeliverableType::Design => "🎨",
            DeliverableType::Document => "📝",
            DeliverableType::Tool => "🔧",
            DeliverableType::Dataset => "🗃️",
        }
    }
}

impl fmt::Display for DeliverableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliverableType {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeliverableType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| DossierError::Validation(format!("Unknown deliverable type: {}", s)))
    }
}

/// Publication state of a deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    Live,
    Draft,
    Archived,
}

impl DeliverableStatus {
    pub const ALL: [DeliverableStatus; 3] = [
        DeliverableStatus::Live,
        DeliverableStatus::Draft,
        DeliverableStatus::Archived,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DeliverableStatus::Live => "live",
            DeliverableStatus::Draft => "draft",
            DeliverableStatus::Archived => "archived",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DeliverableStatus::Live => "Live",
            DeliverableStatus::Draft => "Draft",
            DeliverableStatus::Archived => "Archived",
        }
    }
}

impl fmt::Display for DeliverableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliverableStatus {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeliverableStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| DossierError::Validation(format!("Unknown deliverable status: {}", s)))
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// An artifact produced by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub deliverable_type: DeliverableType,
    pub status: DeliverableStatus,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub description: String,
    /// Slug of the entity this deliverable belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Slug>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Deliverable {
    fn search_haystack(&self) -> String {
        format!("{} {}", self.name, self.description).to_lowercase()
    }
}

// =============================================================================
// FILTERS
// =============================================================================

/// Raw query-string shape; every value is optional text.
#[derive(Debug, Default, Deserialize)]
struct RawFilterQuery {
    agent: Option<String>,
    #[serde(rename = "type")]
    deliverable_type: Option<String>,
    project: Option<String>,
    search: Option<String>,
    status: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Feed filter. `None` means the criterion is inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverableFilters {
    pub agent: Option<String>,
    #[serde(rename = "type")]
    pub deliverable_type: Option<DeliverableType>,
    pub project: Option<Slug>,
    pub search: Option<String>,
    pub status: Option<DeliverableStatus>,
}

impl DeliverableFilters {
    /// Filter showing every deliverable of one project.
    #[must_use]
    pub fn for_project(project: Slug) -> Self {
        Self {
            project: Some(project),
            ..Self::default()
        }
    }

    /// Parse `agent`, `type`, `project`, `search` and `status` from a URL
    /// query string.
    ///
    /// Empty values are treated as absent. A `type` or `status` that names
    /// no known variant is dropped as well, so a stale link shows the
    /// unfiltered feed instead of an error.
    pub fn from_query(query: &str) -> Result<Self, DossierError> {
        let raw: RawFilterQuery = serde_urlencoded::from_str(query.trim_start_matches('?'))
            .map_err(|e| DossierError::Validation(format!("Invalid filter query: {}", e)))?;

        Ok(Self {
            agent: non_empty(raw.agent),
            deliverable_type: non_empty(raw.deliverable_type).and_then(|v| v.parse().ok()),
            project: non_empty(raw.project).and_then(|v| Slug::new(&v).ok()),
            search: non_empty(raw.search),
            status: non_empty(raw.status).and_then(|v| v.parse().ok()),
        })
    }

    /// Build the query string, omitting inactive criteria.
    pub fn to_query(&self) -> Result<String, DossierError> {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(agent) = self.agent.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("agent", agent.to_string()));
        }
        if let Some(t) = self.deliverable_type {
            pairs.push(("type", t.as_str().to_string()));
        }
        if let Some(project) = &self.project {
            pairs.push(("project", project.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        serde_urlencoded::to_string(&pairs)
            .map_err(|e| DossierError::SerializationError(e.to_string()))
    }

    /// True when no criterion is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agent.is_none()
            && self.deliverable_type.is_none()
            && self.project.is_none()
            && self.search.as_deref().is_none_or(|s| s.trim().is_empty())
            && self.status.is_none()
    }

    #[must_use]
    pub fn matches(&self, item: &Deliverable) -> bool {
        if self.agent.as_ref().is_some_and(|a| *a != item.agent_id) {
            return false;
        }
        if self.deliverable_type.is_some_and(|t| t != item.deliverable_type) {
            return false;
        }
        if self.project.is_some() && self.project != item.project {
            return false;
        }
        if self.status.is_some_and(|s| s != item.status) {
            return false;
        }
        let needle = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        needle.is_empty() || item.search_haystack().contains(&needle)
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// The set of known deliverables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverableCatalog {
    items: Vec<Deliverable>,
}

impl DeliverableCatalog {
    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self, DossierError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse a catalog from a JSON array of deliverables.
    pub fn from_json(json: &str) -> Result<Self, DossierError> {
        let items: Vec<Deliverable> = serde_json::from_str(json)
            .map_err(|e| DossierError::SerializationError(e.to_string()))?;
        Ok(Self { items })
    }

    #[must_use]
    pub fn new(items: Vec<Deliverable>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Matching deliverables, newest first.
    #[must_use]
    pub fn filter(&self, filters: &DeliverableFilters) -> Vec<&Deliverable> {
        let mut out: Vec<&Deliverable> = self.items.iter().filter(|d| filters.matches(d)).collect();
        out.sort_by_key(|d| Reverse(d.created_at));
        out
    }

    /// Every deliverable linked to `project`, newest first.
    #[must_use]
    pub fn for_project(&self, project: &Slug) -> Vec<&Deliverable> {
        self.filter(&DeliverableFilters::for_project(project.clone()))
    }

    /// Distinct projects in catalog order, with their display labels.
    #[must_use]
    pub fn projects(&self) -> Vec<(Slug, String)> {
        let mut out: Vec<(Slug, String)> = Vec::new();
        for item in &self.items {
            let Some(slug) = &item.project else { continue };
            let label = item
                .project_label
                .clone()
                .unwrap_or_else(|| slug.to_string());
            match out.iter_mut().find(|(s, _)| s == slug) {
                Some(entry) => entry.1 = label,
                None => out.push((slug.clone(), label)),
            }
        }
        out
    }

    /// "12 items" when nothing is filtered out, otherwise "3 of 12".
    #[must_use]
    pub fn count_label(&self, shown: usize) -> String {
        let total = self.items.len();
        if shown == total {
            format!("{} items", total)
        } else {
            format!("{} of {}", shown, total)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn catalog() -> DeliverableCatalog {
        DeliverableCatalog::builtin().expect("builtin catalog parses")
    }

    #[test]
    fn builtin_catalog_loads() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.count_label(10), "10 items");
        assert_eq!(catalog.count_label(3), "3 of 10");
    }

    #[test]
    fn results_are_newest_first() {
        let catalog = catalog();
        let all = catalog.filter(&DeliverableFilters::default());
        assert_eq!(all.len(), 10);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(all[0].id, "based-team-overview-v3");
    }

    #[test]
    fn project_join_is_by_slug() {
        let catalog = catalog();
        let slug = Slug::new("command-center").unwrap();
        let ids: Vec<_> = catalog.for_project(&slug).iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["command-center-v3", "email-triage-spec", "gamification-spec"]
        );
    }

    #[test]
    fn search_is_trimmed_and_case_insensitive() {
        let filters = DeliverableFilters {
            search: Some("  TRIAGE ".to_string()),
            ..DeliverableFilters::default()
        };
        let hits = catalog().filter(&filters).len();
        assert_eq!(hits, 1);
    }

    #[test]
    fn combined_filters_apply_together() {
        let filters = DeliverableFilters {
            agent: Some("ace".to_string()),
            status: Some(DeliverableStatus::Draft),
            ..DeliverableFilters::default()
        };
        let catalog = catalog();
        let hits = catalog.filter(&filters);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|d| d.agent_id == "ace"));
    }

    #[test]
    fn query_parse_and_build() {
        let filters =
            DeliverableFilters::from_query("?agent=ace&type=report&search=lake+land&status=").unwrap();
        assert_eq!(filters.agent.as_deref(), Some("ace"));
        assert_eq!(filters.deliverable_type, Some(DeliverableType::Report));
        assert_eq!(filters.search.as_deref(), Some("lake land"));
        assert_eq!(filters.status, None);
        assert_eq!(
            filters.to_query().unwrap(),
            "agent=ace&type=report&search=lake+land"
        );
    }

    #[test]
    fn unknown_query_values_are_dropped() {
        let filters = DeliverableFilters::from_query("type=podcast&status=gone").unwrap();
        assert!(filters.is_empty());
        assert_eq!(filters.to_query().unwrap(), "");
    }

    #[test]
    fn projects_are_distinct_in_catalog_order() {
        let projects = catalog().projects();
        let slugs: Vec<_> = projects.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(
            slugs,
            vec![
                "based-operations",
                "shs-lakeland",
                "parker-street",
                "mayfair",
                "command-center"
            ]
        );
        assert_eq!(projects[1].1, "SHS Lakeland");
    }
}

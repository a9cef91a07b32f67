//! # Entity Filter
//!
//! Pure client-side filtering of the fetched entity list.
//!
//! The filtered view is always re-derived from `(list, filter state)`. The
//! only stored derived state is `FilterMemo`, which caches one result keyed
//! on the list revision and the filter state.

use crate::{DossierError, Entity, EntityStatus, EntityType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Status criterion: one status, or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Watch,
    Inactive,
}

impl StatusFilter {
    #[must_use]
    pub fn matches(self, status: EntityStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == EntityStatus::Active,
            StatusFilter::Watch => status == EntityStatus::Watch,
            StatusFilter::Inactive => status == EntityStatus::Inactive,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Watch => "watch",
            StatusFilter::Inactive => "inactive",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "watch" => Ok(StatusFilter::Watch),
            "inactive" => Ok(StatusFilter::Inactive),
            other => Err(DossierError::Validation(format!(
                "Unknown status filter: {}",
                other
            ))),
        }
    }
}

/// Filter state for the entity list.
///
/// An empty `types` set means every type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EntityFilter {
    pub types: BTreeSet<EntityType>,
    pub status: StatusFilter,
    pub search: String,
}

impl EntityFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the type if absent, remove it if present.
    pub fn toggle_type(&mut self, entity_type: EntityType) {
        if !self.types.remove(&entity_type) {
            self.types.insert(entity_type);
        }
    }

    /// True when the entity satisfies every active criterion.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        let type_ok = self.types.is_empty() || self.types.contains(&entity.entity_type);
        let status_ok = self.status.matches(entity.status);
        let needle = self.search.to_lowercase();
        let search_ok = needle.is_empty() || entity.search_haystack().contains(&needle);
        type_ok && status_ok && search_ok
    }

    /// True when no criterion is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.status == StatusFilter::All && self.search.is_empty()
    }
}

/// Entities matching `filter`, in list order.
#[must_use]
pub fn filter_entities<'a>(entities: &'a [Entity], filter: &EntityFilter) -> Vec<&'a Entity> {
    entities.iter().filter(|e| filter.matches(e)).collect()
}

/// Single-slot cache of a filtered view.
///
/// Keyed on `(revision, filter)`. Bump the revision whenever the list is
/// replaced; a stale key forces recomputation.
#[derive(Debug, Default)]
pub struct FilterMemo {
    key: Option<(u64, EntityFilter)>,
    indices: Vec<usize>,
}

impl FilterMemo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indices into `entities` of the matching entries.
    pub fn get_or_compute(
        &mut self,
        revision: u64,
        entities: &[Entity],
        filter: &EntityFilter,
    ) -> &[usize] {
        let fresh = matches!(&self.key, Some((rev, f)) if *rev == revision && f == filter);
        if !fresh {
            self.indices = entities
                .iter()
                .enumerate()
                .filter(|(_, e)| filter.matches(e))
                .map(|(i, _)| i)
                .collect();
            self.key = Some((revision, filter.clone()));
        }
        &self.indices
    }

    /// Whether the next lookup with this key would be served from cache.
    #[must_use]
    pub fn is_cached(&self, revision: u64, filter: &EntityFilter) -> bool {
        matches!(&self.key, Some((rev, f)) if *rev == revision && f == filter)
    }
}

// =============================================================================
// TESTS
// =============================================================================

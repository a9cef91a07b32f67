//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use chrono::{DateTime, Utc};
use dossier_core::labels::{entity_type_label, status_marker};
use dossier_core::{
    Deliverable, DossierError, Entity, EntityDraft, EntityFilter, EntityId, EntityStatus,
    EntityType, KeyPerson, RelationshipId, RelationshipType, StatusFilter, UsageRow,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ERROR & ACK
// =============================================================================

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Acknowledgement for writes with nothing else to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl Default for OkResponse {
    fn default() -> Self {
        Self { ok: true }
    }
}

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `redb` or `memory`.
    pub storage: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(persistent: bool) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: if persistent { "redb" } else { "memory" }.to_string(),
        }
    }
}

// =============================================================================
// ENTITY LIST
// =============================================================================

/// Layout of the entity list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListView {
    /// Cards with description and tracking focus.
    #[default]
    Grid,
    /// Compact rows.
    List,
}

impl fmt::Display for ListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListView::Grid => "grid",
            ListView::List => "list",
        })
    }
}

impl FromStr for ListView {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "grid" => Ok(ListView::Grid),
            "list" => Ok(ListView::List),
            other => Err(DossierError::Validation(format!("Unknown view: {}", other))),
        }
    }
}

/// `GET /entities` query: `types=a,b&status=watch&search=fund&view=list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityListQuery {
    /// Comma-separated entity types; empty means all.
    pub types: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub view: Option<String>,
}

impl EntityListQuery {
    /// Parse into a filter and a layout. Unknown types, statuses or views
    /// are rejected.
    pub fn parse(&self) -> Result<(EntityFilter, ListView), DossierError> {
        let mut filter = EntityFilter::new();
        if let Some(types) = &self.types {
            for raw in types.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                filter.types.insert(raw.parse::<EntityType>()?);
            }
        }
        filter.status = match &self.status {
            Some(status) => status.parse::<StatusFilter>()?,
            None => StatusFilter::All,
        };
        filter.search = self.search.clone().unwrap_or_default();
        let view = match &self.view {
            Some(view) => view.parse()?,
            None => ListView::default(),
        };
        Ok((filter, view))
    }
}

/// One entity in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCard {
    pub id: EntityId,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub type_label: String,
    pub status: EntityStatus,
    pub status_marker: String,
    pub icon: Option<String>,
    pub relationship_count: usize,
    /// Grid view only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Grid view only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_focus: Option<Vec<String>>,
}

impl EntityCard {
    #[must_use]
    pub fn new(entity: &Entity, view: ListView) -> Self {
        let grid = view == ListView::Grid;
        Self {
            id: entity.id,
            slug: entity.slug.to_string(),
            name: entity.name.clone(),
            entity_type: entity.entity_type,
            type_label: entity_type_label(entity.entity_type).to_string(),
            status: entity.status,
            status_marker: status_marker(entity.status).to_string(),
            icon: entity.icon.clone(),
            relationship_count: entity.relationship_count(),
            description: if grid {
                entity.description.clone()
            } else {
                None
            },
            tracking_focus: grid.then(|| entity.tracking_focus.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityListResponse {
    pub view: ListView,
    /// Entities in the registry before filtering.
    pub total: usize,
    pub entities: Vec<EntityCard>,
    /// Last fetch or mutation error, shown inline.
    pub error: Option<String>,
}

// =============================================================================
// ENTITY WRITES
// =============================================================================

/// Body of `POST /entities` and `PUT /entities/{key}`.
///
/// On create, absent fields take the form defaults (type `person`, status
/// `active`) and the slug follows the name. On update, absent fields keep
/// their stored value; an empty string clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub full_name: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<EntityType>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub agent_instructions: Option<String>,
    pub financial_notes: Option<String>,
    pub tracking_focus: Option<Vec<String>>,
    pub key_people: Option<Vec<KeyPerson>>,
    pub status: Option<EntityStatus>,
}

impl EntityRequest {
    /// Fill a draft: a fresh one, or one pre-filled from `existing`.
    #[must_use]
    pub fn into_draft(self, existing: Option<&Entity>) -> EntityDraft {
        let mut draft = existing.map_or_else(EntityDraft::create, EntityDraft::edit);
        if let Some(name) = self.name {
            draft.set_name(name);
        }
        if let Some(slug) = self.slug {
            draft.set_slug(slug);
        }
        if let Some(entity_type) = self.entity_type {
            draft.entity_type = Some(entity_type);
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        if let Some(focus) = self.tracking_focus {
            draft.tracking_focus = focus.join("\n");
        }
        if let Some(people) = self.key_people {
            draft.key_people = people;
        }
        let text_fields = [
            (self.full_name, &mut draft.full_name),
            (self.icon, &mut draft.icon),
            (self.description, &mut draft.description),
            (self.agent_instructions, &mut draft.agent_instructions),
            (self.financial_notes, &mut draft.financial_notes),
        ];
        for (value, field) in text_fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        draft
    }
}

/// Result of a confirmed delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: EntityId,
    pub removed_relationships: usize,
}

/// `DELETE /entities/{key}?confirm=true`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// An entity addressed by numeric id or by slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Id(u64),
    Slug(String),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Id(id) => write!(f, "{}", id),
            EntityKey::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Body of `POST /entities/{key}/relationships`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipRequest {
    pub target: Option<EntityKey>,
    #[serde(default)]
    pub relationship_type: RelationshipType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipCreated {
    pub id: RelationshipId,
}

// =============================================================================
// DELIVERABLES
// =============================================================================

/// A project the feed can be narrowed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectOption {
    pub slug: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableListResponse {
    /// "12 items" or "3 of 12".
    pub count_label: String,
    pub items: Vec<Deliverable>,
    pub projects: Vec<ProjectOption>,
}

// =============================================================================
// AGENTS
// =============================================================================

/// `GET /api/agent-usage?agent=`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageQuery {
    pub agent: Option<String>,
}

/// Body of `POST /api/agent-usage`: one finished agent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecordRequest {
    #[serde(default)]
    pub agent_id: String,
    /// Run results; `tokens_in` and `tokens_out` are read from it.
    #[serde(default)]
    pub results: serde_json::Value,
    #[serde(default)]
    pub api_cost_micros: u64,
    /// Defaults to the time of the request.
    pub created_at: Option<DateTime<Utc>>,
}

impl UsageRecordRequest {
    #[must_use]
    pub fn into_row(self, now: DateTime<Utc>) -> UsageRow {
        UsageRow {
            agent: self.agent_id.trim().to_string(),
            results: self.results.to_string(),
            api_cost_micros: self.api_cost_micros,
            created_at: self.created_at.unwrap_or(now),
        }
    }
}

/// Body of `POST /api/heartbeats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
}

//! # Row Normalization
//!
//! Reads entity rows as the hosted backend exports them (each row carrying
//! its joined `outgoing` and `incoming` edges) and turns them into typed
//! payloads ready for a store.
//!
//! List columns (`key_people`, `tracking_focus`) are accepted in the two
//! shapes the backend driver is known to produce: a JSON array, or a string
//! holding a JSON array. `null` and empty strings become empty lists and a
//! missing `metadata` becomes `{}`. Any other shape is rejected with
//! `DossierError::MalformedRow` instead of being coerced.

use crate::primitives::MAX_IMPORT_ROWS;
use crate::slug::Slug;
use crate::store::EntityStore;
use crate::{
    DossierError, EntityId, EntityPayload, EntityStatus, EntityType, KeyPerson, Metadata,
    NewRelationship, RelationshipType,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RAW ROW SHAPES
// =============================================================================

/// Primary key as exported: uuid text or a bare integer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RowKey {
    Text(String),
    Number(u64),
}

impl RowKey {
    fn into_string(self) -> String {
        match self {
            RowKey::Text(s) => s,
            RowKey::Number(n) => n.to_string(),
        }
    }
}

/// A list column: either already parsed or still JSON-encoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ListColumn<T> {
    List(Vec<T>),
    Encoded(String),
}

#[derive(Debug, Clone, Deserialize)]
struct EndpointRow {
    id: RowKey,
}

#[derive(Debug, Clone, Deserialize)]
struct EdgeRow {
    id: RowKey,
    relationship_type: RelationshipType,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source: Option<EndpointRow>,
    #[serde(default)]
    target: Option<EndpointRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct EntityRow {
    id: RowKey,
    slug: String,
    name: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(rename = "type")]
    entity_type: EntityType,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    key_people: Option<ListColumn<KeyPerson>>,
    #[serde(default)]
    agent_instructions: String,
    #[serde(default)]
    financial_notes: Option<String>,
    #[serde(default)]
    tracking_focus: Option<ListColumn<String>>,
    #[serde(default)]
    status: EntityStatus,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    sort_order: i32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    #[serde(default)]
    outgoing: Vec<EdgeRow>,
    #[serde(default)]
    incoming: Vec<EdgeRow>,
}

fn decode_list<T: DeserializeOwned>(
    column: Option<ListColumn<T>>,
    field: &str,
    key: &str,
) -> Result<Vec<T>, DossierError> {
    match column {
        None => Ok(Vec::new()),
        Some(ListColumn::List(items)) => Ok(items),
        Some(ListColumn::Encoded(text)) if text.trim().is_empty() => Ok(Vec::new()),
        Some(ListColumn::Encoded(text)) => serde_json::from_str(&text).map_err(|e| {
            DossierError::MalformedRow(format!("row {}: {} is not a JSON list: {}", key, field, e))
        }),
    }
}

fn decode_metadata(value: Option<serde_json::Value>, key: &str) -> Result<Metadata, DossierError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Metadata::new()),
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(other) => Err(DossierError::MalformedRow(format!(
            "row {}: metadata must be an object, got {}",
            key, other
        ))),
    }
}

// =============================================================================
// IMPORT PLAN
// =============================================================================

/// One entity row, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedEntity {
    /// Primary key in the source system.
    pub key: String,
    pub payload: EntityPayload,
}

/// One edge, identified by the source system's keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedEdge {
    pub key: String,
    pub source_key: String,
    pub target_key: String,
    pub relationship_type: RelationshipType,
    pub description: Option<String>,
}

/// Normalized contents of an export, ready to apply to a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPlan {
    pub entities: Vec<ImportedEntity>,
    pub edges: Vec<ImportedEdge>,
}

/// Counts reported after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub entities: usize,
    pub relationships: usize,
}

/// Parse an exported JSON array of entity rows.
///
/// Every edge appears twice in such an export (outgoing on its source,
/// incoming on its target); edges are deduplicated by key.
pub fn plan_import(json: &str) -> Result<ImportPlan, DossierError> {
    let rows: Vec<EntityRow> =
        serde_json::from_str(json).map_err(|e| DossierError::MalformedRow(e.to_string()))?;
    if rows.len() > MAX_IMPORT_ROWS {
        return Err(DossierError::Validation(format!(
            "Import has {} rows; at most {} are accepted",
            rows.len(),
            MAX_IMPORT_ROWS
        )));
    }

    let mut plan = ImportPlan::default();
    let mut seen_edges: BTreeSet<String> = BTreeSet::new();

    for row in rows {
        let key = row.id.into_string();
        let slug = Slug::new(&row.slug)
            .map_err(|_| DossierError::MalformedRow(format!("row {}: slug is empty", key)))?;
        let agent_instructions = row.agent_instructions.trim();
        if agent_instructions.is_empty() {
            return Err(DossierError::MalformedRow(format!(
                "row {}: agent_instructions is empty",
                key
            )));
        }
        let key_people = decode_list(row.key_people, "key_people", &key)?;
        let tracking_focus = decode_list(row.tracking_focus, "tracking_focus", &key)?;
        let metadata = decode_metadata(row.metadata, &key)?;

        for edge in row.outgoing {
            let target = edge.target.ok_or_else(|| {
                DossierError::MalformedRow(format!("row {}: outgoing edge without target", key))
            })?;
            let edge_key = edge.id.into_string();
            if seen_edges.insert(edge_key.clone()) {
                plan.edges.push(ImportedEdge {
                    key: edge_key,
                    source_key: key.clone(),
                    target_key: target.id.into_string(),
                    relationship_type: edge.relationship_type,
                    description: edge.description,
                });
            }
        }

        for edge in row.incoming {
            let source = edge.source.ok_or_else(|| {
                DossierError::MalformedRow(format!("row {}: incoming edge without source", key))
            })?;
            let edge_key = edge.id.into_string();
            if seen_edges.insert(edge_key.clone()) {
                plan.edges.push(ImportedEdge {
                    key: edge_key,
                    source_key: source.id.into_string(),
                    target_key: key.clone(),
                    relationship_type: edge.relationship_type,
                    description: edge.description,
                });
            }
        }

        plan.entities.push(ImportedEntity {
            key,
            payload: EntityPayload {
                name: row.name,
                full_name: row.full_name,
                slug,
                entity_type: row.entity_type,
                description: row.description,
                agent_instructions: agent_instructions.to_string(),
                financial_notes: row.financial_notes,
                tracking_focus,
                key_people,
                status: row.status,
                icon: row.icon,
                sort_order: Some(row.sort_order),
                metadata: Some(metadata),
            },
        });
    }

    Ok(plan)
}

impl ImportPlan {
    /// Insert every entity, then every edge, remapping source keys to the
    /// ids the store assigns.
    ///
    /// Slugs (within the batch and against the store) and edge endpoints
    /// are checked before anything is written, so a rejected plan leaves
    /// the store untouched.
    pub fn apply<S: EntityStore + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<ImportSummary, DossierError> {
        let mut slugs: BTreeSet<String> = store
            .fetch_entities()?
            .into_iter()
            .map(|e| e.slug.to_string())
            .collect();
        for entity in &self.entities {
            if !slugs.insert(entity.payload.slug.to_string()) {
                return Err(DossierError::SlugTaken(entity.payload.slug.to_string()));
            }
        }

        let keys: BTreeSet<&str> = self.entities.iter().map(|e| e.key.as_str()).collect();
        for edge in &self.edges {
            for endpoint in [&edge.source_key, &edge.target_key] {
                if !keys.contains(endpoint.as_str()) {
                    return Err(DossierError::MalformedRow(format!(
                        "edge {} references unknown entity {}",
                        edge.key, endpoint
                    )));
                }
            }
        }

        let mut ids: BTreeMap<&str, EntityId> = BTreeMap::new();
        for entity in &self.entities {
            let id = store.insert_entity(&entity.payload)?;
            ids.insert(entity.key.as_str(), id);
        }

        let mut relationships = 0;
        for edge in &self.edges {
            let (Some(&source), Some(&target)) = (
                ids.get(edge.source_key.as_str()),
                ids.get(edge.target_key.as_str()),
            ) else {
                continue;
            };
            store.insert_relationship(&NewRelationship {
                source_entity_id: source,
                target_entity_id: target,
                relationship_type: edge.relationship_type,
                description: edge.description.clone(),
            })?;
            relationships += 1;
        }

        tracing::info!(
            entities = self.entities.len(),
            relationships,
            "import applied"
        );

        Ok(ImportSummary {
            entities: self.entities.len(),
            relationships,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

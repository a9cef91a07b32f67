//! Stored row shapes shared by both backends.
//!
//! Records are encoded with postcard, which is not self-describing: every
//! field is always written, and the open `metadata` bag is kept as JSON text.
//! Timestamps are milliseconds since the epoch.

use crate::slug::Slug;
use crate::usage::UsageRow;
use crate::{
    DossierError, Entity, EntityId, EntityPayload, EntityRef, EntityStatus, EntityType, KeyPerson,
    Metadata, NewRelationship, RelationshipEdge, RelationshipId, RelationshipType,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, DossierError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DossierError::SerializationError(format!("timestamp out of range: {}", ms)))
}

// =============================================================================
// ENTITY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct EntityRecord {
    pub id: u64,
    pub slug: String,
    pub name: String,
    pub full_name: Option<String>,
    pub entity_type: EntityType,
    pub description: Option<String>,
    pub key_people: Vec<KeyPerson>,
    pub agent_instructions: String,
    pub financial_notes: Option<String>,
    pub tracking_focus: Vec<String>,
    pub status: EntityStatus,
    pub icon: Option<String>,
    pub sort_order: i32,
    pub metadata_json: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl EntityRecord {
    /// A fresh record; unmanaged fields fall back to `0` and `{}`.
    pub fn create(
        id: EntityId,
        payload: &EntityPayload,
        now: DateTime<Utc>,
    ) -> Result<Self, DossierError> {
        let metadata = payload.metadata.clone().unwrap_or_default();
        let ms = to_millis(now);
        Ok(Self {
            id: id.0,
            slug: payload.slug.to_string(),
            name: payload.name.clone(),
            full_name: payload.full_name.clone(),
            entity_type: payload.entity_type,
            description: payload.description.clone(),
            key_people: payload.key_people.clone(),
            agent_instructions: payload.agent_instructions.clone(),
            financial_notes: payload.financial_notes.clone(),
            tracking_focus: payload.tracking_focus.clone(),
            status: payload.status,
            icon: payload.icon.clone(),
            sort_order: payload.sort_order.unwrap_or(0),
            metadata_json: encode_metadata(&metadata)?,
            created_at_ms: ms,
            updated_at_ms: ms,
        })
    }

    /// Overwrite with `payload`, keeping identity, `created_at`, and any
    /// unmanaged field the payload leaves as `None`.
    pub fn apply(&mut self, payload: &EntityPayload, now: DateTime<Utc>) -> Result<(), DossierError> {
        self.slug = payload.slug.to_string();
        self.name = payload.name.clone();
        self.full_name = payload.full_name.clone();
        self.entity_type = payload.entity_type;
        self.description = payload.description.clone();
        self.key_people = payload.key_people.clone();
        self.agent_instructions = payload.agent_instructions.clone();
        self.financial_notes = payload.financial_notes.clone();
        self.tracking_focus = payload.tracking_focus.clone();
        self.status = payload.status;
        self.icon = payload.icon.clone();
        if let Some(order) = payload.sort_order {
            self.sort_order = order;
        }
        if let Some(metadata) = &payload.metadata {
            self.metadata_json = encode_metadata(metadata)?;
        }
        self.updated_at_ms = to_millis(now);
        Ok(())
    }

    fn slug(&self) -> Result<Slug, DossierError> {
        Slug::new(&self.slug).map_err(|_| {
            DossierError::SerializationError(format!("entity {} has an empty slug", self.id))
        })
    }

    pub fn to_ref(&self) -> Result<EntityRef, DossierError> {
        Ok(EntityRef {
            id: EntityId(self.id),
            slug: self.slug()?,
            name: self.name.clone(),
            entity_type: self.entity_type,
        })
    }

    fn into_entity(self) -> Result<Entity, DossierError> {
        let slug = self.slug()?;
        let metadata: Metadata = serde_json::from_str(&self.metadata_json)
            .map_err(|e| DossierError::SerializationError(e.to_string()))?;
        Ok(Entity {
            id: EntityId(self.id),
            slug,
            name: self.name,
            full_name: self.full_name,
            entity_type: self.entity_type,
            description: self.description,
            key_people: self.key_people,
            agent_instructions: self.agent_instructions,
            financial_notes: self.financial_notes,
            tracking_focus: self.tracking_focus,
            status: self.status,
            icon: self.icon,
            sort_order: self.sort_order,
            metadata,
            created_at: from_millis(self.created_at_ms)?,
            updated_at: from_millis(self.updated_at_ms)?,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        })
    }
}

fn encode_metadata(metadata: &Metadata) -> Result<String, DossierError> {
    serde_json::to_string(metadata).map_err(|e| DossierError::SerializationError(e.to_string()))
}

// =============================================================================
// RELATIONSHIP
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RelationshipRecord {
    pub id: u64,
    pub source: u64,
    pub target: u64,
    pub relationship_type: RelationshipType,
    pub description: Option<String>,
}

impl RelationshipRecord {
    pub fn create(id: RelationshipId, new: &NewRelationship) -> Self {
        Self {
            id: id.0,
            source: new.source_entity_id.0,
            target: new.target_entity_id.0,
            relationship_type: new.relationship_type,
            description: new.description.clone(),
        }
    }

    pub fn touches(&self, entity: u64) -> bool {
        self.source == entity || self.target == entity
    }
}

// =============================================================================
// USAGE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UsageRecord {
    pub agent: String,
    pub results: String,
    pub api_cost_micros: u64,
}

impl UsageRecord {
    pub fn from_row(row: &UsageRow) -> Self {
        Self {
            agent: row.agent.clone(),
            results: row.results.clone(),
            api_cost_micros: row.api_cost_micros,
        }
    }

    pub fn into_row(self, created_at_ms: i64) -> Result<UsageRow, DossierError> {
        Ok(UsageRow {
            agent: self.agent,
            results: self.results,
            api_cost_micros: self.api_cost_micros,
            created_at: from_millis(created_at_ms)?,
        })
    }
}

// =============================================================================
// JOIN
// =============================================================================

/// Join entity records with their edges.
///
/// Each edge is attached as `outgoing` on its source and `incoming` on its
/// target, in edge-id order. Result is ordered by `sort_order`, then `name`.
pub(crate) fn assemble(
    entities: Vec<EntityRecord>,
    relationships: &[RelationshipRecord],
) -> Result<Vec<Entity>, DossierError> {
    let mut refs: BTreeMap<u64, EntityRef> = BTreeMap::new();
    for record in &entities {
        refs.insert(record.id, record.to_ref()?);
    }

    let mut by_id: BTreeMap<u64, Entity> = BTreeMap::new();
    for record in entities {
        by_id.insert(record.id, record.into_entity()?);
    }

    for rel in relationships {
        let (Some(source), Some(target)) = (refs.get(&rel.source), refs.get(&rel.target)) else {
            tracing::warn!(relationship = rel.id, "skipping edge with a missing endpoint");
            continue;
        };
        let edge = RelationshipEdge {
            id: RelationshipId(rel.id),
            relationship_type: rel.relationship_type,
            description: rel.description.clone(),
            source: source.clone(),
            target: target.clone(),
        };
        if let Some(entity) = by_id.get_mut(&rel.source) {
            entity.outgoing.push(edge.clone());
        }
        if let Some(entity) = by_id.get_mut(&rel.target) {
            entity.incoming.push(edge);
        }
    }

    let mut out: Vec<Entity> = by_id.into_values().collect();
    out.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::test_support::payload;

    #[test]
    fn record_roundtrips_through_postcard() {
        let mut p = payload("Acme Fund", EntityType::VentureFund);
        p.metadata = Some(
            serde_json::json!({"region": "midwest"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let record = EntityRecord::create(EntityId(3), &p, Utc::now()).unwrap();
        let bytes = postcard::to_allocvec(&record).unwrap();
        let back: EntityRecord = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn apply_keeps_unmanaged_fields() {
        let mut p = payload("Acme", EntityType::OperatingCompany);
        p.sort_order = Some(4);
        let mut record = EntityRecord::create(EntityId(1), &p, Utc::now()).unwrap();
        let created = record.created_at_ms;

        let mut edit = payload("Acme Holdings", EntityType::OperatingCompany);
        edit.sort_order = None;
        record.apply(&edit, Utc::now()).unwrap();

        assert_eq!(record.sort_order, 4);
        assert_eq!(record.name, "Acme Holdings");
        assert_eq!(record.created_at_ms, created);
    }

    #[test]
    fn assemble_orders_by_sort_order_then_name() {
        let now = Utc::now();
        let mut b = payload("Beta", EntityType::Person);
        b.sort_order = Some(1);
        let records = vec![
            EntityRecord::create(EntityId(1), &b, now).unwrap(),
            EntityRecord::create(EntityId(2), &payload("Zed", EntityType::Person), now).unwrap(),
            EntityRecord::create(EntityId(3), &payload("Alpha", EntityType::Person), now).unwrap(),
        ];
        let names: Vec<_> = assemble(records, &[])
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zed", "Beta"]);
    }
}

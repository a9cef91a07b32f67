//! In-memory store.
//!
//! BTreeMap-backed so iteration order is deterministic. Uses the same record
//! shapes as `RedbStore`, which keeps the two backends observably identical.

use super::records::{self, EntityRecord, RelationshipRecord, UsageRecord};
use super::{AgentStore, EntityStore, StoreCounts};
use crate::usage::UsageRow;
use crate::{DossierError, Entity, EntityId, EntityPayload, NewRelationship, RelationshipId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Volatile store for tests and `--backend memory`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: BTreeMap<u64, EntityRecord>,
    relationships: BTreeMap<u64, RelationshipRecord>,
    heartbeats: BTreeMap<String, i64>,
    /// (created_at_ms, seq) -> record
    usage: BTreeMap<(i64, u64), UsageRecord>,
    next_entity_id: u64,
    next_relationship_id: u64,
    next_usage_seq: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slug_owner(&self, slug: &str) -> Option<u64> {
        self.entities
            .values()
            .find(|r| r.slug == slug)
            .map(|r| r.id)
    }

    fn edges(&self) -> Vec<RelationshipRecord> {
        self.relationships.values().cloned().collect()
    }
}

impl EntityStore for MemoryStore {
    fn fetch_entities(&self) -> Result<Vec<Entity>, DossierError> {
        records::assemble(self.entities.values().cloned().collect(), &self.edges())
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, DossierError> {
        if !self.entities.contains_key(&id.0) {
            return Ok(None);
        }
        Ok(self.fetch_entities()?.into_iter().find(|e| e.id == id))
    }

    fn insert_entity(&mut self, payload: &EntityPayload) -> Result<EntityId, DossierError> {
        if self.slug_owner(payload.slug.as_str()).is_some() {
            return Err(DossierError::SlugTaken(payload.slug.to_string()));
        }
        let id = EntityId(self.next_entity_id);
        let record = EntityRecord::create(id, payload, Utc::now())?;
        self.next_entity_id = self.next_entity_id.saturating_add(1);
        self.entities.insert(id.0, record);
        Ok(id)
    }

    fn update_entity(
        &mut self,
        id: EntityId,
        payload: &EntityPayload,
    ) -> Result<(), DossierError> {
        if !self.entities.contains_key(&id.0) {
            return Err(DossierError::EntityNotFound(id));
        }
        if self
            .slug_owner(payload.slug.as_str())
            .is_some_and(|owner| owner != id.0)
        {
            return Err(DossierError::SlugTaken(payload.slug.to_string()));
        }
        let record = self
            .entities
            .get_mut(&id.0)
            .ok_or(DossierError::EntityNotFound(id))?;
        record.apply(payload, Utc::now())
    }

    fn delete_entity(&mut self, id: EntityId) -> Result<usize, DossierError> {
        if self.entities.remove(&id.0).is_none() {
            return Err(DossierError::EntityNotFound(id));
        }
        let before = self.relationships.len();
        self.relationships.retain(|_, rel| !rel.touches(id.0));
        Ok(before - self.relationships.len())
    }

    fn insert_relationship(
        &mut self,
        relationship: &NewRelationship,
    ) -> Result<RelationshipId, DossierError> {
        for endpoint in [relationship.source_entity_id, relationship.target_entity_id] {
            if !self.entities.contains_key(&endpoint.0) {
                return Err(DossierError::EntityNotFound(endpoint));
            }
        }
        let id = RelationshipId(self.next_relationship_id);
        self.next_relationship_id = self.next_relationship_id.saturating_add(1);
        self.relationships
            .insert(id.0, RelationshipRecord::create(id, relationship));
        Ok(id)
    }

    fn delete_relationship(&mut self, id: RelationshipId) -> Result<(), DossierError> {
        self.relationships
            .remove(&id.0)
            .map(|_| ())
            .ok_or(DossierError::RelationshipNotFound(id))
    }

    fn counts(&self) -> Result<StoreCounts, DossierError> {
        Ok(StoreCounts {
            entities: self.entities.len() as u64,
            relationships: self.relationships.len() as u64,
        })
    }
}

impl AgentStore for MemoryStore {
    fn touch_heartbeat(&mut self, agent: &str, at: DateTime<Utc>) -> Result<(), DossierError> {
        self.heartbeats
            .insert(agent.to_string(), records::to_millis(at));
        Ok(())
    }

    fn heartbeats(&self) -> Result<BTreeMap<String, DateTime<Utc>>, DossierError> {
        self.heartbeats
            .iter()
            .map(|(agent, ms)| Ok((agent.clone(), records::from_millis(*ms)?)))
            .collect()
    }

    fn record_usage(&mut self, row: &UsageRow) -> Result<(), DossierError> {
        let key = (records::to_millis(row.created_at), self.next_usage_seq);
        self.next_usage_seq = self.next_usage_seq.saturating_add(1);
        self.usage.insert(key, UsageRecord::from_row(row));
        Ok(())
    }

    fn usage_since(
        &self,
        since: DateTime<Utc>,
        agent: Option<&str>,
    ) -> Result<Vec<UsageRow>, DossierError> {
        self.usage
            .range((records::to_millis(since), 0)..)
            .rev()
            .filter(|(_, rec)| agent.is_none_or(|a| rec.agent == a))
            .map(|((ms, _), rec)| rec.clone().into_row(*ms))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::test_support::payload;
    use crate::{EntityType, RelationshipType};
    use chrono::Duration;

    #[test]
    fn duplicate_slug_is_rejected() {
        let mut store = MemoryStore::new();
        store
            .insert_entity(&payload("Acme", EntityType::OperatingCompany))
            .unwrap();
        let err = store
            .insert_entity(&payload("ACME", EntityType::PublicCompany))
            .unwrap_err();
        assert!(matches!(err, DossierError::SlugTaken(s) if s == "acme"));
    }

    #[test]
    fn update_may_keep_own_slug() {
        let mut store = MemoryStore::new();
        let id = store
            .insert_entity(&payload("Acme", EntityType::OperatingCompany))
            .unwrap();
        let mut edit = payload("Acme", EntityType::OperatingCompany);
        edit.description = Some("Widgets".to_string());
        store.update_entity(id, &edit).unwrap();
        let fetched = store.get_entity(id).unwrap().unwrap();
        assert_eq!(fetched.description.as_deref(), Some("Widgets"));
    }

    #[test]
    fn relationship_requires_existing_endpoints() {
        let mut store = MemoryStore::new();
        let a = store
            .insert_entity(&payload("A", EntityType::Person))
            .unwrap();
        let err = store
            .insert_relationship(&NewRelationship {
                source_entity_id: a,
                target_entity_id: EntityId(99),
                relationship_type: RelationshipType::Operates,
                description: None,
            })
            .unwrap_err();
        assert!(matches!(err, DossierError::EntityNotFound(EntityId(99))));
    }

    #[test]
    fn usage_since_is_newest_first_and_filtered() {
        let mut store = MemoryStore::new();
        let now = Utc::now();
        for (agent, hours) in [("ace", 1), ("romero", 2), ("ace", 3), ("ace", 24 * 40)] {
            store
                .record_usage(&UsageRow {
                    agent: agent.to_string(),
                    results: "{}".to_string(),
                    api_cost_micros: 0,
                    created_at: now - Duration::hours(hours),
                })
                .unwrap();
        }
        let rows = store
            .usage_since(now - Duration::days(30), Some("ace"))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].created_at > rows[1].created_at);
    }

    #[test]
    fn heartbeat_upserts() {
        let mut store = MemoryStore::new();
        let t0 = Utc::now() - Duration::minutes(5);
        store.touch_heartbeat("ace", t0).unwrap();
        store.touch_heartbeat("ace", Utc::now()).unwrap();
        let beats = store.heartbeats().unwrap();
        assert_eq!(beats.len(), 1);
        assert!(beats["ace"] > t0);
    }
}

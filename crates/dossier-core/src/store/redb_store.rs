//! # redb-backed Store
//!
//! A disk-backed store using the redb embedded database:
//! - ACID transactions (one write transaction per mutation)
//! - Crash safety (copy-on-write B-trees)
//! - Zero configuration
//!
//! Entity deletion removes the entity, its slug index entry and every edge
//! touching it inside a single write transaction, so a failed delete leaves
//! no dangling edges behind.

use super::records::{self, EntityRecord, RelationshipRecord, UsageRecord};
use super::{AgentStore, EntityStore, StoreCounts};
use crate::usage::UsageRow;
use crate::{DossierError, Entity, EntityId, EntityPayload, NewRelationship, RelationshipId};
use chrono::{DateTime, Utc};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Entities: EntityId(u64) -> postcard `EntityRecord`
const ENTITIES: TableDefinition<u64, &[u8]> = TableDefinition::new("entities");

/// Edges: RelationshipId(u64) -> postcard `RelationshipRecord`
const RELATIONSHIPS: TableDefinition<u64, &[u8]> = TableDefinition::new("relationships");

/// Unique slug index: slug -> EntityId(u64)
const SLUG_INDEX: TableDefinition<&str, u64> = TableDefinition::new("slug_index");

/// Id counters: key string -> next value
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Agent liveness: agent id -> last heartbeat (ms since epoch)
const HEARTBEATS: TableDefinition<&str, i64> = TableDefinition::new("heartbeats");

/// Usage log: (created_at ms, seq) -> postcard `UsageRecord`
const USAGE_LOG: TableDefinition<(i64, u64), &[u8]> = TableDefinition::new("usage_log");

const NEXT_ENTITY_ID: &str = "next_entity_id";
const NEXT_RELATIONSHIP_ID: &str = "next_relationship_id";
const NEXT_USAGE_SEQ: &str = "next_usage_seq";

fn io(e: impl std::fmt::Display) -> DossierError {
    DossierError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, DossierError> {
    postcard::to_allocvec(value).map_err(|e| DossierError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DossierError> {
    postcard::from_bytes(bytes).map_err(|e| DossierError::SerializationError(e.to_string()))
}

/// Take the next value of a counter and advance it.
fn next_id(meta: &mut Table<'_, &'static str, u64>, key: &str) -> Result<u64, DossierError> {
    let current = meta.get(key).map_err(io)?.map(|v| v.value()).unwrap_or(0);
    meta.insert(key, current.saturating_add(1)).map_err(io)?;
    Ok(current)
}

/// A disk-backed store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DossierError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(ENTITIES).map_err(io)?;
            let _ = write_txn.open_table(RELATIONSHIPS).map_err(io)?;
            let _ = write_txn.open_table(SLUG_INDEX).map_err(io)?;
            let _ = write_txn.open_table(METADATA).map_err(io)?;
            let _ = write_txn.open_table(HEARTBEATS).map_err(io)?;
            let _ = write_txn.open_table(USAGE_LOG).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "redb store opened");
        Ok(Self { db })
    }

    fn load_entities<F>(&self, keep: F) -> Result<Vec<EntityRecord>, DossierError>
    where
        F: Fn(u64) -> bool,
    {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(ENTITIES).map_err(io)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (key, value) = entry.map_err(io)?;
            if keep(key.value()) {
                out.push(decode::<EntityRecord>(value.value())?);
            }
        }
        Ok(out)
    }

    fn load_relationships<F>(&self, keep: F) -> Result<Vec<RelationshipRecord>, DossierError>
    where
        F: Fn(&RelationshipRecord) -> bool,
    {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(RELATIONSHIPS).map_err(io)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            let record: RelationshipRecord = decode(value.value())?;
            if keep(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }
}

// =============================================================================
// ENTITY STORE
// =============================================================================

impl EntityStore for RedbStore {
    fn fetch_entities(&self) -> Result<Vec<Entity>, DossierError> {
        let entities = self.load_entities(|_| true)?;
        let relationships = self.load_relationships(|_| true)?;
        records::assemble(entities, &relationships)
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, DossierError> {
        let edges = self.load_relationships(|r| r.touches(id.0))?;
        let mut wanted: BTreeSet<u64> = BTreeSet::new();
        wanted.insert(id.0);
        for edge in &edges {
            wanted.insert(edge.source);
            wanted.insert(edge.target);
        }
        let entities = self.load_entities(|key| wanted.contains(&key))?;
        if !entities.iter().any(|r| r.id == id.0) {
            return Ok(None);
        }
        Ok(records::assemble(entities, &edges)?
            .into_iter()
            .find(|e| e.id == id))
    }

    fn insert_entity(&mut self, payload: &EntityPayload) -> Result<EntityId, DossierError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        let id = {
            let mut slugs = write_txn.open_table(SLUG_INDEX).map_err(io)?;
            if slugs.get(payload.slug.as_str()).map_err(io)?.is_some() {
                return Err(DossierError::SlugTaken(payload.slug.to_string()));
            }
            let mut meta = write_txn.open_table(METADATA).map_err(io)?;
            let id = EntityId(next_id(&mut meta, NEXT_ENTITY_ID)?);

            let record = EntityRecord::create(id, payload, Utc::now())?;
            let bytes = encode(&record)?;
            let mut entities = write_txn.open_table(ENTITIES).map_err(io)?;
            entities.insert(id.0, bytes.as_slice()).map_err(io)?;
            slugs.insert(payload.slug.as_str(), id.0).map_err(io)?;
            id
        };
        write_txn.commit().map_err(io)?;
        Ok(id)
    }

    fn update_entity(
        &mut self,
        id: EntityId,
        payload: &EntityPayload,
    ) -> Result<(), DossierError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut entities = write_txn.open_table(ENTITIES).map_err(io)?;
            let mut record: EntityRecord = match entities.get(id.0).map_err(io)? {
                Some(data) => decode(data.value())?,
                None => return Err(DossierError::EntityNotFound(id)),
            };

            let mut slugs = write_txn.open_table(SLUG_INDEX).map_err(io)?;
            let owner = slugs
                .get(payload.slug.as_str())
                .map_err(io)?
                .map(|v| v.value());
            if owner.is_some_and(|owner| owner != id.0) {
                return Err(DossierError::SlugTaken(payload.slug.to_string()));
            }
            if record.slug != payload.slug.as_str() {
                slugs.remove(record.slug.as_str()).map_err(io)?;
                slugs.insert(payload.slug.as_str(), id.0).map_err(io)?;
            }

            record.apply(payload, Utc::now())?;
            let bytes = encode(&record)?;
            entities.insert(id.0, bytes.as_slice()).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn delete_entity(&mut self, id: EntityId) -> Result<usize, DossierError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        let removed_edges = {
            let mut entities = write_txn.open_table(ENTITIES).map_err(io)?;
            let record: EntityRecord = match entities.remove(id.0).map_err(io)? {
                Some(data) => decode(data.value())?,
                None => return Err(DossierError::EntityNotFound(id)),
            };

            let mut slugs = write_txn.open_table(SLUG_INDEX).map_err(io)?;
            slugs.remove(record.slug.as_str()).map_err(io)?;

            let mut relationships = write_txn.open_table(RELATIONSHIPS).map_err(io)?;
            let mut doomed = Vec::new();
            for entry in relationships.iter().map_err(io)? {
                let (key, value) = entry.map_err(io)?;
                let edge: RelationshipRecord = decode(value.value())?;
                if edge.touches(id.0) {
                    doomed.push(key.value());
                }
            }
            for key in &doomed {
                relationships.remove(*key).map_err(io)?;
            }
            doomed.len()
        };
        write_txn.commit().map_err(io)?;

        tracing::debug!(entity = %id, removed_edges, "entity deleted");
        Ok(removed_edges)
    }

    fn insert_relationship(
        &mut self,
        relationship: &NewRelationship,
    ) -> Result<RelationshipId, DossierError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        let id = {
            let entities = write_txn.open_table(ENTITIES).map_err(io)?;
            for endpoint in [relationship.source_entity_id, relationship.target_entity_id] {
                if entities.get(endpoint.0).map_err(io)?.is_none() {
                    return Err(DossierError::EntityNotFound(endpoint));
                }
            }

            let mut meta = write_txn.open_table(METADATA).map_err(io)?;
            let id = RelationshipId(next_id(&mut meta, NEXT_RELATIONSHIP_ID)?);
            let bytes = encode(&RelationshipRecord::create(id, relationship))?;
            let mut relationships = write_txn.open_table(RELATIONSHIPS).map_err(io)?;
            relationships.insert(id.0, bytes.as_slice()).map_err(io)?;
            id
        };
        write_txn.commit().map_err(io)?;
        Ok(id)
    }

    fn delete_relationship(&mut self, id: RelationshipId) -> Result<(), DossierError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut relationships = write_txn.open_table(RELATIONSHIPS).map_err(io)?;
            if relationships.remove(id.0).map_err(io)?.is_none() {
                return Err(DossierError::RelationshipNotFound(id));
            }
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn counts(&self) -> Result<StoreCounts, DossierError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let entities = read_txn.open_table(ENTITIES).map_err(io)?;
        let relationships = read_txn.open_table(RELATIONSHIPS).map_err(io)?;
        Ok(StoreCounts {
            entities: entities.len().map_err(io)?,
            relationships: relationships.len().map_err(io)?,
        })
    }
}

// =============================================================================
// AGENT STORE
// =============================================================================

impl AgentStore for RedbStore {
    fn touch_heartbeat(&mut self, agent: &str, at: DateTime<Utc>) -> Result<(), DossierError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(HEARTBEATS).map_err(io)?;
            table.insert(agent, records::to_millis(at)).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn heartbeats(&self) -> Result<BTreeMap<String, DateTime<Utc>>, DossierError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(HEARTBEATS).map_err(io)?;
        let mut out = BTreeMap::new();
        for entry in table.iter().map_err(io)? {
            let (key, value) = entry.map_err(io)?;
            out.insert(key.value().to_string(), records::from_millis(value.value())?);
        }
        Ok(out)
    }

    fn record_usage(&mut self, row: &UsageRow) -> Result<(), DossierError> {
        let bytes = encode(&UsageRecord::from_row(row))?;
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut meta = write_txn.open_table(METADATA).map_err(io)?;
            let seq = next_id(&mut meta, NEXT_USAGE_SEQ)?;
            let mut log = write_txn.open_table(USAGE_LOG).map_err(io)?;
            log.insert((records::to_millis(row.created_at), seq), bytes.as_slice())
                .map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn usage_since(
        &self,
        since: DateTime<Utc>,
        agent: Option<&str>,
    ) -> Result<Vec<UsageRow>, DossierError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let log = read_txn.open_table(USAGE_LOG).map_err(io)?;
        let mut out = Vec::new();
        for entry in log
            .range((records::to_millis(since), 0u64)..)
            .map_err(io)?
            .rev()
        {
            let (key, value) = entry.map_err(io)?;
            let (created_at_ms, _) = key.value();
            let record: UsageRecord = decode(value.value())?;
            if agent.is_none_or(|a| record.agent == a) {
                out.push(record.into_row(created_at_ms)?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::test_support::payload;
    use crate::{EntityType, RelationshipType};
    use tempfile::tempdir;

    #[test]
    fn ids_survive_reopen() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("ids.redb");

        let first = {
            let mut store = RedbStore::open(&path).expect("open");
            store
                .insert_entity(&payload("Acme", EntityType::OperatingCompany))
                .expect("insert")
        };

        let mut store = RedbStore::open(&path).expect("reopen");
        let second = store
            .insert_entity(&payload("Beta", EntityType::Person))
            .expect("insert");
        assert_ne!(first, second);
        assert_eq!(store.counts().unwrap().entities, 2);
    }

    #[test]
    fn delete_cascades_edges_in_one_transaction() {
        let dir = tempdir().expect("create temp dir");
        let mut store = RedbStore::open(dir.path().join("cascade.redb")).expect("open");

        let a = store
            .insert_entity(&payload("A", EntityType::Person))
            .unwrap();
        let b = store
            .insert_entity(&payload("B", EntityType::FamilyOffice))
            .unwrap();
        let c = store
            .insert_entity(&payload("C", EntityType::Nonprofit))
            .unwrap();
        for (s, t) in [(a, b), (b, a), (b, c)] {
            store
                .insert_relationship(&NewRelationship {
                    source_entity_id: s,
                    target_entity_id: t,
                    relationship_type: RelationshipType::AffiliatedWith,
                    description: None,
                })
                .unwrap();
        }

        assert_eq!(store.delete_entity(a).unwrap(), 2);
        let counts = store.counts().unwrap();
        assert_eq!(counts.entities, 2);
        assert_eq!(counts.relationships, 1);

        // The freed slug may be reused.
        store
            .insert_entity(&payload("A", EntityType::Person))
            .unwrap();
    }

    #[test]
    fn rename_moves_slug_index_entry() {
        let dir = tempdir().expect("create temp dir");
        let mut store = RedbStore::open(dir.path().join("slug.redb")).expect("open");
        let id = store
            .insert_entity(&payload("Acme", EntityType::OperatingCompany))
            .unwrap();
        store
            .update_entity(id, &payload("Acme Holdings", EntityType::OperatingCompany))
            .unwrap();

        store
            .insert_entity(&payload("Acme", EntityType::Person))
            .expect("old slug is free again");
        let err = store
            .insert_entity(&payload("Acme Holdings", EntityType::Person))
            .unwrap_err();
        assert!(matches!(err, DossierError::SlugTaken(_)));
    }

    #[test]
    fn get_entity_joins_edges() {
        let dir = tempdir().expect("create temp dir");
        let mut store = RedbStore::open(dir.path().join("get.redb")).expect("open");
        let a = store
            .insert_entity(&payload("Jane", EntityType::Person))
            .unwrap();
        let b = store
            .insert_entity(&payload("Acme", EntityType::OperatingCompany))
            .unwrap();
        store
            .insert_relationship(&NewRelationship {
                source_entity_id: a,
                target_entity_id: b,
                relationship_type: RelationshipType::BoardMemberOf,
                description: Some("since 2019".to_string()),
            })
            .unwrap();

        let jane = store.get_entity(a).unwrap().unwrap();
        assert_eq!(jane.outgoing.len(), 1);
        assert_eq!(jane.outgoing[0].target.name, "Acme");
        assert!(store.get_entity(EntityId(42)).unwrap().is_none());
    }
}

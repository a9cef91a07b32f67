//! # Storage
//!
//! The store owns persistence and id generation for entities, relationship
//! edges, agent heartbeats and the usage log.
//!
//! A store is always constructed by the caller and passed in; nothing in
//! this crate reaches for a shared connection.
//!
//! ## Backends
//!
//! - `MemoryStore`: BTreeMap-backed, volatile
//! - `RedbStore`: redb-backed, one ACID transaction per mutation
//!
//! `StorageBackend` selects one at runtime.

mod memory;
mod records;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::usage::UsageRow;
use crate::{
    DossierError, Entity, EntityId, EntityPayload, NewRelationship, RelationshipId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Row counts of the entity tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub entities: u64,
    pub relationships: u64,
}

/// Entities and their relationship edges.
pub trait EntityStore {
    /// Every entity with `outgoing` and `incoming` edges joined in,
    /// ordered by `sort_order` then `name`.
    fn fetch_entities(&self) -> Result<Vec<Entity>, DossierError>;

    /// One entity with its edges joined in.
    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, DossierError>;

    /// Insert a new entity. Fails with `SlugTaken` if the slug is in use.
    fn insert_entity(&mut self, payload: &EntityPayload) -> Result<EntityId, DossierError>;

    /// Overwrite an entity's fields. `created_at` is kept.
    fn update_entity(&mut self, id: EntityId, payload: &EntityPayload)
    -> Result<(), DossierError>;

    /// Delete an entity and every edge touching it, atomically.
    ///
    /// Returns the number of edges removed with it.
    fn delete_entity(&mut self, id: EntityId) -> Result<usize, DossierError>;

    /// Insert a directed edge. Both endpoints must exist.
    fn insert_relationship(
        &mut self,
        relationship: &NewRelationship,
    ) -> Result<RelationshipId, DossierError>;

    /// Delete exactly one edge.
    fn delete_relationship(&mut self, id: RelationshipId) -> Result<(), DossierError>;

    fn counts(&self) -> Result<StoreCounts, DossierError>;
}

/// Agent liveness and the usage log.
pub trait AgentStore {
    /// Stamp `agent` as alive at `at`, creating it if unknown.
    fn touch_heartbeat(&mut self, agent: &str, at: DateTime<Utc>) -> Result<(), DossierError>;

    /// Agent id -> last heartbeat.
    fn heartbeats(&self) -> Result<BTreeMap<String, DateTime<Utc>>, DossierError>;

    fn record_usage(&mut self, row: &UsageRow) -> Result<(), DossierError>;

    /// Usage rows created at or after `since`, newest first, optionally
    /// restricted to one agent.
    fn usage_since(
        &self,
        since: DateTime<Utc>,
        agent: Option<&str>,
    ) -> Result<Vec<UsageRow>, DossierError>;
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Runtime choice of store.
#[derive(Debug)]
pub enum StorageBackend {
    /// Volatile, lost on exit.
    InMemory(MemoryStore),
    /// Disk-backed redb database.
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open or create a redb database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DossierError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }
}

impl EntityStore for StorageBackend {
    fn fetch_entities(&self) -> Result<Vec<Entity>, DossierError> {
        match self {
            Self::InMemory(s) => s.fetch_entities(),
            Self::Persistent(s) => s.fetch_entities(),
        }
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, DossierError> {
        match self {
            Self::InMemory(s) => s.get_entity(id),
            Self::Persistent(s) => s.get_entity(id),
        }
    }

    fn insert_entity(&mut self, payload: &EntityPayload) -> Result<EntityId, DossierError> {
        match self {
            Self::InMemory(s) => s.insert_entity(payload),
            Self::Persistent(s) => s.insert_entity(payload),
        }
    }

    fn update_entity(
        &mut self,
        id: EntityId,
        payload: &EntityPayload,
    ) -> Result<(), DossierError> {
        match self {
            Self::InMemory(s) => s.update_entity(id, payload),
            Self::Persistent(s) => s.update_entity(id, payload),
        }
    }

    fn delete_entity(&mut self, id: EntityId) -> Result<usize, DossierError> {
        match self {
            Self::InMemory(s) => s.delete_entity(id),
            Self::Persistent(s) => s.delete_entity(id),
        }
    }

    fn insert_relationship(
        &mut self,
        relationship: &NewRelationship,
    ) -> Result<RelationshipId, DossierError> {
        match self {
            Self::InMemory(s) => s.insert_relationship(relationship),
            Self::Persistent(s) => s.insert_relationship(relationship),
        }
    }

    fn delete_relationship(&mut self, id: RelationshipId) -> Result<(), DossierError> {
        match self {
            Self::InMemory(s) => s.delete_relationship(id),
            Self::Persistent(s) => s.delete_relationship(id),
        }
    }

    fn counts(&self) -> Result<StoreCounts, DossierError> {
        match self {
            Self::InMemory(s) => s.counts(),
            Self::Persistent(s) => s.counts(),
        }
    }
}

impl AgentStore for StorageBackend {
    fn touch_heartbeat(&mut self, agent: &str, at: DateTime<Utc>) -> Result<(), DossierError> {
        match self {
            Self::InMemory(s) => s.touch_heartbeat(agent, at),
            Self::Persistent(s) => s.touch_heartbeat(agent, at),
        }
    }

    fn heartbeats(&self) -> Result<BTreeMap<String, DateTime<Utc>>, DossierError> {
        match self {
            Self::InMemory(s) => s.heartbeats(),
            Self::Persistent(s) => s.heartbeats(),
        }
    }

    fn record_usage(&mut self, row: &UsageRow) -> Result<(), DossierError> {
        match self {
            Self::InMemory(s) => s.record_usage(row),
            Self::Persistent(s) => s.record_usage(row),
        }
    }

    fn usage_since(
        &self,
        since: DateTime<Utc>,
        agent: Option<&str>,
    ) -> Result<Vec<UsageRow>, DossierError> {
        match self {
            Self::InMemory(s) => s.usage_since(since, agent),
            Self::Persistent(s) => s.usage_since(since, agent),
        }
    }
}

//! # dossier-core
//!
//! The entity registry engine for Dossier - THE LOGIC.
//!
//! Tracks entities (people, companies, funds, nonprofits ...) and a
//! free-form directed graph of typed relationships between them, plus the
//! catalog of agent deliverables and per-agent usage and heartbeats.
//!
//! ## Architectural Constraints
//!
//! - Synchronous, NO async, NO network dependencies (pure Rust)
//! - The store is constructed by the caller and injected; no global client
//! - Every mutation is followed by a full re-fetch; no local patching
//! - Money is integer micro-dollars
//!
//! The relationship graph is plain CRUD: no traversal, no cycle detection.

// =============================================================================
// MODULES
// =============================================================================

pub mod board;
pub mod deliverables;
pub mod detail;
pub mod filter;
pub mod form;
pub mod labels;
pub mod primitives;
pub mod relationship;
pub mod rows;
pub mod slug;
pub mod store;
pub mod types;
pub mod usage;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    DossierError, Entity, EntityId, EntityPayload, EntityRef, EntityStatus, EntityType, KeyPerson,
    Metadata, NewRelationship, RelationshipEdge, RelationshipId, RelationshipType,
};

// =============================================================================
// RE-EXPORTS: Registry
// =============================================================================

pub use board::{Confirmation, EntityBoard, UsageReport};
pub use detail::{Direction, EdgeLine, EntityDetail};
pub use filter::{EntityFilter, FilterMemo, StatusFilter, filter_entities};
pub use form::{EntityDraft, FormError, FormField, PersonPatch, SaveRequest};
pub use relationship::RelationshipDraft;
pub use rows::{ImportPlan, ImportSummary, plan_import};
pub use slug::{Slug, slugify};
pub use store::{AgentStore, EntityStore, MemoryStore, RedbStore, StorageBackend, StoreCounts};

// =============================================================================
// RE-EXPORTS: Deliverables & Usage
// =============================================================================

pub use deliverables::{
    Deliverable, DeliverableCatalog, DeliverableFilters, DeliverableStatus, DeliverableType,
};
pub use usage::{AgentUsage, UsageRow, UsageStats, UsageWindows};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{Entity, EntityId, EntityPayload, EntityStatus, EntityType, Metadata, Slug};
    use chrono::Utc;

    /// A minimal entity with no edges.
    pub fn entity(id: u64, name: &str, entity_type: EntityType, status: EntityStatus) -> Entity {
        let now = Utc::now();
        Entity {
            id: EntityId(id),
            slug: Slug::new(name).unwrap_or_else(|_| Slug::new("entity").expect("fallback slug")),
            name: name.to_string(),
            full_name: None,
            entity_type,
            description: None,
            key_people: Vec::new(),
            agent_instructions: "Public information only.".to_string(),
            financial_notes: None,
            tracking_focus: Vec::new(),
            status,
            icon: None,
            sort_order: 0,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    /// A valid payload with the slug derived from `name`.
    pub fn payload(name: &str, entity_type: EntityType) -> EntityPayload {
        EntityPayload {
            name: name.to_string(),
            full_name: None,
            slug: Slug::new(name).expect("name yields a slug"),
            entity_type,
            description: None,
            agent_instructions: "Public information only.".to_string(),
            financial_notes: None,
            tracking_focus: Vec::new(),
            key_people: Vec::new(),
            status: EntityStatus::Active,
            icon: None,
            sort_order: None,
            metadata: None,
        }
    }
}

//! # Core Type Definitions
//!
//! This module contains the data model of the registry:
//! - Identifiers (`EntityId`, `RelationshipId`)
//! - Classification enums (`EntityType`, `RelationshipType`, `EntityStatus`)
//! - Records (`Entity`, `KeyPerson`, `RelationshipEdge`, `EntityRef`)
//! - Write payloads (`EntityPayload`, `NewRelationship`)
//! - Error types (`DossierError`)
//!
//! Relationship edges are never stored on an entity. They are attached per
//! fetch as `outgoing` (entity is the source) and `incoming` (entity is the
//! target).

use crate::slug::Slug;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Open key/value bag carried on every entity. No logic reads it.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Store-assigned identifier of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identifier of a relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(pub u64);

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// What kind of node an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    FamilyOffice,
    OperatingCompany,
    InvestmentVehicle,
    VentureFund,
    Nonprofit,
    RealEstate,
    PublicCompany,
    Philanthropic,
}

impl EntityType {
    /// Every entity type, in display order.
    pub const ALL: [EntityType; 9] = [
        EntityType::Person,
        EntityType::FamilyOffice,
        EntityType::OperatingCompany,
        EntityType::InvestmentVehicle,
        EntityType::VentureFund,
        EntityType::Nonprofit,
        EntityType::RealEstate,
        EntityType::PublicCompany,
        EntityType::Philanthropic,
    ];

    /// Wire name (snake_case).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::FamilyOffice => "family_office",
            EntityType::OperatingCompany => "operating_company",
            EntityType::InvestmentVehicle => "investment_vehicle",
            EntityType::VentureFund => "venture_fund",
            EntityType::Nonprofit => "nonprofit",
            EntityType::RealEstate => "real_estate",
            EntityType::PublicCompany => "public_company",
            EntityType::Philanthropic => "philanthropic",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| DossierError::Validation(format!("Unknown entity type: {}", s)))
    }
}

/// The kind of a directed relationship edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    ParentOf,
    SubsidiaryOf,
    HoldsPositionIn,
    Operates,
    BoardMemberOf,
    #[default]
    AffiliatedWith,
    StakeholderIn,
    PhilanthropicTo,
}

impl RelationshipType {
    /// Every relationship type, in display order.
    pub const ALL: [RelationshipType; 8] = [
        RelationshipType::ParentOf,
        RelationshipType::SubsidiaryOf,
        RelationshipType::HoldsPositionIn,
        RelationshipType::Operates,
        RelationshipType::BoardMemberOf,
        RelationshipType::AffiliatedWith,
        RelationshipType::StakeholderIn,
        RelationshipType::PhilanthropicTo,
    ];

    /// Wire name (snake_case).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RelationshipType::ParentOf => "parent_of",
            RelationshipType::SubsidiaryOf => "subsidiary_of",
            RelationshipType::HoldsPositionIn => "holds_position_in",
            RelationshipType::Operates => "operates",
            RelationshipType::BoardMemberOf => "board_member_of",
            RelationshipType::AffiliatedWith => "affiliated_with",
            RelationshipType::StakeholderIn => "stakeholder_in",
            RelationshipType::PhilanthropicTo => "philanthropic_to",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| DossierError::Validation(format!("Unknown relationship type: {}", s)))
    }
}

/// Tracking status of an entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    #[default]
    Active,
    Watch,
    Inactive,
}

impl EntityStatus {
    pub const ALL: [EntityStatus; 3] = [
        EntityStatus::Active,
        EntityStatus::Watch,
        EntityStatus::Inactive,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Watch => "watch",
            EntityStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| DossierError::Validation(format!("Unknown status: {}", s)))
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A person attached to an entity. Rows are ordered and may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeyPerson {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Denormalized view of the far endpoint of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub slug: Slug,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

/// A directed, typed edge joined with both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub id: RelationshipId,
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub description: Option<String>,
    pub source: EntityRef,
    pub target: EntityRef,
}

/// A tracked organization or person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub slug: Slug,
    pub name: String,
    pub full_name: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub description: Option<String>,
    pub key_people: Vec<KeyPerson>,
    pub agent_instructions: String,
    pub financial_notes: Option<String>,
    pub tracking_focus: Vec<String>,
    pub status: EntityStatus,
    pub icon: Option<String>,
    pub sort_order: i32,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Edges where this entity is the source.
    #[serde(default)]
    pub outgoing: Vec<RelationshipEdge>,
    /// Edges where this entity is the target.
    #[serde(default)]
    pub incoming: Vec<RelationshipEdge>,
}

impl Entity {
    /// Reference used when this entity appears at the far end of an edge.
    #[must_use]
    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            id: self.id,
            slug: self.slug.clone(),
            name: self.name.clone(),
            entity_type: self.entity_type,
        }
    }

    /// Lowercased text searched by the free-text filter.
    #[must_use]
    pub fn search_haystack(&self) -> String {
        format!(
            "{} {} {} {}",
            self.name,
            self.full_name.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            self.agent_instructions
        )
        .to_lowercase()
    }

    /// Number of edges touching this entity in either direction.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.outgoing.len() + self.incoming.len()
    }
}

// =============================================================================
// WRITE PAYLOADS
// =============================================================================

/// Normalized entity fields sent to the store on insert or update.
///
/// `sort_order` and `metadata` are `None` when the caller does not manage
/// them: inserts fall back to `0` / `{}` and updates keep the stored values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    pub name: String,
    pub full_name: Option<String>,
    pub slug: Slug,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub description: Option<String>,
    pub agent_instructions: String,
    pub financial_notes: Option<String>,
    pub tracking_focus: Vec<String>,
    pub key_people: Vec<KeyPerson>,
    pub status: EntityStatus,
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// A new directed edge, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelationship {
    pub source_entity_id: EntityId,
    pub target_entity_id: EntityId,
    pub relationship_type: RelationshipType,
    pub description: Option<String>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the registry.
///
/// - No silent failures
/// - Use `Result<T, DossierError>` for fallible operations
/// - The core never panics; every error is recoverable
#[derive(Debug, Error)]
pub enum DossierError {
    /// The referenced entity does not exist.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The referenced relationship edge does not exist.
    #[error("Relationship not found: {0}")]
    RelationshipNotFound(RelationshipId),

    /// Another entity already owns this slug.
    #[error("Slug already in use: {0}")]
    SlugTaken(String),

    /// Client-side validation rejected the input.
    #[error("{0}")]
    Validation(String),

    /// A row from an external source had an unexpected shape.
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// A destructive operation was attempted without confirmation.
    #[error("Deleting {0} requires confirmation; it also removes every relationship involving it")]
    ConfirmationRequired(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_wire_names_roundtrip() {
        for t in EntityType::ALL {
            assert_eq!(t.as_str().parse::<EntityType>().unwrap(), t);
        }
        assert!("hedge_fund".parse::<EntityType>().is_err());
    }

    #[test]
    fn relationship_type_defaults_to_affiliated() {
        assert_eq!(RelationshipType::default(), RelationshipType::AffiliatedWith);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&EntityType::OperatingCompany).unwrap();
        assert_eq!(json, "\"operating_company\"");
        let status: EntityStatus = serde_json::from_str("\"watch\"").unwrap();
        assert_eq!(status, EntityStatus::Watch);
    }

    #[test]
    fn status_defaults_to_active() {
        assert_eq!(EntityStatus::default(), EntityStatus::Active);
    }
}

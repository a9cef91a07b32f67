//! # Entity Detail
//!
//! Everything shown for one selected entity: the record, its labelled
//! edges in both directions, and the deliverables linked to it.

use crate::deliverables::{Deliverable, DeliverableCatalog, DeliverableFilters};
use crate::labels::{entity_type_label, needs_critical_accent, relationship_label};
use crate::primitives::DETAIL_DELIVERABLE_LIMIT;
use crate::{DossierError, Entity, EntityRef, RelationshipEdge, RelationshipId, RelationshipType};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which end of the edge the viewed entity is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The viewed entity is the source.
    Outgoing,
    /// The viewed entity is the target.
    Incoming,
}

/// One edge as seen from the viewed entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeLine {
    pub id: RelationshipId,
    pub direction: Direction,
    pub relationship_type: RelationshipType,
    pub label: &'static str,
    /// The far endpoint, for navigation.
    pub other: EntityRef,
    pub description: Option<String>,
}

impl EdgeLine {
    fn from_edge(edge: &RelationshipEdge, direction: Direction) -> Self {
        let other = match direction {
            Direction::Outgoing => edge.target.clone(),
            Direction::Incoming => edge.source.clone(),
        };
        Self {
            id: edge.id,
            direction,
            relationship_type: edge.relationship_type,
            label: relationship_label(edge.relationship_type),
            other,
            description: edge.description.clone(),
        }
    }

    /// "is board member of Acme" / "Jane Barnett is board member of".
    #[must_use]
    pub fn sentence(&self) -> String {
        match self.direction {
            Direction::Outgoing => format!("{} {}", self.label, self.other.name),
            Direction::Incoming => format!("{} {}", self.other.name, self.label),
        }
    }
}

fn date_label(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
}

/// Detail view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetail {
    pub entity: Entity,
    pub type_label: &'static str,
    /// Instructions mention `CRITICAL` or `DO NOT`.
    pub critical_guardrails: bool,
    /// `full_name` is set and differs from `name`.
    pub show_full_name: bool,
    pub outgoing: Vec<EdgeLine>,
    pub incoming: Vec<EdgeLine>,
    /// Newest linked deliverables, at most `DETAIL_DELIVERABLE_LIMIT`.
    pub deliverables: Vec<Deliverable>,
    /// Count of all linked deliverables.
    pub deliverable_total: usize,
    /// Deliverable feed query listing all of them.
    pub view_all_query: String,
    pub created_label: String,
    pub updated_label: String,
}

impl EntityDetail {
    pub fn build(entity: &Entity, catalog: &DeliverableCatalog) -> Result<Self, DossierError> {
        let linked = catalog.for_project(&entity.slug);
        let deliverable_total = linked.len();
        let deliverables = linked
            .into_iter()
            .take(DETAIL_DELIVERABLE_LIMIT)
            .cloned()
            .collect();

        let show_full_name = entity
            .full_name
            .as_deref()
            .is_some_and(|full| !full.is_empty() && full != entity.name);

        Ok(Self {
            entity: entity.clone(),
            type_label: entity_type_label(entity.entity_type),
            critical_guardrails: needs_critical_accent(&entity.agent_instructions),
            show_full_name,
            outgoing: entity
                .outgoing
                .iter()
                .map(|e| EdgeLine::from_edge(e, Direction::Outgoing))
                .collect(),
            incoming: entity
                .incoming
                .iter()
                .map(|e| EdgeLine::from_edge(e, Direction::Incoming))
                .collect(),
            deliverables,
            deliverable_total,
            view_all_query: DeliverableFilters::for_project(entity.slug.clone()).to_query()?,
            created_label: date_label(entity.created_at),
            updated_label: date_label(entity.updated_at),
        })
    }

    /// True when the entity has no edges in either direction.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.outgoing.is_empty() && self.incoming.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::slug::Slug;
    use crate::test_support::entity;
    use crate::{EntityId, EntityStatus, EntityType};
    use chrono::TimeZone;

    #[test]
    fn edges_are_labelled_from_both_ends() {
        let mut jane = entity(1, "Jane Barnett", EntityType::Person, EntityStatus::Active);
        let acme = entity(2, "Acme", EntityType::OperatingCompany, EntityStatus::Active);
        let edge = RelationshipEdge {
            id: RelationshipId(9),
            relationship_type: RelationshipType::BoardMemberOf,
            description: None,
            source: jane.to_ref(),
            target: acme.to_ref(),
        };
        jane.outgoing.push(edge.clone());
        let mut acme = acme;
        acme.incoming.push(edge);

        let catalog = DeliverableCatalog::default();
        let jane_view = EntityDetail::build(&jane, &catalog).unwrap();
        let acme_view = EntityDetail::build(&acme, &catalog).unwrap();

        assert_eq!(jane_view.outgoing[0].label, "is board member of");
        assert_eq!(jane_view.outgoing[0].other.id, EntityId(2));
        assert_eq!(jane_view.outgoing[0].sentence(), "is board member of Acme");
        assert_eq!(acme_view.incoming[0].label, "is board member of");
        assert_eq!(acme_view.incoming[0].other.id, EntityId(1));
        assert_eq!(
            acme_view.incoming[0].sentence(),
            "Jane Barnett is board member of"
        );
    }

    #[test]
    fn linked_deliverables_are_capped_and_newest_first() {
        let catalog = DeliverableCatalog::builtin().unwrap();
        let mut ops = entity(1, "BASeD Operations", EntityType::FamilyOffice, EntityStatus::Active);
        ops.slug = Slug::new("based-operations").unwrap();

        let view = EntityDetail::build(&ops, &catalog).unwrap();
        assert_eq!(view.deliverable_total, 4);
        assert_eq!(view.deliverables.len(), 4);
        assert_eq!(view.deliverables[0].id, "based-team-overview-v3");
        assert_eq!(view.view_all_query, "project=based-operations");
    }

    #[test]
    fn full_name_and_guardrail_flags() {
        let mut e = entity(1, "Acme", EntityType::PublicCompany, EntityStatus::Watch);
        e.full_name = Some("Acme".to_string());
        e.agent_instructions = "DO NOT trade on this name.".to_string();
        let view = EntityDetail::build(&e, &DeliverableCatalog::default()).unwrap();
        assert!(!view.show_full_name);
        assert!(view.critical_guardrails);
        assert!(view.is_isolated());
    }

    #[test]
    fn dates_use_short_month() {
        let mut e = entity(1, "Acme", EntityType::PublicCompany, EntityStatus::Active);
        e.created_at = Utc.with_ymd_and_hms(2026, 2, 5, 10, 0, 0).unwrap();
        let view = EntityDetail::build(&e, &DeliverableCatalog::default()).unwrap();
        assert_eq!(view.created_label, "Feb 5, 2026");
    }
}

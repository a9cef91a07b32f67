//! # Property-Based Tests
//!
//! Invariants of slug derivation, the entity filter and edge removal.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::Utc;
use dossier_core::{
    DeliverableCatalog, Entity, EntityBoard, EntityDraft, EntityFilter, EntityId, EntityStatus,
    EntityType, Metadata, RelationshipDraft, RelationshipId, RelationshipType, Slug,
    StatusFilter, StorageBackend, filter_entities, slugify,
};
use std::collections::BTreeSet;
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;

// =============================================================================
// STRATEGIES
// =============================================================================

fn entity_type() -> impl Strategy<Value = EntityType> {
    prop::sample::select(EntityType::ALL.to_vec())
}

fn entity_status() -> impl Strategy<Value = EntityStatus> {
    prop::sample::select(EntityStatus::ALL.to_vec())
}

fn status_filter() -> impl Strategy<Value = StatusFilter> {
    prop::sample::select(vec![
        StatusFilter::All,
        StatusFilter::Active,
        StatusFilter::Watch,
        StatusFilter::Inactive,
    ])
}

fn relationship_type() -> impl Strategy<Value = RelationshipType> {
    prop::sample::select(RelationshipType::ALL.to_vec())
}

/// Every edge id on the board, collected from the outgoing lists.
fn edge_ids(board: &EntityBoard) -> BTreeSet<RelationshipId> {
    board
        .entities()
        .iter()
        .flat_map(|e| e.outgoing.iter().map(|edge| edge.id))
        .collect()
}

fn make_entity(
    id: u64,
    name: String,
    description: Option<String>,
    entity_type: EntityType,
    status: EntityStatus,
) -> Entity {
    let now = Utc::now();
    Entity {
        id: EntityId(id),
        slug: Slug::new(&format!("entity {}", id)).expect("non-empty slug"),
        name,
        full_name: None,
        entity_type,
        description,
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

fn entities() -> impl Strategy<Value = Vec<Entity>> {
    vec(
        (
            "[A-Za-z ]{1,16}",
            prop::option::of("[a-z ]{0,24}"),
            entity_type(),
            entity_status(),
        ),
        0..30,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (name, description, t, s))| make_entity(i as u64, name, description, t, s))
            .collect()
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Slugifying twice changes nothing.
    #[test]
    fn slugify_is_idempotent(input in any::<String>()) {
        let once = slugify(&input);
        prop_assert_eq!(slugify(&once), once);
    }

    /// Output is lowercase alphanumerics separated by single hyphens.
    #[test]
    fn slugify_output_shape(input in "\\PC{0,40}") {
        let slug = slugify(&input);
        prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.ends_with('-'));
        prop_assert!(!slug.contains("--"));
    }

    /// The filter returns exactly the entities satisfying every criterion,
    /// in list order.
    #[test]
    fn filter_returns_exact_predicate_subset(
        list in entities(),
        types in btree_set(entity_type(), 0..4),
        status in status_filter(),
        search in "[a-z]{0,3}",
    ) {
        let filter = EntityFilter { types: types.clone(), status, search: search.clone() };
        let got: Vec<EntityId> = filter_entities(&list, &filter).iter().map(|e| e.id).collect();

        let expected: Vec<EntityId> = list
            .iter()
            .filter(|e| types.is_empty() || types.contains(&e.entity_type))
            .filter(|e| match status {
                StatusFilter::All => true,
                StatusFilter::Active => e.status == EntityStatus::Active,
                StatusFilter::Watch => e.status == EntityStatus::Watch,
                StatusFilter::Inactive => e.status == EntityStatus::Inactive,
            })
            .filter(|e| {
                let haystack = format!(
                    "{} {} {} {}",
                    e.name,
                    e.full_name.clone().unwrap_or_default(),
                    e.description.clone().unwrap_or_default(),
                    e.agent_instructions
                )
                .to_lowercase();
                haystack.contains(&search)
            })
            .map(|e| e.id)
            .collect();

        prop_assert_eq!(got, expected);
    }

    /// An empty filter keeps every entity.
    #[test]
    fn empty_filter_is_identity(list in entities()) {
        let got = filter_entities(&list, &EntityFilter::default()).len();
        prop_assert_eq!(got, list.len());
    }

    /// Removing one edge removes exactly that edge, even among duplicates
    /// and self-loops.
    #[test]
    fn removing_an_edge_removes_exactly_that_edge(
        size in 2usize..6,
        links in vec((0usize..6, 0usize..6, relationship_type()), 1..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut board = EntityBoard::new(StorageBackend::in_memory(), DeliverableCatalog::default());
        let mut ids = Vec::new();
        for i in 0..size {
            let mut draft = EntityDraft::create();
            draft.set_name(format!("Entity {}", i));
            draft.agent_instructions = "Public information only.".to_string();
            ids.push(board.save(&draft).unwrap());
        }

        for (source, target, kind) in links {
            let mut draft = RelationshipDraft::new(ids[source % size]);
            draft.target = Some(ids[target % size]);
            draft.relationship_type = kind;
            board.add_relationship(&draft).unwrap();
        }

        let before = edge_ids(&board);
        let victim = *pick.get(&before.iter().copied().collect::<Vec<_>>());
        board.remove_relationship(victim).unwrap();

        let mut expected = before;
        expected.remove(&victim);
        prop_assert_eq!(edge_ids(&board), expected);
        prop_assert_eq!(board.entities().len(), size);
    }
}

//! # Relationship Draft
//!
//! Form state for adding one directed edge from a fixed source entity.

use crate::labels::relationship_label;
use crate::{Entity, EntityId, NewRelationship, RelationshipType};
use thiserror::Error;

/// The draft has no target selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Select a target entity.")]
pub struct MissingTarget;

impl From<MissingTarget> for crate::DossierError {
    fn from(err: MissingTarget) -> Self {
        crate::DossierError::Validation(err.to_string())
    }
}

/// Editable edge form.
///
/// Duplicate and symmetric edges are allowed; the draft only requires a
/// target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDraft {
    source: EntityId,
    pub relationship_type: RelationshipType,
    pub target: Option<EntityId>,
    pub description: String,
}

impl RelationshipDraft {
    /// New draft with the default type `affiliated_with`.
    #[must_use]
    pub fn new(source: EntityId) -> Self {
        Self {
            source,
            relationship_type: RelationshipType::default(),
            target: None,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> EntityId {
        self.source
    }

    /// Prompt shown next to the type picker, e.g. "This entity is board
    /// member of".
    #[must_use]
    pub fn prompt(&self) -> String {
        format!("This entity {}", relationship_label(self.relationship_type))
    }

    /// Candidate targets: every entity except the source.
    #[must_use]
    pub fn target_options<'a>(&self, entities: &'a [Entity]) -> Vec<&'a Entity> {
        entities.iter().filter(|e| e.id != self.source).collect()
    }

    pub fn submit(&self) -> Result<NewRelationship, MissingTarget> {
        let target = self.target.ok_or(MissingTarget)?;
        let description = self.description.trim();
        Ok(NewRelationship {
            source_entity_id: self.source,
            target_entity_id: target,
            relationship_type: self.relationship_type,
            description: (!description.is_empty()).then(|| description.to_string()),
        })
    }
}

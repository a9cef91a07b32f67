//! # Entity Draft
//!
//! Create/edit form state for an entity, and its validation.
//!
//! A draft is plain editable text. `submit` validates it and produces a
//! normalized `SaveRequest`; nothing reaches a store unless `submit`
//! succeeded, so an invalid draft never causes a write.

use crate::slug::{Slug, slugify};
use crate::{DossierError, Entity, EntityId, EntityPayload, EntityStatus, EntityType, KeyPerson};
use thiserror::Error;

/// Fields that validation can reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Slug,
    Type,
    AgentInstructions,
}

/// First validation failure of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FormError {
    pub field: FormField,
    pub message: &'static str,
}

impl FormError {
    const fn new(field: FormField, message: &'static str) -> Self {
        Self { field, message }
    }
}

impl From<FormError> for DossierError {
    fn from(err: FormError) -> Self {
        DossierError::Validation(err.message.to_string())
    }
}

/// Validated write, ready for a store.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest {
    Insert(EntityPayload),
    Update { id: EntityId, payload: EntityPayload },
}

impl SaveRequest {
    #[must_use]
    pub fn payload(&self) -> &EntityPayload {
        match self {
            SaveRequest::Insert(payload) | SaveRequest::Update { payload, .. } => payload,
        }
    }
}

/// Partial update of one key-person row. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonPatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub notes: Option<String>,
}

/// Editable entity form.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDraft {
    editing: Option<EntityId>,
    name: String,
    slug: String,
    pub full_name: String,
    /// `None` only when a caller explicitly clears it.
    pub entity_type: Option<EntityType>,
    pub icon: String,
    pub description: String,
    pub agent_instructions: String,
    pub financial_notes: String,
    /// One focus item per line.
    pub tracking_focus: String,
    pub key_people: Vec<KeyPerson>,
    pub status: EntityStatus,
}

impl Default for EntityDraft {
    fn default() -> Self {
        Self::create()
    }
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl EntityDraft {
    /// Empty draft for a new entity: type `person`, status `active`.
    #[must_use]
    pub fn create() -> Self {
        Self {
            editing: None,
            name: String::new(),
            slug: String::new(),
            full_name: String::new(),
            entity_type: Some(EntityType::Person),
            icon: String::new(),
            description: String::new(),
            agent_instructions: String::new(),
            financial_notes: String::new(),
            tracking_focus: String::new(),
            key_people: Vec::new(),
            status: EntityStatus::Active,
        }
    }

    /// Draft pre-filled from an existing entity.
    #[must_use]
    pub fn edit(entity: &Entity) -> Self {
        Self {
            editing: Some(entity.id),
            name: entity.name.clone(),
            slug: entity.slug.to_string(),
            full_name: entity.full_name.clone().unwrap_or_default(),
            entity_type: Some(entity.entity_type),
            icon: entity.icon.clone().unwrap_or_default(),
            description: entity.description.clone().unwrap_or_default(),
            agent_instructions: entity.agent_instructions.clone(),
            financial_notes: entity.financial_notes.clone().unwrap_or_default(),
            tracking_focus: entity.tracking_focus.join("\n"),
            key_people: entity.key_people.clone(),
            status: entity.status,
        }
    }

    #[must_use]
    pub fn editing(&self) -> Option<EntityId> {
        self.editing
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Set the name. While creating, the slug follows the name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        if self.editing.is_none() {
            self.slug = slugify(&self.name);
        }
    }

    /// Set the slug directly. It is slugified on submit.
    pub fn set_slug(&mut self, slug: impl Into<String>) {
        self.slug = slug.into();
    }

    /// Append an empty key-person row.
    pub fn add_person(&mut self) {
        self.key_people.push(KeyPerson::default());
    }

    /// Patch one row. Returns `false` if `index` is out of range.
    pub fn update_person(&mut self, index: usize, patch: PersonPatch) -> bool {
        let Some(person) = self.key_people.get_mut(index) else {
            return false;
        };
        if let Some(name) = patch.name {
            person.name = name;
        }
        if let Some(role) = patch.role {
            person.role = role;
        }
        if let Some(notes) = patch.notes {
            person.notes = Some(notes);
        }
        true
    }

    /// Remove one row. Returns `false` if `index` is out of range.
    pub fn remove_person(&mut self, index: usize) -> bool {
        if index < self.key_people.len() {
            self.key_people.remove(index);
            true
        } else {
            false
        }
    }

    /// Validate and normalize.
    ///
    /// Checks run in order name, slug, type, agent instructions; the first
    /// failure is returned.
    pub fn submit(&self) -> Result<SaveRequest, FormError> {
        if self.name.trim().is_empty() {
            return Err(FormError::new(FormField::Name, "Name is required."));
        }
        let slug = Slug::new(self.slug.trim())
            .map_err(|_| FormError::new(FormField::Slug, "Slug is required."))?;
        let entity_type = self
            .entity_type
            .ok_or(FormError::new(FormField::Type, "Type is required."))?;
        if self.agent_instructions.trim().is_empty() {
            return Err(FormError::new(
                FormField::AgentInstructions,
                "Agent instructions are required.",
            ));
        }

        let key_people = self
            .key_people
            .iter()
            .filter(|p| !p.name.trim().is_empty() && !p.role.trim().is_empty())
            .map(|p| KeyPerson {
                name: trimmed(&p.name),
                role: trimmed(&p.role),
                notes: p.notes.as_deref().and_then(optional),
            })
            .collect();

        let tracking_focus = self
            .tracking_focus
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let payload = EntityPayload {
            name: trimmed(&self.name),
            full_name: optional(&self.full_name),
            slug,
            entity_type,
            description: optional(&self.description),
            agent_instructions: trimmed(&self.agent_instructions),
            financial_notes: optional(&self.financial_notes),
            tracking_focus,
            key_people,
            status: self.status,
            icon: optional(&self.icon),
            sort_order: None,
            metadata: None,
        };

        Ok(match self.editing {
            Some(id) => SaveRequest::Update { id, payload },
            None => SaveRequest::Insert(payload),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

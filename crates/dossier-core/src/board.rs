//! # Entity Board
//!
//! The registry as a whole: an injected store, the last fetched entity
//! list, the filter over it, the selection, and the deliverable catalog.
//!
//! Every mutation goes to the store and is followed by a full re-fetch.
//! The list is never patched locally. A failed fetch empties the list and
//! leaves a visible error string; it never panics.

use crate::deliverables::DeliverableCatalog;
use crate::detail::EntityDetail;
use crate::filter::{EntityFilter, FilterMemo, StatusFilter};
use crate::form::{EntityDraft, SaveRequest};
use crate::primitives::MAX_AGENT_ID_LENGTH;
use crate::relationship::RelationshipDraft;
use crate::rows::{ImportPlan, ImportSummary};
use crate::store::{AgentStore, EntityStore, StorageBackend, StoreCounts};
use crate::usage::{self, AgentUsage, UsageRow, UsageWindows};
use crate::{DossierError, Entity, EntityId, EntityType, RelationshipId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Explicit consent for a destructive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Unconfirmed,
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Unconfirmed
        }
    }
}

/// Usage rollup for one agent or for all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UsageReport {
    Agent(AgentUsage),
    All(BTreeMap<String, UsageWindows>),
}

/// Trimmed, bounded agent id.
pub fn validate_agent_id(agent: &str) -> Result<&str, DossierError> {
    let agent = agent.trim();
    if agent.is_empty() {
        return Err(DossierError::Validation("agentId required".to_string()));
    }
    if agent.len() > MAX_AGENT_ID_LENGTH {
        return Err(DossierError::Validation(format!(
            "agentId longer than {} bytes",
            MAX_AGENT_ID_LENGTH
        )));
    }
    Ok(agent)
}

/// Registry state over an injected store.
#[derive(Debug)]
pub struct EntityBoard {
    store: StorageBackend,
    catalog: DeliverableCatalog,
    entities: Vec<Entity>,
    error: Option<String>,
    revision: u64,
    filter: EntityFilter,
    memo: FilterMemo,
    selected: Option<EntityId>,
}

impl EntityBoard {
    /// Wrap a store and load the entity list.
    pub fn new(store: StorageBackend, catalog: DeliverableCatalog) -> Self {
        let mut board = Self {
            store,
            catalog,
            entities: Vec::new(),
            error: None,
            revision: 0,
            filter: EntityFilter::default(),
            memo: FilterMemo::new(),
            selected: None,
        };
        board.refresh();
        board
    }

    // =========================================================================
    // FETCH
    // =========================================================================

    /// Re-fetch every entity. Returns `false` if the fetch failed.
    pub fn refresh(&mut self) -> bool {
        let ok = match self.store.fetch_entities() {
            Ok(list) => {
                self.entities = list;
                self.error = None;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "entity fetch failed");
                self.entities.clear();
                self.error = Some(e.to_string());
                false
            }
        };
        self.revision = self.revision.wrapping_add(1);
        let entities = &self.entities;
        if self
            .selected
            .is_some_and(|id| !entities.iter().any(|e| e.id == id))
        {
            self.selected = None;
        }
        ok
    }

    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Last fetch or mutation error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn catalog(&self) -> &DeliverableCatalog {
        &self.catalog
    }

    pub fn counts(&self) -> Result<StoreCounts, DossierError> {
        self.store.counts()
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    // =========================================================================
    // FILTER
    // =========================================================================

    #[must_use]
    pub fn filter(&self) -> &EntityFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: EntityFilter) {
        self.filter = filter;
    }

    pub fn toggle_type(&mut self, entity_type: EntityType) {
        self.filter.toggle_type(entity_type);
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.filter.status = status;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
    }

    /// Entities passing the current filter, in list order.
    pub fn visible(&mut self) -> Vec<&Entity> {
        let Self {
            memo,
            entities,
            filter,
            revision,
            ..
        } = self;
        memo.get_or_compute(*revision, entities, filter)
            .iter()
            .filter_map(|&i| entities.get(i))
            .collect()
    }

    // =========================================================================
    // SELECTION & DETAIL
    // =========================================================================

    /// Select an entity from the current list.
    pub fn select(&mut self, id: EntityId) -> Option<&Entity> {
        let entity = self.entities.iter().find(|e| e.id == id)?;
        self.selected = Some(id);
        Some(entity)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Entity> {
        let id = self.selected?;
        self.entities.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn find(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn find_by_slug(&self, slug: &str) -> Option<&Entity> {
        let slug = slug.trim();
        self.entities.iter().find(|e| e.slug.as_str() == slug)
    }

    /// Look an entity up by slug, then by id when `key` is numeric.
    ///
    /// Slugs may be all digits (an entity named "1"), so an exact slug
    /// match always wins over an id.
    #[must_use]
    pub fn find_by_key(&self, key: &str) -> Option<&Entity> {
        self.find_by_slug(key).or_else(|| {
            key.trim()
                .parse::<u64>()
                .ok()
                .and_then(|id| self.find(EntityId(id)))
        })
    }

    pub fn detail(&self, id: EntityId) -> Result<EntityDetail, DossierError> {
        let entity = self.find(id).ok_or(DossierError::EntityNotFound(id))?;
        EntityDetail::build(entity, &self.catalog)
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    fn after_mutation<T>(&mut self, result: Result<T, DossierError>) -> Result<T, DossierError> {
        self.refresh();
        if let Err(e) = &result {
            self.error = Some(e.to_string());
        }
        result
    }

    /// Validate the draft and write it. Nothing is written if validation
    /// fails.
    pub fn save(&mut self, draft: &EntityDraft) -> Result<EntityId, DossierError> {
        let request = draft.submit()?;
        let result = match &request {
            SaveRequest::Insert(payload) => self.store.insert_entity(payload),
            SaveRequest::Update { id, payload } => {
                self.store.update_entity(*id, payload).map(|()| *id)
            }
        };
        if let Ok(id) = &result {
            tracing::info!(entity = %id, slug = %request.payload().slug, "entity saved");
        }
        self.after_mutation(result)
    }

    /// Delete an entity and all of its edges. Requires confirmation.
    pub fn delete_entity(
        &mut self,
        id: EntityId,
        confirmation: Confirmation,
    ) -> Result<usize, DossierError> {
        if confirmation != Confirmation::Confirmed {
            let name = self
                .find(id)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| id.to_string());
            return Err(DossierError::ConfirmationRequired(name));
        }
        let result = self.store.delete_entity(id);
        if let Ok(removed_edges) = &result {
            tracing::info!(entity = %id, removed_edges, "entity deleted");
        }
        self.after_mutation(result)
    }

    pub fn add_relationship(
        &mut self,
        draft: &RelationshipDraft,
    ) -> Result<RelationshipId, DossierError> {
        let relationship = draft.submit()?;
        let result = self.store.insert_relationship(&relationship);
        self.after_mutation(result)
    }

    /// Remove exactly one edge.
    pub fn remove_relationship(&mut self, id: RelationshipId) -> Result<(), DossierError> {
        let result = self.store.delete_relationship(id);
        self.after_mutation(result)
    }

    pub fn import(&mut self, plan: &ImportPlan) -> Result<ImportSummary, DossierError> {
        let result = plan.apply(&mut self.store);
        self.after_mutation(result)
    }

    // =========================================================================
    // AGENTS
    // =========================================================================

    /// Stamp an agent as alive now.
    pub fn heartbeat(&mut self, agent: &str, now: DateTime<Utc>) -> Result<(), DossierError> {
        let agent = validate_agent_id(agent)?;
        self.store.touch_heartbeat(agent, now)
    }

    pub fn heartbeats(&self) -> Result<BTreeMap<String, DateTime<Utc>>, DossierError> {
        self.store.heartbeats()
    }

    /// Append one usage row under its trimmed agent id.
    pub fn record_usage(&mut self, row: &UsageRow) -> Result<(), DossierError> {
        let agent = validate_agent_id(&row.agent)?.to_string();
        self.store.record_usage(&UsageRow {
            agent,
            ..row.clone()
        })
    }

    /// Rollup of the last month of usage, for one agent or all of them.
    pub fn usage_report(
        &self,
        agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UsageReport, DossierError> {
        let agent = agent.map(str::trim).filter(|a| !a.is_empty());
        let rows = self.store.usage_since(usage::month_start(now), agent)?;
        Ok(match agent {
            Some(agent) => UsageReport::Agent(usage::rollup_agent(agent, &rows, now)),
            None => UsageReport::All(usage::rollup_all(&rows, now)),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::EntityStatus;

    fn board() -> EntityBoard {
        EntityBoard::new(StorageBackend::in_memory(), DeliverableCatalog::default())
    }

    fn draft(name: &str, entity_type: EntityType) -> EntityDraft {
        let mut draft = EntityDraft::create();
        draft.set_name(name);
        draft.entity_type = Some(entity_type);
        draft.agent_instructions = "Public information only.".to_string();
        draft
    }

    #[test]
    fn save_refreshes_the_list() {
        let mut board = board();
        let before = board.revision();
        let id = board.save(&draft("Acme", EntityType::OperatingCompany)).unwrap();
        assert!(board.revision() > before);
        assert_eq!(board.entities().len(), 1);
        assert_eq!(board.find(id).unwrap().slug.as_str(), "acme");
    }

    #[test]
    fn invalid_draft_never_reaches_the_store() {
        let mut board = board();
        let mut d = draft("Acme", EntityType::OperatingCompany);
        d.agent_instructions = "   ".to_string();
        let before = board.revision();
        let err = board.save(&d).unwrap_err();
        assert_eq!(err.to_string(), "Agent instructions are required.");
        assert_eq!(board.revision(), before);
        assert_eq!(board.counts().unwrap().entities, 0);
    }

    #[test]
    fn store_error_is_kept_visible() {
        let mut board = board();
        board.save(&draft("Acme", EntityType::OperatingCompany)).unwrap();
        let err = board
            .save(&draft("ACME", EntityType::PublicCompany))
            .unwrap_err();
        assert!(matches!(err, DossierError::SlugTaken(_)));
        assert_eq!(board.error(), Some("Slug already in use: acme"));
        assert_eq!(board.entities().len(), 1);
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut board = board();
        let id = board.save(&draft("Acme", EntityType::OperatingCompany)).unwrap();
        let err = board.delete_entity(id, Confirmation::Unconfirmed).unwrap_err();
        assert!(matches!(err, DossierError::ConfirmationRequired(n) if n == "Acme"));
        assert_eq!(board.entities().len(), 1);

        board.delete_entity(id, true.into()).unwrap();
        assert!(board.entities().is_empty());
    }

    #[test]
    fn visible_applies_filter_and_selection_survives_refresh() {
        let mut board = board();
        let a = board.save(&draft("Acme Fund", EntityType::VentureFund)).unwrap();
        let mut watch = draft("Acme Fund II", EntityType::VentureFund);
        watch.status = EntityStatus::Watch;
        board.save(&watch).unwrap();

        board.set_status(StatusFilter::Watch);
        board.set_search("fund");
        let names: Vec<_> = board.visible().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["Acme Fund II"]);

        board.select(a).unwrap();
        board.refresh();
        assert_eq!(board.selected().unwrap().id, a);

        board.delete_entity(a, Confirmation::Confirmed).unwrap();
        assert!(board.selected().is_none());
    }

    #[test]
    fn find_by_key_accepts_id_or_slug() {
        let mut board = board();
        let id = board.save(&draft("Parker Street", EntityType::RealEstate)).unwrap();
        assert_eq!(board.find_by_key(&id.to_string()).unwrap().id, id);
        assert_eq!(board.find_by_key("parker-street").unwrap().id, id);
        assert!(board.find_by_key("nowhere").is_none());
    }

    #[test]
    fn numeric_slug_wins_over_id() {
        let mut board = board();
        let alpha = board.save(&draft("Alpha", EntityType::Person)).unwrap();
        board.save(&draft("Beta", EntityType::Person)).unwrap();
        let one = board.save(&draft("1", EntityType::Person)).unwrap();
        assert_eq!(board.find(one).unwrap().slug.as_str(), "1");

        assert_eq!(board.find_by_key("1").unwrap().id, one);
        assert_eq!(board.find_by_slug("1").unwrap().id, one);
        assert_eq!(board.find_by_key(&alpha.to_string()).unwrap().id, alpha);
        assert!(board.find_by_slug(&alpha.to_string()).is_none());

        let target = board.find_by_key("1").unwrap().id;
        board.delete_entity(target, Confirmation::Confirmed).unwrap();
        let names: Vec<_> = board.entities().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn usage_is_stored_under_trimmed_agent() {
        let mut board = board();
        let now = Utc::now();
        board
            .record_usage(&UsageRow {
                agent: " ace ".to_string(),
                results: "{}".to_string(),
                api_cost_micros: 0,
                created_at: now,
            })
            .unwrap();

        match board.usage_report(None, now).unwrap() {
            UsageReport::All(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["ace"]);
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn heartbeat_requires_agent_id() {
        let mut board = board();
        let err = board.heartbeat("  ", Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "agentId required");
        board.heartbeat("ace", Utc::now()).unwrap();
        assert!(board.heartbeats().unwrap().contains_key("ace"));
    }

    #[test]
    fn usage_report_shapes() {
        let mut board = board();
        let now = Utc::now();
        board
            .record_usage(&UsageRow {
                agent: "ace".to_string(),
                results: r#"{"tokens_in": 5, "tokens_out": 5}"#.to_string(),
                api_cost_micros: 10_000,
                created_at: now,
            })
            .unwrap();

        match board.usage_report(Some("ace"), now).unwrap() {
            UsageReport::Agent(usage) => assert_eq!(usage.windows.day.total_tokens, 10),
            other => panic!("expected agent report, got {:?}", other),
        }
        match board.usage_report(None, now).unwrap() {
            UsageReport::All(map) => assert_eq!(map["ace"].month.cost_cents, 1),
            other => panic!("expected map, got {:?}", other),
        }
    }
}

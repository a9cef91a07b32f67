//! # API Endpoint Handlers
//!
//! Every handler locks the board, calls one board operation and maps the
//! result. Writes take the write lock, so mutations are serialized.

use super::{
    AppState,
    error::{ApiError, ApiResult},
    types::{
        DeleteQuery, DeleteResponse, DeliverableListResponse, EntityCard, EntityKey, EntityListQuery,
        EntityListResponse, EntityRequest, ErrorResponse, HealthResponse, HeartbeatRequest,
        OkResponse, ProjectOption, RelationshipCreated, RelationshipRequest, UsageQuery,
        UsageRecordRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use dossier_core::{
    Confirmation, DeliverableFilters, DossierError, Entity, EntityBoard, EntityDetail, EntityId,
    RelationshipDraft, RelationshipId, UsageReport,
};
use std::collections::BTreeMap;

/// Resolve a path key (numeric id or slug) against the current list.
fn resolve(board: &EntityBoard, key: &str) -> ApiResult<EntityId> {
    board
        .find_by_key(key)
        .map(|e| e.id)
        .ok_or_else(|| ApiError::NotFound(key.to_string()))
}

/// Resolve a JSON key. A string is always a slug, a number always an id.
fn resolve_json_key(board: &EntityBoard, key: &EntityKey) -> ApiResult<EntityId> {
    let found = match key {
        EntityKey::Id(id) => board.find(EntityId(*id)),
        EntityKey::Slug(slug) => board.find_by_slug(slug),
    };
    found
        .map(|e| e.id)
        .ok_or_else(|| ApiError::NotFound(key.to_string()))
}

/// The freshly fetched copy of an entity just written.
fn fetched(board: &EntityBoard, id: EntityId) -> ApiResult<Entity> {
    board
        .find(id)
        .cloned()
        .ok_or(ApiError::Core(DossierError::EntityNotFound(id)))
}

// =============================================================================
// HEALTH
// =============================================================================

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let board = state.board.read().await;
    Json(HealthResponse::new(board.is_persistent()))
}

/// Fallback for unknown routes.
pub async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Not found")))
}

// =============================================================================
// ENTITIES
// =============================================================================

/// `GET /entities`: the filtered list. A failed fetch yields an empty list
/// with `error` set.
pub async fn list_entities_handler(
    State(state): State<AppState>,
    Query(query): Query<EntityListQuery>,
) -> ApiResult<Json<EntityListResponse>> {
    let (filter, view) = query.parse()?;
    let mut board = state.board.write().await;
    board.set_filter(filter);
    let total = board.entities().len();
    let entities = board
        .visible()
        .into_iter()
        .map(|e| EntityCard::new(e, view))
        .collect();
    Ok(Json(EntityListResponse {
        view,
        total,
        entities,
        error: board.error().map(str::to_string),
    }))
}

pub async fn create_entity_handler(
    State(state): State<AppState>,
    Json(request): Json<EntityRequest>,
) -> ApiResult<(StatusCode, Json<Entity>)> {
    let draft = request.into_draft(None);
    let mut board = state.board.write().await;
    let id = board.save(&draft)?;
    Ok((StatusCode::CREATED, Json(fetched(&board, id)?)))
}

/// `GET /entities/{key}`: the detail view, edges and deliverables included.
pub async fn get_entity_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<EntityDetail>> {
    let board = state.board.read().await;
    let id = resolve(&board, &key)?;
    Ok(Json(board.detail(id)?))
}

pub async fn update_entity_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<EntityRequest>,
) -> ApiResult<Json<Entity>> {
    let mut board = state.board.write().await;
    let id = resolve(&board, &key)?;
    let existing = fetched(&board, id)?;
    let draft = request.into_draft(Some(&existing));
    board.save(&draft)?;
    Ok(Json(fetched(&board, id)?))
}

/// `DELETE /entities/{key}?confirm=true`. Without `confirm` nothing is
/// deleted.
pub async fn delete_entity_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<DeleteResponse>> {
    let mut board = state.board.write().await;
    let id = resolve(&board, &key)?;
    let removed_relationships = board.delete_entity(id, Confirmation::from(query.confirm))?;
    Ok(Json(DeleteResponse {
        deleted: id,
        removed_relationships,
    }))
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// `POST /entities/{key}/relationships`: add an edge from `key`.
pub async fn add_relationship_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<RelationshipRequest>,
) -> ApiResult<(StatusCode, Json<RelationshipCreated>)> {
    let mut board = state.board.write().await;
    let source = resolve(&board, &key)?;

    let mut draft = RelationshipDraft::new(source);
    draft.relationship_type = request.relationship_type;
    draft.description = request.description.unwrap_or_default();
    draft.target = match &request.target {
        Some(target) => Some(resolve_json_key(&board, target)?),
        None => None,
    };

    let id = board.add_relationship(&draft)?;
    Ok((StatusCode::CREATED, Json(RelationshipCreated { id })))
}

pub async fn delete_relationship_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    let mut board = state.board.write().await;
    board.remove_relationship(RelationshipId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// DELIVERABLES
// =============================================================================

/// `GET /deliverables?agent=&type=&project=&search=&status=`.
pub async fn list_deliverables_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<DeliverableListResponse>> {
    let filters = DeliverableFilters::from_query(query.as_deref().unwrap_or_default())?;
    let board = state.board.read().await;
    let catalog = board.catalog();
    let items: Vec<_> = catalog.filter(&filters).into_iter().cloned().collect();
    Ok(Json(DeliverableListResponse {
        count_label: catalog.count_label(items.len()),
        items,
        projects: catalog
            .projects()
            .into_iter()
            .map(|(slug, label)| ProjectOption {
                slug: slug.to_string(),
                label,
            })
            .collect(),
    }))
}

// =============================================================================
// AGENTS
// =============================================================================

/// `GET /api/agent-usage?agent=`: day/week/month rollups.
pub async fn usage_handler(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<UsageReport>> {
    let board = state.board.read().await;
    Ok(Json(board.usage_report(query.agent.as_deref(), Utc::now())?))
}

pub async fn record_usage_handler(
    State(state): State<AppState>,
    Json(request): Json<UsageRecordRequest>,
) -> ApiResult<(StatusCode, Json<OkResponse>)> {
    let row = request.into_row(Utc::now());
    let mut board = state.board.write().await;
    board.record_usage(&row)?;
    Ok((StatusCode::CREATED, Json(OkResponse::default())))
}

/// `GET /api/heartbeats`: agent id -> last heartbeat.
pub async fn heartbeats_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, DateTime<Utc>>>> {
    let board = state.board.read().await;
    Ok(Json(board.heartbeats()?))
}

pub async fn heartbeat_handler(
    State(state): State<AppState>,
    Json(request): Json<HeartbeatRequest>,
) -> ApiResult<Json<OkResponse>> {
    let mut board = state.board.write().await;
    board.heartbeat(request.agent_id.as_deref().unwrap_or_default(), Utc::now())?;
    Ok(Json(OkResponse::default()))
}

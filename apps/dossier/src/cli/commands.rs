//! # CLI Command Implementations
//!
//! Each command opens the configured store, wraps it in a board, runs one
//! operation and prints the result as text or, with `--json-mode`, JSON.

use super::{Cli, EntityFields, render};
use crate::api::{self, EntityCard, EntityListQuery, EntityListResponse, EntityRequest, ListView};
use crate::config::{Backend, Config};
use chrono::Utc;
use dossier_core::{
    Confirmation, DeliverableFilters, DeliverableStatus, DeliverableType, DossierError,
    EntityBoard, EntityId, RelationshipDraft, RelationshipId, RelationshipType, Slug, plan_import,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for import (50 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Resolve `path` to an existing regular file no larger than `max_size`.
fn validate_input_file(path: &Path, max_size: u64) -> Result<PathBuf, DossierError> {
    let canonical = path.canonicalize().map_err(|e| {
        DossierError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(DossierError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| DossierError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > max_size {
        return Err(DossierError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(canonical)
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Settings every command runs with: config file and environment merged
/// with the global flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub database: PathBuf,
    pub backend: Backend,
    pub json_mode: bool,
}

impl Context {
    pub fn resolve(cli: &Cli) -> Result<Self, DossierError> {
        let config = Config::resolve(cli.config.as_deref())?;
        Ok(Self {
            database: config.database(cli.database.as_deref()),
            backend: config.backend(cli.backend),
            json_mode: cli.json_mode,
            config,
        })
    }

    /// Open the store and load the board. A failed initial fetch is an
    /// error here; there is no screen to show it on.
    pub fn open_board(&self) -> Result<EntityBoard, DossierError> {
        let store = self.backend.open(&self.database)?;
        let board = EntityBoard::new(store, self.config.catalog()?);
        match board.error() {
            Some(error) => Err(DossierError::IoError(error.to_string())),
            None => Ok(board),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DossierError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DossierError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// Find an entity by id or slug.
fn resolve(board: &EntityBoard, key: &str) -> Result<EntityId, DossierError> {
    board
        .find_by_key(key)
        .map(|e| e.id)
        .ok_or_else(|| DossierError::Validation(format!("No entity with id or slug '{}'", key)))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    ctx: &Context,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), DossierError> {
    let mut server = ctx.config.server.clone();
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }
    let board = ctx.open_board()?;

    println!("Dossier Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", server.host);
    println!("  Port:     {}", server.port);
    println!("  Backend:  {}", ctx.backend.as_str());
    println!("  Database: {:?}", ctx.database);
    println!("  Entities: {}", board.entities().len());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", server.host, server.port);
    api::run_server(&addr, board, &server).await
}

// =============================================================================
// ENTITY COMMANDS
// =============================================================================

/// Show the filtered entity list.
pub fn cmd_list(
    ctx: &Context,
    types: Option<String>,
    status: &str,
    search: String,
    view: &str,
) -> Result<(), DossierError> {
    let query = EntityListQuery {
        types,
        status: Some(status.to_string()),
        search: Some(search),
        view: Some(view.to_string()),
    };
    let (filter, view) = query.parse()?;
    let mut board = ctx.open_board()?;
    board.set_filter(filter);
    let total = board.entities().len();
    let visible = board.visible();

    if ctx.json_mode {
        return print_json(&EntityListResponse {
            view,
            total,
            entities: visible.iter().map(|e| EntityCard::new(e, view)).collect(),
            error: None,
        });
    }

    let body = match view {
        ListView::Grid => render::entity_grid(&visible),
        ListView::List => render::entity_list(&visible),
    };
    print!("{}", body);
    println!("{} of {} entities", visible.len(), total);
    Ok(())
}

/// Show one entity with its relationships and deliverables.
pub fn cmd_show(ctx: &Context, key: &str) -> Result<(), DossierError> {
    let board = ctx.open_board()?;
    let detail = board.detail(resolve(&board, key)?)?;
    if ctx.json_mode {
        return print_json(&detail);
    }
    print!("{}", render::entity_detail(&detail));
    Ok(())
}

fn entity_request(fields: EntityFields) -> EntityRequest {
    EntityRequest {
        name: fields.name,
        slug: fields.slug,
        full_name: fields.full_name,
        entity_type: fields.entity_type,
        icon: fields.icon,
        description: fields.description,
        agent_instructions: fields.instructions,
        financial_notes: fields.financial_notes,
        tracking_focus: (!fields.tracking_focus.is_empty()).then_some(fields.tracking_focus),
        key_people: (!fields.key_people.is_empty()).then_some(fields.key_people),
        status: fields.status,
    }
}

fn print_saved(
    ctx: &Context,
    board: &EntityBoard,
    id: EntityId,
    verb: &str,
) -> Result<(), DossierError> {
    let entity = board.find(id).ok_or(DossierError::EntityNotFound(id))?;
    if ctx.json_mode {
        return print_json(entity);
    }
    println!(
        "{} {} (id {}, slug {})",
        verb, entity.name, entity.id, entity.slug
    );
    Ok(())
}

pub fn cmd_create(ctx: &Context, fields: EntityFields) -> Result<(), DossierError> {
    let draft = entity_request(fields).into_draft(None);
    let mut board = ctx.open_board()?;
    let id = board.save(&draft)?;
    print_saved(ctx, &board, id, "Created")
}

/// Edit an entity. Flags not given keep their stored values.
pub fn cmd_edit(ctx: &Context, key: &str, fields: EntityFields) -> Result<(), DossierError> {
    let mut board = ctx.open_board()?;
    let id = resolve(&board, key)?;
    let existing = board
        .find(id)
        .cloned()
        .ok_or(DossierError::EntityNotFound(id))?;
    let draft = entity_request(fields).into_draft(Some(&existing));
    board.save(&draft)?;
    print_saved(ctx, &board, id, "Updated")
}

/// Delete an entity. Refuses unless `yes` is set.
pub fn cmd_delete(ctx: &Context, key: &str, yes: bool) -> Result<(), DossierError> {
    let mut board = ctx.open_board()?;
    let id = resolve(&board, key)?;
    let name = board.find(id).map(|e| e.name.clone()).unwrap_or_default();
    let removed = board.delete_entity(id, Confirmation::from(yes))?;

    if ctx.json_mode {
        return print_json(&api::DeleteResponse {
            deleted: id,
            removed_relationships: removed,
        });
    }
    println!("Deleted {} and {} relationships", name, removed);
    Ok(())
}

// =============================================================================
// RELATIONSHIP COMMANDS
// =============================================================================

pub fn cmd_link(
    ctx: &Context,
    source: &str,
    target: &str,
    relationship_type: RelationshipType,
    description: Option<String>,
) -> Result<(), DossierError> {
    let mut board = ctx.open_board()?;
    let mut draft = RelationshipDraft::new(resolve(&board, source)?);
    draft.target = Some(resolve(&board, target)?);
    draft.relationship_type = relationship_type;
    draft.description = description.unwrap_or_default();

    let id = board.add_relationship(&draft)?;

    if ctx.json_mode {
        return print_json(&api::RelationshipCreated { id });
    }
    let edge = board
        .find(draft.source())
        .and_then(|e| e.outgoing.iter().find(|edge| edge.id == id));
    match edge {
        Some(edge) => println!(
            "Linked: {} {} {} (#{})",
            edge.source.name,
            dossier_core::labels::relationship_label(edge.relationship_type),
            edge.target.name,
            id
        ),
        None => println!("Linked (#{})", id),
    }
    Ok(())
}

pub fn cmd_unlink(ctx: &Context, id: u64) -> Result<(), DossierError> {
    let mut board = ctx.open_board()?;
    board.remove_relationship(RelationshipId(id))?;
    if ctx.json_mode {
        return print_json(&api::OkResponse::default());
    }
    println!("Removed relationship #{}", id);
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import an exported JSON array of entity rows.
pub fn cmd_import(ctx: &Context, input: &Path) -> Result<(), DossierError> {
    let path = validate_input_file(input, MAX_IMPORT_FILE_SIZE)?;
    let json = std::fs::read_to_string(&path)
        .map_err(|e| DossierError::IoError(format!("Read file: {}", e)))?;
    let plan = plan_import(&json)?;

    tracing::info!(
        entities = plan.entities.len(),
        edges = plan.edges.len(),
        "importing {:?}",
        path
    );

    let mut board = ctx.open_board()?;
    let summary = board.import(&plan)?;

    if ctx.json_mode {
        return print_json(&summary);
    }
    println!(
        "Imported {} entities and {} relationships",
        summary.entities, summary.relationships
    );
    Ok(())
}

// =============================================================================
// DELIVERABLES COMMAND
// =============================================================================

pub fn cmd_deliverables(
    ctx: &Context,
    agent: Option<String>,
    deliverable_type: Option<DeliverableType>,
    project: Option<String>,
    search: Option<String>,
    status: Option<DeliverableStatus>,
) -> Result<(), DossierError> {
    let filters = DeliverableFilters {
        agent: agent.filter(|a| !a.is_empty()),
        deliverable_type,
        project: project.as_deref().map(Slug::new).transpose()?,
        search: search.filter(|s| !s.is_empty()),
        status,
    };
    let catalog = ctx.config.catalog()?;
    let items = catalog.filter(&filters);
    let count_label = catalog.count_label(items.len());

    if ctx.json_mode {
        return print_json(&api::DeliverableListResponse {
            count_label,
            items: items.into_iter().cloned().collect(),
            projects: catalog
                .projects()
                .into_iter()
                .map(|(slug, label)| api::ProjectOption {
                    slug: slug.to_string(),
                    label,
                })
                .collect(),
        });
    }
    print!("{}", render::deliverables(&items, &count_label));
    Ok(())
}

// =============================================================================
// AGENT COMMANDS
// =============================================================================

pub fn cmd_usage(ctx: &Context, agent: Option<&str>) -> Result<(), DossierError> {
    let board = ctx.open_board()?;
    let report = board.usage_report(agent, Utc::now())?;
    if ctx.json_mode {
        return print_json(&report);
    }
    print!("{}", render::usage(&report));
    Ok(())
}

/// With an agent id, stamp it as alive now; without, list heartbeats.
pub fn cmd_heartbeat(ctx: &Context, agent: Option<&str>) -> Result<(), DossierError> {
    let mut board = ctx.open_board()?;
    match agent {
        Some(agent) => {
            board.heartbeat(agent, Utc::now())?;
            if ctx.json_mode {
                return print_json(&api::OkResponse::default());
            }
            println!("Heartbeat recorded for {}", agent.trim());
        }
        None => {
            let beats = board.heartbeats()?;
            if ctx.json_mode {
                return print_json(&beats);
            }
            print!("{}", render::heartbeats(&beats));
        }
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), DossierError> {
    if ctx.backend == Backend::Memory {
        println!("Memory backend needs no initialization");
        return Ok(());
    }
    if ctx.database.exists() {
        if !force {
            return Err(DossierError::Validation(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| DossierError::IoError(format!("Remove old database: {}", e)))?;
    }

    ctx.backend.open(&ctx.database)?;
    println!("Initialized new redb database at {:?}", ctx.database);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use dossier_core::EntityType;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> Context {
        Context {
            config: Config::default(),
            database: dir.path().join("test.redb"),
            backend: Backend::Redb,
            json_mode: true,
        }
    }

    fn fields(name: &str) -> EntityFields {
        EntityFields {
            name: Some(name.to_string()),
            instructions: Some("Public sources only.".to_string()),
            ..EntityFields::default()
        }
    }

    #[test]
    fn create_link_delete_persist_across_commands() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        cmd_create(&ctx, fields("Jane Barnett")).unwrap();
        let mut acme = fields("Acme");
        acme.entity_type = Some(EntityType::OperatingCompany);
        cmd_create(&ctx, acme).unwrap();
        cmd_link(
            &ctx,
            "jane-barnett",
            "acme",
            RelationshipType::BoardMemberOf,
            None,
        )
        .unwrap();

        let board = ctx.open_board().unwrap();
        let acme = board.find_by_key("acme").unwrap();
        assert_eq!(acme.incoming.len(), 1);
        drop(board);

        let err = cmd_delete(&ctx, "acme", false).unwrap_err();
        assert!(matches!(err, DossierError::ConfirmationRequired(_)));
        cmd_delete(&ctx, "acme", true).unwrap();

        let board = ctx.open_board().unwrap();
        assert!(board.find_by_key("acme").is_none());
        assert!(board.find_by_key("jane-barnett").unwrap().outgoing.is_empty());
    }

    #[test]
    fn edit_keeps_unspecified_fields() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut create = fields("Acme Fund");
        create.description = Some("Early stage.".to_string());
        cmd_create(&ctx, create).unwrap();

        let edit = EntityFields {
            status: Some(dossier_core::EntityStatus::Watch),
            ..EntityFields::default()
        };
        cmd_edit(&ctx, "acme-fund", edit).unwrap();

        let board = ctx.open_board().unwrap();
        let fund = board.find_by_key("acme-fund").unwrap();
        assert_eq!(fund.status, dossier_core::EntityStatus::Watch);
        assert_eq!(fund.description.as_deref(), Some("Early stage."));
    }

    #[test]
    fn create_without_instructions_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let err = cmd_create(
            &ctx,
            EntityFields {
                name: Some("Nameless".to_string()),
                ..EntityFields::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Agent instructions are required.");
        assert!(ctx.open_board().unwrap().entities().is_empty());
    }

    #[test]
    fn unknown_key_is_reported() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let err = cmd_show(&ctx, "ghost").unwrap_err();
        assert_eq!(err.to_string(), "No entity with id or slug 'ghost'");
    }

    #[test]
    fn init_refuses_existing_database_without_force() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        cmd_init(&ctx, false).unwrap();
        assert!(cmd_init(&ctx, false).is_err());
        cmd_init(&ctx, true).unwrap();
    }

    #[test]
    fn heartbeat_requires_agent_id() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let err = cmd_heartbeat(&ctx, Some("   ")).unwrap_err();
        assert_eq!(err.to_string(), "agentId required");
        cmd_heartbeat(&ctx, Some("scout")).unwrap();
        let board = ctx.open_board().unwrap();
        assert!(board.heartbeats().unwrap().contains_key("scout"));
    }

    #[test]
    fn import_rejects_oversized_or_missing_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(validate_input_file(&missing, 10).is_err());

        let file = dir.path().join("rows.json");
        std::fs::write(&file, "[]").unwrap();
        assert!(validate_input_file(&file, 1).is_err());
        assert!(validate_input_file(&file, 10).is_ok());
    }
}

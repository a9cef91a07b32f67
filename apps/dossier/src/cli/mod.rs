//! # Dossier CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `list` - Filtered entity list
//! - `show` - Entity detail with relationships and deliverables
//! - `create` / `edit` - Write an entity
//! - `delete` - Delete an entity and every edge touching it
//! - `link` / `unlink` - Add or remove one relationship edge
//! - `import` - Load an exported JSON array of entity rows
//! - `deliverables` - Filtered deliverable feed
//! - `usage` - Agent token and cost rollups
//! - `heartbeat` - Stamp an agent as alive, or list heartbeats
//! - `init` - Initialize a new database

mod commands;
pub mod render;

use crate::config::Backend;
use clap::{Args, Parser, Subcommand};
use dossier_core::{
    DeliverableStatus, DeliverableType, DossierError, EntityStatus, EntityType, KeyPerson,
    RelationshipType,
};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Dossier - entity relationship registry
///
/// Tracks people, companies and funds, the typed relationships between
/// them, and what agents have delivered about them.
#[derive(Parser, Debug)]
#[command(name = "dossier")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database [default: dossier.redb]
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend [default: redb]
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Entity fields shared by `create` and `edit`.
#[derive(Args, Debug, Clone, Default)]
pub struct EntityFields {
    /// Short display name
    #[arg(long)]
    pub name: Option<String>,

    /// URL key; derived from the name on create
    #[arg(long)]
    pub slug: Option<String>,

    /// Legal or full name
    #[arg(long)]
    pub full_name: Option<String>,

    /// Entity type, e.g. person, family_office, venture_fund
    #[arg(short = 't', long = "type")]
    pub entity_type: Option<EntityType>,

    /// active, watch or inactive
    #[arg(short, long)]
    pub status: Option<EntityStatus>,

    #[arg(long)]
    pub icon: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Guardrails agents must follow for this entity
    #[arg(short, long)]
    pub instructions: Option<String>,

    #[arg(long)]
    pub financial_notes: Option<String>,

    /// Tracking focus item (repeatable); replaces the stored list
    #[arg(long = "focus")]
    pub tracking_focus: Vec<String>,

    /// Key person as "Name:Role[:Notes]" (repeatable); replaces the stored list
    #[arg(long = "person", value_parser = parse_person)]
    pub key_people: Vec<KeyPerson>,
}

/// Parse "Name:Role[:Notes]".
pub fn parse_person(raw: &str) -> Result<KeyPerson, String> {
    let mut parts = raw.splitn(3, ':').map(str::trim);
    let name = parts.next().unwrap_or_default();
    let role = parts.next().unwrap_or_default();
    if name.is_empty() || role.is_empty() {
        return Err(format!("expected \"Name:Role[:Notes]\", got \"{}\"", raw));
    }
    Ok(KeyPerson {
        name: name.to_string(),
        role: role.to_string(),
        notes: parts.next().filter(|n| !n.is_empty()).map(str::to_string),
    })
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to [default: 127.0.0.1]
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to [default: 8080]
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List entities
    List {
        /// Comma-separated entity types
        #[arg(short = 't', long)]
        types: Option<String>,

        /// all, active, watch or inactive
        #[arg(short, long, default_value = "all")]
        status: String,

        /// Case-insensitive text search
        #[arg(long, default_value = "")]
        search: String,

        /// grid or list
        #[arg(long, default_value = "grid")]
        view: String,
    },

    /// Show one entity by id or slug
    Show { key: String },

    /// Create an entity
    Create {
        #[command(flatten)]
        fields: EntityFields,
    },

    /// Edit an entity by id or slug
    Edit {
        key: String,

        #[command(flatten)]
        fields: EntityFields,
    },

    /// Delete an entity and every relationship involving it
    Delete {
        key: String,

        /// Confirm the deletion
        #[arg(short, long)]
        yes: bool,
    },

    /// Add a directed relationship from SOURCE to TARGET
    Link {
        source: String,
        target: String,

        #[arg(short = 't', long = "type", default_value = "affiliated_with")]
        relationship_type: RelationshipType,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Remove one relationship by id
    Unlink { id: u64 },

    /// Import an exported JSON array of entity rows
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List deliverables
    Deliverables {
        #[arg(long)]
        agent: Option<String>,

        #[arg(short = 't', long = "type")]
        deliverable_type: Option<DeliverableType>,

        /// Entity slug
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        search: Option<String>,

        #[arg(short, long)]
        status: Option<DeliverableStatus>,
    },

    /// Show agent usage for the last day, week and month
    Usage {
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Stamp AGENT as alive, or list every heartbeat
    Heartbeat { agent: Option<String> },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), DossierError> {
    let ctx = Context::resolve(&cli)?;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, host, port).await,
        Some(Commands::List {
            types,
            status,
            search,
            view,
        }) => cmd_list(&ctx, types, &status, search, &view),
        Some(Commands::Show { key }) => cmd_show(&ctx, &key),
        Some(Commands::Create { fields }) => cmd_create(&ctx, fields),
        Some(Commands::Edit { key, fields }) => cmd_edit(&ctx, &key, fields),
        Some(Commands::Delete { key, yes }) => cmd_delete(&ctx, &key, yes),
        Some(Commands::Link {
            source,
            target,
            relationship_type,
            description,
        }) => cmd_link(&ctx, &source, &target, relationship_type, description),
        Some(Commands::Unlink { id }) => cmd_unlink(&ctx, id),
        Some(Commands::Import { input }) => cmd_import(&ctx, &input),
        Some(Commands::Deliverables {
            agent,
            deliverable_type,
            project,
            search,
            status,
        }) => cmd_deliverables(&ctx, agent, deliverable_type, project, search, status),
        Some(Commands::Usage { agent }) => cmd_usage(&ctx, agent.as_deref()),
        Some(Commands::Heartbeat { agent }) => cmd_heartbeat(&ctx, agent.as_deref()),
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        None => cmd_list(&ctx, None, "all", String::new(), "list"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn person_parses_with_and_without_notes() {
        let p = parse_person("Sam Ortiz: EA").unwrap();
        assert_eq!(p.name, "Sam Ortiz");
        assert_eq!(p.role, "EA");
        assert_eq!(p.notes, None);

        let p = parse_person("Sam:EA:Handles travel: all of it").unwrap();
        assert_eq!(p.notes.as_deref(), Some("Handles travel: all of it"));

        assert!(parse_person("Sam").is_err());
        assert!(parse_person(":EA").is_err());
    }

    #[test]
    fn global_flags_parse_anywhere() {
        let cli = Cli::try_parse_from([
            "dossier",
            "list",
            "--status",
            "watch",
            "--json-mode",
            "-B",
            "memory",
        ])
        .unwrap();
        assert!(cli.json_mode);
        assert_eq!(cli.backend, Some(Backend::Memory));
        match cli.command {
            Some(Commands::List { status, .. }) => assert_eq!(status, "watch"),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn link_type_is_validated() {
        let ok = Cli::try_parse_from(["dossier", "link", "jane", "acme", "-t", "board_member_of"])
            .unwrap();
        match ok.command {
            Some(Commands::Link {
                relationship_type, ..
            }) => assert_eq!(relationship_type, RelationshipType::BoardMemberOf),
            other => panic!("expected link, got {:?}", other),
        }
        assert!(Cli::try_parse_from(["dossier", "link", "a", "b", "-t", "knows"]).is_err());
    }
}

//! # Configuration
//!
//! Optional TOML file, overridden by environment variables, overridden by
//! CLI flags.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! cors_origins = "http://localhost:3000"
//! rate_limit = 100
//!
//! [storage]
//! database = "dossier.redb"
//! backend = "redb"
//!
//! [catalog]
//! path = "deliverables.json"
//! ```
//!
//! ## Environment
//!
//! - `DOSSIER_CORS_ORIGINS`: comma-separated origins, or `*` for all
//! - `DOSSIER_RATE_LIMIT`: requests per second, `0` disables limiting

use dossier_core::{DeliverableCatalog, DossierError, StorageBackend};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Database file used when neither a flag nor the config names one.
pub const DEFAULT_DATABASE: &str = "dossier.redb";

/// Requests per second when nothing configures a limit.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// BACKEND
// =============================================================================

/// Where entities are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID database file.
    #[default]
    Redb,
    /// Process memory; lost on exit.
    Memory,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Redb => "redb",
            Backend::Memory => "memory",
        }
    }

    /// Open the store this backend names.
    pub fn open(self, database: &Path) -> Result<StorageBackend, DossierError> {
        match self {
            Backend::Redb => StorageBackend::open(database),
            Backend::Memory => Ok(StorageBackend::in_memory()),
        }
    }
}

// =============================================================================
// CONFIG FILE
// =============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated origins, `*`, or unset for localhost only.
    pub cors_origins: Option<String>,
    pub rate_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
}

/// Deliverable catalog source. The built-in catalog is used when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
}

impl Config {
    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, DossierError> {
        toml::from_str(content)
            .map_err(|e| DossierError::SerializationError(format!("Invalid config: {}", e)))
    }

    /// Load config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DossierError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DossierError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `path` when given, defaults otherwise, then apply the process
    /// environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, DossierError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Apply `DOSSIER_CORS_ORIGINS` and `DOSSIER_RATE_LIMIT` from `lookup`.
    ///
    /// An unparsable rate limit is ignored with a warning.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(origins) = lookup("DOSSIER_CORS_ORIGINS") {
            self.server.cors_origins = Some(origins);
        }
        if let Some(raw) = lookup("DOSSIER_RATE_LIMIT") {
            match raw.trim().parse() {
                Ok(rps) => self.server.rate_limit = rps,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid DOSSIER_RATE_LIMIT"),
            }
        }
        self
    }

    /// Database path: `flag`, then the config file, then the default.
    #[must_use]
    pub fn database(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.storage.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    #[must_use]
    pub fn backend(&self, flag: Option<Backend>) -> Backend {
        flag.or(self.storage.backend).unwrap_or_default()
    }

    /// The configured deliverable catalog, or the built-in one.
    pub fn catalog(&self) -> Result<DeliverableCatalog, DossierError> {
        match &self.catalog.path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    DossierError::IoError(format!(
                        "Cannot read catalog '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                DeliverableCatalog::from_json(&json)
            }
            None => DeliverableCatalog::builtin(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database(None), PathBuf::from("dossier.redb"));
        assert_eq!(config.backend(None), Backend::Redb);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            port = 9000

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.backend(None), Backend::Memory);
        assert_eq!(config.backend(Some(Backend::Redb)), Backend::Redb);
    }

    #[test]
    fn flag_wins_over_file() {
        let config = Config::from_toml_str("[storage]\ndatabase = \"from-file.redb\"").unwrap();
        assert_eq!(config.database(None), PathBuf::from("from-file.redb"));
        assert_eq!(
            config.database(Some(Path::new("flag.redb"))),
            PathBuf::from("flag.redb")
        );
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("DOSSIER_CORS_ORIGINS", "*"),
            ("DOSSIER_RATE_LIMIT", "0"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_toml_str("[server]\nrate_limit = 5")
            .unwrap()
            .with_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.server.cors_origins.as_deref(), Some("*"));
        assert_eq!(config.server.rate_limit, 0);
    }

    #[test]
    fn bad_rate_limit_is_ignored() {
        let config = Config::default().with_env(|key| {
            (key == "DOSSIER_RATE_LIMIT").then(|| "fast".to_string())
        });
        assert_eq!(config.server.rate_limit, DEFAULT_RATE_LIMIT);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = Config::from_toml_str("[storage]\nbackend = \"sqlite\"").unwrap_err();
        assert!(err.to_string().starts_with("Serialization error: Invalid config"));
    }

    #[test]
    fn catalog_defaults_to_builtin() {
        let catalog = Config::default().catalog().unwrap();
        assert!(!catalog.is_empty());
    }
}

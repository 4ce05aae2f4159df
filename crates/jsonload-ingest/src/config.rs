//! Configuration management
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. built-in defaults (the `DEFAULT_*` constants)
//! 2. a config file: `jsonload.{toml,ini,...}` in the working directory, or
//!    the file passed with `--config`. INI files with a `[postgresql]`
//!    section (`host`, `port`, `user`, `password`, `database`) are accepted.
//! 3. the environment: `.env`, `JSONLOAD__*` variables (nested keys use
//!    `__`, e.g. `JSONLOAD__DATABASE__MAX_CONNECTIONS`) and `DATABASE_URL`
//! 4. command-line flags ([`ConfigOverrides`])

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::checkpoint::DEFAULT_CHECKPOINT_PATH;
use crate::error::IngestError;
use crate::schema::{ConflictPolicy, TableSchema, DEFAULT_TABLE_NAME};
use crate::target::DatabaseConfig;

// ============================================================================
// Defaults
// ============================================================================

/// Default directory scanned for source files.
pub const DEFAULT_SOURCE_DIR: &str = "./raw_tiki_input";

/// Default file extension, without the dot.
pub const DEFAULT_EXTENSION: &str = "json";

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 2;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_NAME: &str = "jsonload";

const ENV_PREFIX: &str = "JSONLOAD";
const ENV_SEPARATOR: &str = "__";

const DEFAULT_PG_HOST: &str = "localhost";
const DEFAULT_PG_PORT: u16 = 5432;
const DEFAULT_PG_USER: &str = "postgres";
const DEFAULT_PG_DATABASE: &str = "postgres";

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub source_dir: PathBuf,
    pub extension: String,
    pub table: TableSchema,
    pub workers: usize,
    pub checkpoint_path: PathBuf,
    pub conflict_policy: ConflictPolicy,
    pub dry_run: bool,
    pub database: DatabaseConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            table: TableSchema::default(),
            workers: DEFAULT_WORKERS,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            conflict_policy: ConflictPolicy::default(),
            dry_run: false,
            database: DatabaseConfig::default(),
        }
    }
}

/// Values supplied on the command line; `None` leaves lower layers alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_dir: Option<PathBuf>,
    pub extension: Option<String>,
    pub table: Option<String>,
    pub workers: Option<usize>,
    pub checkpoint_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub conflict_policy: Option<ConflictPolicy>,
    pub dry_run: Option<bool>,
}

/// Shape of the config file and `JSONLOAD__*` variables
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub source_dir: Option<PathBuf>,
    pub extension: Option<String>,
    pub table: Option<String>,
    pub workers: Option<usize>,
    pub checkpoint_path: Option<PathBuf>,
    pub conflict_policy: Option<ConflictPolicy>,
    pub dry_run: Option<bool>,
    pub database: DatabaseSettings,
    pub postgresql: Option<PostgresSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
}

/// `[postgresql]` section of a `database.ini` style file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostgresSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl PostgresSection {
    fn url(&self) -> String {
        DatabaseConfig::postgres_url(
            self.host.as_deref().unwrap_or(DEFAULT_PG_HOST),
            self.port.unwrap_or(DEFAULT_PG_PORT),
            self.user.as_deref().unwrap_or(DEFAULT_PG_USER),
            self.password.as_deref(),
            self.database.as_deref().unwrap_or(DEFAULT_PG_DATABASE),
        )
    }
}

impl IngestConfig {
    /// Load configuration from every layer and validate it
    pub fn load(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, IngestError> {
        dotenvy::dotenv().ok();

        let settings = read_settings(config_file)?;
        let database_url = jsonload_common::env::var("DATABASE_URL");

        let config = Self::resolve(settings, database_url, overrides)?;
        config.validate()?;

        tracing::debug!(
            source_dir = %config.source_dir.display(),
            table = config.table.name(),
            workers = config.workers,
            checkpoint = %config.checkpoint_path.display(),
            database = %config.database.redacted_url(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Merge already-read layers over the defaults
    pub fn resolve(
        settings: FileSettings,
        database_url: Option<String>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, IngestError> {
        let defaults = Self::default();

        let table_name = overrides
            .table
            .clone()
            .or(settings.table)
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());

        let url = overrides
            .database_url
            .clone()
            .or(database_url)
            .or(settings.database.url)
            .or_else(|| settings.postgresql.as_ref().map(PostgresSection::url))
            .unwrap_or(defaults.database.url);

        let workers = overrides.workers.or(settings.workers).unwrap_or(defaults.workers);

        let mut database = DatabaseConfig {
            url,
            max_connections: settings
                .database
                .max_connections
                .unwrap_or(defaults.database.max_connections),
            min_connections: settings
                .database
                .min_connections
                .unwrap_or(defaults.database.min_connections),
            connect_timeout_secs: settings
                .database
                .connect_timeout_secs
                .unwrap_or(defaults.database.connect_timeout_secs),
        };

        // One connection per worker at least
        let wanted = u32::try_from(workers).unwrap_or(u32::MAX);
        if database.max_connections < wanted {
            database.max_connections = wanted;
        }

        Ok(Self {
            source_dir: overrides
                .source_dir
                .clone()
                .or(settings.source_dir)
                .unwrap_or(defaults.source_dir),
            extension: overrides
                .extension
                .clone()
                .or(settings.extension)
                .map(|ext| ext.trim().to_string())
                .unwrap_or(defaults.extension),
            table: TableSchema::products(table_name)?,
            workers,
            checkpoint_path: overrides
                .checkpoint_path
                .clone()
                .or(settings.checkpoint_path)
                .unwrap_or(defaults.checkpoint_path),
            conflict_policy: overrides
                .conflict_policy
                .or(settings.conflict_policy)
                .unwrap_or(defaults.conflict_policy),
            dry_run: overrides.dry_run.or(settings.dry_run).unwrap_or(defaults.dry_run),
            database,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.workers == 0 {
            return Err(IngestError::config("workers must be greater than 0"));
        }

        let extension = &self.extension;
        if extension.trim().is_empty() {
            return Err(IngestError::config("file extension cannot be empty"));
        }
        if extension.contains(['.', '/', '\\']) || extension.contains(char::is_whitespace) {
            return Err(IngestError::config(format!(
                "file extension '{}' must be a bare name such as 'json'",
                extension
            )));
        }

        if self.database.url.is_empty() {
            return Err(IngestError::config("database URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(IngestError::config("database max_connections must be greater than 0"));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(IngestError::config(format!(
                "database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        Ok(())
    }
}

fn read_settings(config_file: Option<&Path>) -> Result<FileSettings, IngestError> {
    let file_source = match config_file {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    config::Config::builder()
        .add_source(file_source)
        .add_source(environment_source)
        .build()
        .and_then(|settings| settings.try_deserialize::<FileSettings>())
        .map_err(|e| IngestError::config(e.to_string()))
}

//! jsonload ingest library
//!
//! Checkpointed, concurrent loading of JSON-array files into a relational
//! table.
//!
//! # Pipeline
//!
//! - [`discovery`] lists candidate files in the source directory
//! - [`checkpoint`] remembers which files were loaded by earlier runs
//! - [`claims`] stops two workers from loading the same file at once
//! - [`loader`] decodes a file into [`record::Record`]s and upserts them
//!   into a [`target::TargetStore`] inside one transaction
//! - [`coordinator`] drives the run and aggregates a [`types::RunReport`]
//!
//! # Example
//!
//! ```no_run
//! use jsonload_ingest::checkpoint::SqliteCheckpointStore;
//! use jsonload_ingest::config::{ConfigOverrides, IngestConfig};
//! use jsonload_ingest::coordinator::IngestionCoordinator;
//! use jsonload_ingest::target::connect_target;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load(None, &ConfigOverrides::default())?;
//!     let target = connect_target(&config.database).await?;
//!     let checkpoints = Arc::new(SqliteCheckpointStore::open(&config.checkpoint_path).await?);
//!
//!     let report = IngestionCoordinator::new(&config, target, checkpoints).run().await?;
//!     println!("{} files loaded", report.loaded());
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod claims;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod record;
pub mod schema;
pub mod target;
pub mod types;
pub mod worker;

pub use error::{CheckpointError, IngestError, LoadError};

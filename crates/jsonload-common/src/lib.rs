//! jsonload common library
//!
//! Shared plumbing for the jsonload workspace members:
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Environment**: typed lookups of environment variables
//!
//! # Example
//!
//! ```no_run
//! use jsonload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> jsonload_common::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};

//! Commit engine configuration
//!
//! A [`CommitConfig`] comes from one of:
//! - Defaults (`CommitConfig::default`)
//! - Defaults plus environment overrides (`CommitConfig::from_env`), which is
//!   what the process-wide writer behind `write_atomic` uses
//! - A host's TOML document (`CommitConfig::from_toml_str`, or serde
//!   embedding as a `[safewrite]` table)

mod resolve;
mod types;

pub use resolve::ConfigError;
pub use types::{CommitConfig, DEFAULT_STAGING_PREFIX, RetryPolicy};

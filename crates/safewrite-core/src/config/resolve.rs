//! Configuration loading and validation

use super::types::CommitConfig;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Staging prefix cannot be used as part of a file name
    #[error("invalid staging prefix {prefix:?}: {reason}")]
    InvalidStagingPrefix { prefix: String, reason: &'static str },
}

impl CommitConfig {
    /// Parse a standalone TOML document holding the commit settings.
    ///
    /// Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: CommitConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment variable overrides applied
    ///
    /// - `SAFEWRITE_RENAME_ATTEMPTS`: retry budget for replacing renames
    /// - `SAFEWRITE_RENAME_BACKOFF_MS`: base delay between attempts
    /// - `SAFEWRITE_STAGING_PREFIX`: staging file name prefix
    /// - `SAFEWRITE_NO_DIR_SYNC`: if set, skip the parent directory flush
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_overrides(&mut config);
        config
    }

    /// Check that the staging prefix can be used as a file name prefix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.staging_prefix;
        let reason = if prefix.is_empty() {
            Some("prefix is empty")
        } else if prefix.contains('\0') {
            Some("prefix contains a NUL byte")
        } else if prefix.contains('/') || prefix.contains(std::path::MAIN_SEPARATOR) {
            Some("prefix contains a path separator")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ConfigError::InvalidStagingPrefix {
                prefix: prefix.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut CommitConfig) {
    if let Some(attempts) = parse_env::<u32>("SAFEWRITE_RENAME_ATTEMPTS") {
        config.retry.max_attempts = attempts;
    }

    if let Some(delay) = parse_env::<u64>("SAFEWRITE_RENAME_BACKOFF_MS") {
        config.retry.base_delay_ms = delay;
    }

    if let Ok(prefix) = std::env::var("SAFEWRITE_STAGING_PREFIX") {
        config.staging_prefix = prefix;
    }

    if std::env::var("SAFEWRITE_NO_DIR_SYNC").is_ok() {
        config.sync_parent_dir = false;
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {name}={raw:?}");
            None
        }
    }
}

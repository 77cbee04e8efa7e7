//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default staging file name prefix
pub const DEFAULT_STAGING_PREFIX: &str = ".tmp-safewrite-";

/// Commit engine configuration
///
/// Hosts usually embed this as a `[safewrite]` table in their own config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Retry policy for replacing renames on platforms where the destination
    /// can be held open by another process
    pub retry: RetryPolicy,
    /// Name prefix for staging files created next to the destination
    pub staging_prefix: String,
    /// Flush the parent directory after a commit where the platform allows it
    pub sync_parent_dir: bool,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            staging_prefix: DEFAULT_STAGING_PREFIX.to_string(),
            sync_parent_dir: true,
        }
    }
}

/// Bounded retry with linearly increasing delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total rename attempts, including the first (at least 1 is always made)
    pub max_attempts: u32,
    /// Delay after the first failed attempt; attempt `n` waits `(n + 1)` times this
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay_ms: 15,
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the 0-based `attempt` failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(u64::from(attempt).saturating_add(1)),
        )
    }
}

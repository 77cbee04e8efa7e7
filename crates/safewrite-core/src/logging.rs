//! Opt-in tracing output for hosts without their own subscriber
//!
//! The engine itself only emits events. Failed commit attempts and an
//! exhausted rename retry budget log at `warn`; strategy choice, the
//! hard-link copy fallback and best-effort chmod, fsync or cleanup failures
//! log at `debug`. A host that already installed a subscriber receives
//! these through it and never needs to call [`init`].

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

fn parse_level(raw: Option<&str>) -> tracing::Level {
    match raw.unwrap_or("info").trim().to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Install a stderr subscriber at the level named by `SAFEWRITE_LOG`.
///
/// `SAFEWRITE_LOG=debug` is the usual setting for tracing a failing write
/// through its strategy. Unknown or missing values mean `info`. Repeat
/// calls are no-ops, as is calling it after another subscriber was set.
pub fn init() {
    if INIT.get().is_some() {
        return;
    }
    let level = parse_level(std::env::var("SAFEWRITE_LOG").ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}

//! Atomic file commits for tool hosts
//!
//! This crate provides the one guarantee file-writing tools need: a write to
//! a named file either fully succeeds, leaving exactly the new content, or
//! fails and leaves the destination as it was. No reader ever observes a
//! partially written file, and a symlinked parent directory can never
//! redirect the write.
//!
//! Atomicity comes from the filesystem (rename, hard link, exclusive
//! create), not from in-process locks, so it holds across threads and
//! processes on the same machine.

pub mod config;
pub mod io;
pub mod logging;

pub use config::{CommitConfig, RetryPolicy};
pub use io::{
    AtomicWriter, WriteError, WriteErrorKind, verify_parent_safe, write_atomic, write_text,
};

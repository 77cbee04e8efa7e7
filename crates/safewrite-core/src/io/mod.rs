//! Atomic, symlink-safe file commits
//!
//! A write either leaves the destination holding exactly the new bytes or
//! fails and leaves it as it was. Key pieces:
//!
//! - **Path guard**: normalizes the destination and refuses any symlink in
//!   its parent chain ([`verify_parent_safe`])
//! - **Staging**: payload goes to a uniquely named file in the destination's
//!   directory and is fsynced before it is ever visible
//! - **Commit strategies**: rename, retried rename, hard link, or
//!   no-replace rename depending on the platform and the overwrite flag
//! - **Cleanup**: the staging file is removed on every failure path
//!
//! # Example
//!
//! ```rust,no_run
//! use safewrite_core::io::{write_atomic, WriteErrorKind};
//!
//! write_atomic("/tmp/x/out.txt", b"hello\n", 0o640, true).unwrap();
//!
//! match write_atomic("/tmp/x/out.txt", b"SHOULD-NOT-WRITE", 0o600, false) {
//!     Ok(()) => println!("created"),
//!     Err(e) if e.kind() == WriteErrorKind::AlreadyExists => println!("kept existing file"),
//!     Err(e) => eprintln!("write failed: {e}"),
//! }
//! ```

pub mod dir;
pub mod error;
pub mod fs;
pub mod path_guard;
mod staging;
pub mod strategy;
pub mod writer;

// Re-export primary API
pub use dir::{ListError, list_directory};
pub use error::{WriteError, WriteErrorKind};
pub use path_guard::{PathGuard, normalize_path, verify_parent_safe};
pub use strategy::{CommitStrategy, PlatformCaps};
pub use writer::{AtomicWriter, write_atomic, write_text};

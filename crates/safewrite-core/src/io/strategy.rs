//! Platform-specific commit strategies
//!
//! The staged file becomes visible under the destination name through one
//! of four strategies, picked once from [`PlatformCaps`] and the overwrite
//! flag:
//!
//! | overwrite | platform                        | strategy          |
//! |-----------|---------------------------------|-------------------|
//! | yes       | rename replaces atomically      | `RenameReplace`   |
//! | yes       | rename can hit a held file      | `RetryingRename`  |
//! | no        | hard links available            | `HardLink`        |
//! | no        | rename refuses existing targets | `RenameNoReplace` |
//!
//! `HardLink` falls back to an exclusive create plus copy when the
//! filesystem cannot link. That fallback keeps the no-overwrite guarantee
//! but a crash mid-copy can leave a truncated destination, so it is only
//! taken when the link itself is unsupported.

use crate::config::RetryPolicy;
use crate::io::error::WriteError;
use crate::io::fs::{EntryKind, FileHandle, FileSystem};
use crate::io::staging::StagingFile;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Commit primitives the host platform guarantees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCaps {
    /// `rename` atomically replaces an existing destination
    pub rename_replaces: bool,
    /// Hard links can be created and fail when the link name exists
    pub hardlink: bool,
    /// Directory handles can be flushed to persist new entries
    pub dir_sync: bool,
}

impl PlatformCaps {
    pub const POSIX: Self = Self {
        rename_replaces: true,
        hardlink: true,
        dir_sync: true,
    };

    pub const WINDOWS: Self = Self {
        rename_replaces: false,
        hardlink: false,
        dir_sync: false,
    };

    pub fn detect() -> Self {
        if cfg!(windows) {
            Self::WINDOWS
        } else {
            Self::POSIX
        }
    }
}

impl Default for PlatformCaps {
    fn default() -> Self {
        Self::detect()
    }
}

/// How staged content is made visible under the destination name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStrategy {
    /// Single atomic rename over the destination
    RenameReplace,
    /// Rename with bounded retries while another process holds the destination
    RetryingRename(RetryPolicy),
    /// Hard link that fails if the destination appeared, then drop the staging name
    HardLink,
    /// Plain rename on a platform whose rename never replaces
    RenameNoReplace,
}

impl CommitStrategy {
    pub fn select(caps: PlatformCaps, overwrite: bool, retry: RetryPolicy) -> Self {
        match (overwrite, caps.rename_replaces, caps.hardlink) {
            (true, true, _) => Self::RenameReplace,
            (true, false, _) => Self::RetryingRename(retry),
            (false, _, true) => Self::HardLink,
            (false, _, false) => Self::RenameNoReplace,
        }
    }

    /// Whether this strategy may replace an existing destination
    pub fn replaces(&self) -> bool {
        matches!(self, Self::RenameReplace | Self::RetryingRename(_))
    }

    pub(crate) fn commit(
        self,
        fs: &dyn FileSystem,
        staging: StagingFile<'_>,
        dest: &Path,
        mode: u32,
    ) -> Result<(), WriteError> {
        match self {
            Self::RenameReplace => rename_replace(fs, staging, dest),
            Self::RetryingRename(policy) => rename_with_retry(fs, staging, dest, policy),
            Self::HardLink => link_no_replace(fs, staging, dest, mode),
            Self::RenameNoReplace => rename_no_replace(fs, staging, dest),
        }
    }
}

fn rename_replace(
    fs: &dyn FileSystem,
    staging: StagingFile<'_>,
    dest: &Path,
) -> Result<(), WriteError> {
    fs.rename(staging.path(), dest)
        .map_err(|e| WriteError::io("rename staging file into place", dest, e))?;
    staging.committed();
    Ok(())
}

/// Rename, retrying while scanners or indexers hold the destination open.
///
/// Between attempts a destination that is still present is moved aside so
/// the next rename does not need to replace it. If every attempt fails the
/// displaced file is moved back, so the caller is left with the old content.
fn rename_with_retry(
    fs: &dyn FileSystem,
    staging: StagingFile<'_>,
    dest: &Path,
    policy: RetryPolicy,
) -> Result<(), WriteError> {
    let attempts = policy.attempts();
    let displaced = displaced_path(staging.path());
    let mut moved_aside = false;
    let mut last_err = None;

    for attempt in 0..attempts {
        match fs.rename(staging.path(), dest) {
            Ok(()) => {
                if attempt > 0 {
                    debug!(dest = %dest.display(), attempt, "Rename succeeded after retry");
                }
                staging.committed();
                if moved_aside && let Err(e) = fs.remove_file(&displaced) {
                    debug!(path = %displaced.display(), error = %e, "Could not remove displaced destination");
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    dest = %dest.display(),
                    attempt = attempt + 1,
                    attempts,
                    error = %e,
                    "Rename onto destination failed"
                );
                last_err = Some(e);
            }
        }

        if attempt + 1 == attempts {
            break;
        }

        if !moved_aside && matches!(fs.entry_kind(dest), Ok(kind) if kind.exists()) {
            match fs.rename(dest, &displaced) {
                Ok(()) => moved_aside = true,
                Err(e) => {
                    debug!(dest = %dest.display(), error = %e, "Could not move destination aside before retry");
                }
            }
        }

        std::thread::sleep(policy.delay_after(attempt));
    }

    warn!(dest = %dest.display(), attempts, "Rename retry budget exhausted");
    if moved_aside && let Err(e) = fs.rename_no_replace(&displaced, dest) {
        warn!(
            dest = %dest.display(),
            kept = %displaced.display(),
            error = %e,
            "Could not restore displaced destination"
        );
    }

    Err(WriteError::PlatformCommitFailure {
        path: dest.to_path_buf(),
        attempts,
        source: last_err.unwrap_or_else(|| io::Error::other("rename was never attempted")),
    })
}

/// Name the old destination is parked under while a retry is pending.
///
/// Derived from the staging name, so it is unique per write and carries the
/// staging prefix.
fn displaced_path(staging: &Path) -> PathBuf {
    let mut name = staging.as_os_str().to_owned();
    name.push(".prev");
    PathBuf::from(name)
}

fn link_no_replace(
    fs: &dyn FileSystem,
    staging: StagingFile<'_>,
    dest: &Path,
    mode: u32,
) -> Result<(), WriteError> {
    match fs.hard_link(staging.path(), dest) {
        Ok(()) => {
            staging.discard();
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(WriteError::already_exists(dest)),
        Err(e) => {
            debug!(
                dest = %dest.display(),
                error = %e,
                "Hard link unavailable, falling back to exclusive copy"
            );
            copy_no_replace(fs, staging, dest, mode)
        }
    }
}

/// Create the destination exclusively and copy the staged bytes into it.
///
/// A destination this call created is removed again if the copy fails.
pub(crate) fn copy_no_replace(
    fs: &dyn FileSystem,
    staging: StagingFile<'_>,
    dest: &Path,
    mode: u32,
) -> Result<(), WriteError> {
    let mut out = match fs.create_exclusive(dest, mode) {
        Ok(out) => out,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(WriteError::already_exists(dest));
        }
        Err(e) => return Err(WriteError::io("create destination exclusively", dest, e)),
    };

    let copied = copy_into(fs, staging.path(), out.as_mut());
    drop(out);

    if let Err(e) = copied {
        if let Err(remove_err) = fs.remove_file(dest) {
            debug!(dest = %dest.display(), error = %remove_err, "Failed to remove partial destination");
        }
        return Err(WriteError::io("copy staged content into destination", dest, e));
    }

    staging.discard();
    Ok(())
}

fn copy_into(fs: &dyn FileSystem, from: &Path, out: &mut dyn FileHandle) -> io::Result<()> {
    let mut input = fs.open_read(from)?;
    io::copy(&mut input, &mut *out)?;
    out.flush()?;
    out.sync()
}

fn rename_no_replace(
    fs: &dyn FileSystem,
    staging: StagingFile<'_>,
    dest: &Path,
) -> Result<(), WriteError> {
    match fs.rename_no_replace(staging.path(), dest) {
        Ok(()) => {
            staging.committed();
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(WriteError::already_exists(dest)),
        Err(e) => match fs.entry_kind(dest) {
            Ok(EntryKind::Missing) | Err(_) => {
                Err(WriteError::io("rename staging file into place", dest, e))
            }
            Ok(_) => Err(WriteError::already_exists(dest)),
        },
    }
}

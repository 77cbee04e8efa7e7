//! Parent-directory guard
//!
//! Normalizes a destination path and refuses it when any ancestor directory
//! is a symbolic link, so a write can never be redirected out of the tree
//! the caller named. Only the parent chain is inspected; the final component
//! is left to the commit engine.

use crate::io::error::WriteError;
use crate::io::fs::{EntryKind, FileSystem, OsFileSystem};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Upper bound on the number of components in a normalized path
pub const MAX_PATH_DEPTH: usize = 4096;

/// Normalize `path` into an absolute path with `.` and `..` resolved.
///
/// Resolution is lexical: symlinks are not followed, and the path does not
/// need to exist. Relative paths are resolved against the current working
/// directory.
///
/// # Errors
///
/// Returns `WriteError::InvalidPath` for empty or blank paths, paths
/// containing a NUL byte, or paths deeper than [`MAX_PATH_DEPTH`].
pub fn normalize_path(path: impl AsRef<Path>) -> Result<PathBuf, WriteError> {
    let path = path.as_ref();
    let raw = path.as_os_str();

    if raw.is_empty() {
        return Err(WriteError::invalid_path(path, "path is empty"));
    }
    if raw.to_str().is_some_and(|s| s.trim().is_empty()) {
        return Err(WriteError::invalid_path(path, "path is blank"));
    }
    if raw.as_encoded_bytes().contains(&0) {
        return Err(WriteError::invalid_path(path, "path contains a NUL byte"));
    }

    let absolute = std::path::absolute(path)
        .map_err(|e| WriteError::io("resolve absolute path", path, e))?;

    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                    depth -= 1;
                }
            }
            Component::Normal(_) => {
                depth += 1;
                if depth > MAX_PATH_DEPTH {
                    return Err(WriteError::invalid_path(path, "path is too deep"));
                }
                normalized.push(component);
            }
            Component::Prefix(_) | Component::RootDir => normalized.push(component),
        }
    }

    Ok(normalized)
}

/// Guard that inspects parent directory chains through a [`FileSystem`]
#[derive(Debug, Clone, Copy)]
pub struct PathGuard<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> PathGuard<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Normalize `path` and verify that none of its ancestors is a symlink.
    ///
    /// Returns the normalized path on success.
    pub fn verify_parent_safe(&self, path: impl AsRef<Path>) -> Result<PathBuf, WriteError> {
        let normalized = normalize_path(path)?;
        if let Some(parent) = normalized.parent() {
            self.verify_dir_no_symlink(parent, &normalized)?;
        }
        Ok(normalized)
    }

    /// Walk `dir` from the root down, refusing the first symlink component.
    ///
    /// `dir` must already be normalized. `dest` is only used for error
    /// reporting. The walk stops early at the first component that does not
    /// exist, since nothing below it can be a link.
    pub fn verify_dir_no_symlink(&self, dir: &Path, dest: &Path) -> Result<(), WriteError> {
        let mut current = PathBuf::new();

        for component in dir.components() {
            current.push(component);
            match component {
                Component::Prefix(_) | Component::RootDir => continue,
                Component::CurDir | Component::ParentDir => {
                    return Err(WriteError::invalid_path(dest, "path is not normalized"));
                }
                Component::Normal(_) => {}
            }

            match self.fs.entry_kind(&current) {
                Ok(EntryKind::Symlink) => return Err(symlink_in_parent(dest, &current)),
                Ok(EntryKind::Missing) => return Ok(()),
                Ok(_) => {}
                Err(e) if is_symlink_loop(&e) => return Err(symlink_in_parent(dest, &current)),
                Err(e) => return Err(WriteError::io("inspect parent directory", &current, e)),
            }
        }

        Ok(())
    }
}

/// Normalize `path` and verify its parent chain against the host filesystem.
///
/// This is the standalone form of the check [`write_atomic`] runs before
/// staging any data.
///
/// [`write_atomic`]: crate::io::write_atomic
pub fn verify_parent_safe(path: impl AsRef<Path>) -> Result<PathBuf, WriteError> {
    PathGuard::new(&OsFileSystem).verify_parent_safe(path)
}

fn symlink_in_parent(dest: &Path, component: &Path) -> WriteError {
    WriteError::SymlinkInParent {
        path: dest.to_path_buf(),
        component: component.to_path_buf(),
    }
}

#[cfg(unix)]
fn is_symlink_loop(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_symlink_loop(_err: &io::Error) -> bool {
    false
}

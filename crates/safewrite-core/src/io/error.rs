//! Error types for atomic commit operations

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while committing a file
///
/// Every variant names the normalized destination so the caller can report
/// it without keeping its own copy of the request.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Path is empty or otherwise unusable as a file destination
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    /// An ancestor directory of the destination is a symbolic link
    #[error("refusing to write {path}: symlink path component {component}")]
    SymlinkInParent { path: PathBuf, component: PathBuf },

    /// Destination exists and is a directory
    #[error("path is a directory, not a file: {path}")]
    DestinationIsDirectory { path: PathBuf },

    /// Destination exists and is neither a regular file nor a symlink
    #[error("refusing to write to non-regular file: {path}")]
    InvalidDestinationType { path: PathBuf },

    /// Destination exists and overwrite was not requested
    #[error("file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// The staging file accepted fewer bytes than the payload holds
    #[error("short write for {path}: wrote {written} bytes, expected {expected}")]
    ShortWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    /// Underlying storage failure
    #[error("I/O error during {op} for {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// Replacing rename still failing after the retry budget was spent
    #[error("failed to commit {path} after {attempts} attempts: {source}")]
    PlatformCommitFailure {
        path: PathBuf,
        attempts: u32,
        source: io::Error,
    },
}

/// Fieldless classification of [`WriteError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteErrorKind {
    InvalidPath,
    SymlinkInParent,
    DestinationIsDirectory,
    InvalidDestinationType,
    AlreadyExists,
    ShortWrite,
    Io,
    PlatformCommitFailure,
}

impl WriteError {
    pub(crate) fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid_path(path: &Path, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.to_path_buf(),
            reason,
        }
    }

    pub(crate) fn already_exists(path: &Path) -> Self {
        Self::AlreadyExists {
            path: path.to_path_buf(),
        }
    }

    /// Classify this error without matching on its fields
    pub fn kind(&self) -> WriteErrorKind {
        match self {
            Self::InvalidPath { .. } => WriteErrorKind::InvalidPath,
            Self::SymlinkInParent { .. } => WriteErrorKind::SymlinkInParent,
            Self::DestinationIsDirectory { .. } => WriteErrorKind::DestinationIsDirectory,
            Self::InvalidDestinationType { .. } => WriteErrorKind::InvalidDestinationType,
            Self::AlreadyExists { .. } => WriteErrorKind::AlreadyExists,
            Self::ShortWrite { .. } => WriteErrorKind::ShortWrite,
            Self::Io { .. } => WriteErrorKind::Io,
            Self::PlatformCommitFailure { .. } => WriteErrorKind::PlatformCommitFailure,
        }
    }

    /// The path this error refers to
    pub fn path(&self) -> &Path {
        match self {
            Self::InvalidPath { path, .. }
            | Self::SymlinkInParent { path, .. }
            | Self::DestinationIsDirectory { path }
            | Self::InvalidDestinationType { path }
            | Self::AlreadyExists { path }
            | Self::ShortWrite { path, .. }
            | Self::Io { path, .. }
            | Self::PlatformCommitFailure { path, .. } => path,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == WriteErrorKind::AlreadyExists
    }
}

impl From<WriteError> for io::Error {
    fn from(err: WriteError) -> Self {
        let kind = match &err {
            WriteError::Io { source, .. } | WriteError::PlatformCommitFailure { source, .. } => {
                source.kind()
            }
            WriteError::InvalidPath { .. } | WriteError::InvalidDestinationType { .. } => {
                io::ErrorKind::InvalidInput
            }
            WriteError::SymlinkInParent { .. } => io::ErrorKind::PermissionDenied,
            WriteError::DestinationIsDirectory { .. } => io::ErrorKind::IsADirectory,
            WriteError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            WriteError::ShortWrite { .. } => io::ErrorKind::WriteZero,
        };
        io::Error::new(kind, err)
    }
}

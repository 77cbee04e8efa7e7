//! Atomic commit engine
//!
//! Every write runs the same four steps:
//!
//! 1. **Validate**: normalize the path, refuse symlinked parents, and check
//!    the destination type (and existence, when overwrite is off) before any
//!    data is staged. The existence check is advisory; the commit primitive
//!    is what enforces no-overwrite under a race.
//! 2. **Stage**: write the payload into a uniquely named file next to the
//!    destination and fsync it.
//! 3. **Commit**: move the staged file into place with the
//!    [`CommitStrategy`] the platform and overwrite flag call for.
//! 4. **Finalize**: best-effort chmod of the destination and flush of the
//!    parent directory.
//!
//! A failure before step 3 leaves the destination untouched, and the staging
//! file is removed on every failure path.

use crate::config::{CommitConfig, ConfigError};
use crate::io::error::WriteError;
use crate::io::fs::{EntryKind, FileSystem, OsFileSystem};
use crate::io::path_guard::PathGuard;
use crate::io::staging::StagingFile;
use crate::io::strategy::{CommitStrategy, PlatformCaps};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Atomic file writer bound to a filesystem, platform capabilities and config
///
/// Holds no locks and no per-call state, so one writer can serve any number
/// of threads.
#[derive(Debug, Clone)]
pub struct AtomicWriter {
    fs: Arc<dyn FileSystem>,
    caps: PlatformCaps,
    config: CommitConfig,
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicWriter {
    /// Writer on the host filesystem with detected capabilities and default config
    pub fn new() -> Self {
        Self {
            fs: Arc::new(OsFileSystem),
            caps: PlatformCaps::detect(),
            config: CommitConfig::default(),
        }
    }

    /// Replace the configuration after validating it
    pub fn with_config(mut self, config: CommitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Override the capability probe, e.g. to drive the Windows strategies elsewhere
    pub fn with_caps(mut self, caps: PlatformCaps) -> Self {
        self.caps = caps;
        self
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    pub fn caps(&self) -> PlatformCaps {
        self.caps
    }

    /// The strategy a write with this overwrite flag will use
    pub fn strategy(&self, overwrite: bool) -> CommitStrategy {
        CommitStrategy::select(self.caps, overwrite, self.config.retry)
    }

    pub fn path_guard(&self) -> PathGuard<'_> {
        PathGuard::new(self.fs.as_ref())
    }

    /// Atomically write `data` to `path` with permission bits `mode`.
    ///
    /// With `overwrite` false the call fails with `AlreadyExists` if the
    /// destination exists, either before staging or at commit time, and an
    /// existing destination is never modified.
    ///
    /// # Errors
    ///
    /// See [`WriteError`]. On error the destination holds its previous
    /// content (or is absent) and no staging file is left behind.
    pub fn write(
        &self,
        path: impl AsRef<Path>,
        data: &[u8],
        mode: u32,
        overwrite: bool,
    ) -> Result<(), WriteError> {
        let dest = self.path_guard().verify_parent_safe(path)?;
        let parent = match (dest.parent(), dest.file_name()) {
            (Some(parent), Some(_)) => parent,
            _ => return Err(WriteError::invalid_path(&dest, "path has no file name")),
        };

        self.check_destination(&dest, overwrite)?;

        let staging = self.stage(parent, &dest, data, mode)?;

        let strategy = self.strategy(overwrite);
        debug!(dest = %dest.display(), ?strategy, bytes = data.len(), "Committing staged file");
        strategy.commit(self.fs.as_ref(), staging, &dest, mode)?;

        self.finalize(parent, &dest, mode);
        Ok(())
    }

    fn check_destination(&self, dest: &Path, overwrite: bool) -> Result<(), WriteError> {
        let kind = self
            .fs
            .entry_kind(dest)
            .map_err(|e| WriteError::io("inspect destination", dest, e))?;

        match kind {
            EntryKind::Missing => Ok(()),
            EntryKind::Directory => Err(WriteError::DestinationIsDirectory {
                path: dest.to_path_buf(),
            }),
            EntryKind::Other => Err(WriteError::InvalidDestinationType {
                path: dest.to_path_buf(),
            }),
            EntryKind::File | EntryKind::Symlink if !overwrite => {
                Err(WriteError::already_exists(dest))
            }
            EntryKind::File | EntryKind::Symlink => Ok(()),
        }
    }

    fn stage<'a>(
        &'a self,
        parent: &Path,
        dest: &Path,
        data: &[u8],
        mode: u32,
    ) -> Result<StagingFile<'a>, WriteError> {
        let mut staging =
            StagingFile::create(self.fs.as_ref(), parent, &self.config.staging_prefix)
                .map_err(|e| WriteError::io("create staging file", dest, e))?;

        if let Err(e) = staging.set_mode(mode) {
            debug!(staging = %staging.path().display(), error = %e, "Could not set staging file mode");
        }

        let written = staging
            .write_payload(data)
            .map_err(|e| WriteError::io("write staging file", dest, e))?;
        if written != data.len() {
            return Err(WriteError::ShortWrite {
                path: dest.to_path_buf(),
                written,
                expected: data.len(),
            });
        }

        staging
            .sync()
            .map_err(|e| WriteError::io("fsync staging file", dest, e))?;
        staging
            .close()
            .map_err(|e| WriteError::io("close staging file", dest, e))?;

        Ok(staging)
    }

    fn finalize(&self, parent: &Path, dest: &Path, mode: u32) {
        if let Err(e) = self.fs.set_mode(dest, mode) {
            debug!(dest = %dest.display(), error = %e, "Could not restore destination mode");
        }

        if self.caps.dir_sync && self.config.sync_parent_dir {
            if let Err(e) = self.fs.sync_dir(parent) {
                debug!(dir = %parent.display(), error = %e, "Parent directory sync failed");
            }
        }
    }
}

/// Process-wide writer: host filesystem, detected capabilities, env config
fn default_writer() -> &'static AtomicWriter {
    static WRITER: OnceLock<AtomicWriter> = OnceLock::new();
    WRITER.get_or_init(|| {
        let writer = AtomicWriter::new();
        match writer.clone().with_config(CommitConfig::from_env()) {
            Ok(configured) => configured,
            Err(e) => {
                warn!("Ignoring environment commit settings: {e}");
                writer
            }
        }
    })
}

/// Atomically write `data` to `path` with permission bits `mode`.
///
/// Either the destination ends up holding exactly `data` or the call fails
/// and the destination is as it was. Uses a process-wide [`AtomicWriter`]
/// configured from `SAFEWRITE_*` environment variables on first use.
///
/// # Example
///
/// ```rust,no_run
/// use safewrite_core::io::write_atomic;
///
/// write_atomic("/tmp/x/out.txt", b"hello\n", 0o640, true)?;
///
/// let err = write_atomic("/tmp/x/out.txt", b"again", 0o640, false).unwrap_err();
/// assert!(err.is_already_exists());
/// # Ok::<(), safewrite_core::io::WriteError>(())
/// ```
pub fn write_atomic(
    path: impl AsRef<Path>,
    data: &[u8],
    mode: u32,
    overwrite: bool,
) -> Result<(), WriteError> {
    default_writer().write(path, data, mode, overwrite)
}

/// [`write_atomic`] for string content
pub fn write_text(
    path: impl AsRef<Path>,
    content: &str,
    mode: u32,
    overwrite: bool,
) -> Result<(), WriteError> {
    write_atomic(path, content.as_bytes(), mode, overwrite)
}

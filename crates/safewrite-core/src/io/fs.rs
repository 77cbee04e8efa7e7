//! Filesystem primitives used by the commit engine
//!
//! The engine never touches `std::fs` directly; everything goes through
//! [`FileSystem`] so that each commit strategy can be driven on any host,
//! including against fault-injecting implementations in tests.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What an lstat of a path found, without following a final symlink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Missing,
    File,
    Symlink,
    Directory,
    /// Fifo, socket, device or anything else that is not a plain file
    Other,
}

impl EntryKind {
    pub fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }

    pub fn exists(self) -> bool {
        self != Self::Missing
    }
}

/// Writable handle to a file created by [`FileSystem`]
pub trait FileHandle: Write + Send {
    /// Flush file data and metadata to the storage device
    fn sync(&mut self) -> io::Result<()>;

    /// Apply POSIX permission bits to the open file
    fn set_mode(&mut self, mode: u32) -> io::Result<()>;
}

impl FileHandle for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }

    fn set_mode(&mut self, mode: u32) -> io::Result<()> {
        let mut perms = self.metadata()?.permissions();
        apply_mode(&mut perms, mode);
        self.set_permissions(perms)
    }
}

/// The storage primitives the engine consumes from its environment
pub trait FileSystem: fmt::Debug + Send + Sync {
    /// Inspect `path` without following a final symlink
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind>;

    /// Create a uniquely named file inside `dir` whose name starts with `prefix`
    fn create_staging(&self, dir: &Path, prefix: &str)
    -> io::Result<(PathBuf, Box<dyn FileHandle>)>;

    /// Create `path`, failing if anything already exists there
    fn create_exclusive(&self, path: &Path, mode: u32) -> io::Result<Box<dyn FileHandle>>;

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Rename `from` onto `to`, replacing an existing `to` where the platform allows
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Rename `from` to `to`, failing with `AlreadyExists` if `to` exists.
    ///
    /// The check and the rename are one step, so a destination created by
    /// another process in between is never replaced. `from` stays in place
    /// on failure.
    fn rename_no_replace(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create `link` as a hard link to `original`; fails if `link` exists
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Change permission bits of `path` itself; never follows a symlink
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Flush directory metadata (new entries) to the storage device
    fn sync_dir(&self, dir: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by the host operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        match fs::symlink_metadata(path) {
            Ok(meta) => Ok(EntryKind::from_file_type(meta.file_type())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryKind::Missing),
            Err(e) => Err(e),
        }
    }

    fn create_staging(
        &self,
        dir: &Path,
        prefix: &str,
    ) -> io::Result<(PathBuf, Box<dyn FileHandle>)> {
        let tmp = tempfile::Builder::new()
            .prefix(prefix)
            .rand_bytes(12)
            .tempfile_in(dir)?;
        // The engine owns removal of the staging file from here on.
        let (file, path) = tmp.keep().map_err(|e| e.error)?;
        Ok((path, Box::new(file)))
    }

    fn create_exclusive(&self, path: &Path, mode: u32) -> io::Result<Box<dyn FileHandle>> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode & 0o7777);
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(Box::new(options.open(path)?))
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn rename_no_replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        // renameat2(RENAME_NOREPLACE) or link+unlink on unix, MoveFileExW
        // without MOVEFILE_REPLACE_EXISTING on windows
        let staged = tempfile::TempPath::from_path(from);
        staged.persist_noclobber(to).map_err(|e| {
            let tempfile::PathPersistError { error, path } = e;
            // Hand `from` back to the caller instead of deleting it on drop.
            if let Err(keep_err) = path.keep() {
                debug!(path = %from.display(), error = %keep_err.error, "Could not release staged path");
            }
            error
        })
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(original, link)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.file_type().is_symlink() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to change mode through a symlink",
            ));
        }
        let mut perms = meta.permissions();
        apply_mode(&mut perms, mode);
        fs::set_permissions(path, perms)
    }

    #[cfg(unix)]
    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        File::open(dir)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_dir(&self, _dir: &Path) -> io::Result<()> {
        // Directory handles cannot be flushed reliably here.
        Ok(())
    }
}

#[cfg(unix)]
fn apply_mode(perms: &mut fs::Permissions, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(mode & 0o7777);
}

/// Only the write bits carry over: no write bit means read-only.
#[cfg(not(unix))]
fn apply_mode(perms: &mut fs::Permissions, mode: u32) {
    perms.set_readonly(mode & 0o222 == 0);
}

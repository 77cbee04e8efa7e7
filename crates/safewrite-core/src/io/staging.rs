//! Staging file ownership
//!
//! A [`StagingFile`] lives in the destination's directory and is removed when
//! dropped, unless a commit moved it away under the destination name.

use crate::io::fs::{FileHandle, FileSystem};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub(crate) struct StagingFile<'a> {
    fs: &'a dyn FileSystem,
    path: PathBuf,
    handle: Option<Box<dyn FileHandle>>,
    armed: bool,
}

impl<'a> StagingFile<'a> {
    pub(crate) fn create(fs: &'a dyn FileSystem, dir: &Path, prefix: &str) -> io::Result<Self> {
        let (path, handle) = fs.create_staging(dir, prefix)?;
        debug!(staging = %path.display(), "Created staging file");
        Ok(Self {
            fs,
            path,
            handle: Some(handle),
            armed: true,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn set_mode(&mut self, mode: u32) -> io::Result<()> {
        self.handle_mut()?.set_mode(mode)
    }

    /// Write `data`, returning how many bytes the file accepted.
    ///
    /// Stops early if a write reports zero bytes; the caller compares the
    /// count against the payload length.
    pub(crate) fn write_payload(&mut self, data: &[u8]) -> io::Result<usize> {
        let handle = self.handle_mut()?;
        let mut written = 0;
        while written < data.len() {
            match handle.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    pub(crate) fn sync(&mut self) -> io::Result<()> {
        let handle = self.handle_mut()?;
        handle.flush()?;
        handle.sync()
    }

    pub(crate) fn close(&mut self) -> io::Result<()> {
        if let Some(mut handle) = self.handle.take() {
            handle.flush()?;
        }
        Ok(())
    }

    /// The staging name was consumed by a rename; nothing left to clean up.
    pub(crate) fn committed(mut self) {
        self.armed = false;
    }

    /// Remove the staging name after its data was linked or copied elsewhere.
    pub(crate) fn discard(mut self) {
        self.cleanup();
    }

    fn handle_mut(&mut self) -> io::Result<&mut Box<dyn FileHandle>> {
        self.handle
            .as_mut()
            .ok_or_else(|| io::Error::other("staging file already closed"))
    }

    fn cleanup(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        self.handle.take();
        if let Err(e) = self.fs.remove_file(&self.path) {
            debug!(
                staging = %self.path.display(),
                error = %e,
                "Failed to remove staging file"
            );
        }
    }
}

impl Drop for StagingFile<'_> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

//! Write sink that syncs every write to storage before returning.

use crate::error::{KeyLogError, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One exclusively owned key log file.
///
/// Each call maps to a single OS write followed, when the whole buffer was
/// written, by a single `sync_all`. No buffering. Not synchronised: wrap it
/// in a lock if it must be shared (see [`crate::FileKeyLog`]).
#[derive(Debug)]
pub struct DurableWriter {
    file: File,
    path: PathBuf,
}

impl DurableWriter {
    pub(crate) fn new(file: File, path: PathBuf) -> Self {
        Self { file, path }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `buf` and sync it.
    ///
    /// A failed or short write returns [`KeyLogError::Write`] carrying the
    /// partial count and skips the sync. A failed sync returns
    /// [`KeyLogError::Durability`]: the bytes may be in the page cache, but
    /// the write counts as zero bytes.
    pub fn write_durable(&mut self, buf: &[u8]) -> Result<usize> {
        let written = self.file.write(buf).map_err(|source| KeyLogError::Write {
            path: self.path.clone(),
            written: 0,
            source,
        })?;
        if written < buf.len() {
            return Err(KeyLogError::Write {
                path: self.path.clone(),
                written,
                source: io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {written} of {} bytes", buf.len()),
                ),
            });
        }
        self.file.sync_all().map_err(|source| KeyLogError::Durability {
            path: self.path.clone(),
            source,
        })?;
        Ok(written)
    }
}

impl Write for DurableWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io_result(self.write_durable(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        // Every successful write is already synced.
        Ok(())
    }
}

/// Map a durable write onto the `io::Write` contract.
fn io_result(result: Result<usize>) -> io::Result<usize> {
    match result {
        Ok(n) => Ok(n),
        // Unsynced partial progress is still progress under io::Write.
        Err(err) if err.bytes_written() > 0 => Ok(err.bytes_written()),
        Err(err) => Err(err.into()),
    }
}

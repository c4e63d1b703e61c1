//! Hands out one exclusively created key log file per request.

use crate::error::{KeyLogError, Result};
use crate::writer::DurableWriter;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// File name for sequence number `seq`: the bare pattern for 1, `pattern.N`
/// for every later number.
pub fn derive_filename(pattern: &Path, seq: u64) -> PathBuf {
    if seq <= 1 {
        return pattern.to_path_buf();
    }
    let mut name = pattern.as_os_str().to_os_string();
    name.push(format!(".{seq}"));
    PathBuf::from(name)
}

/// Allocates key log writers from a shared file name pattern.
///
/// The only shared state is the sequence counter, advanced with a single
/// `fetch_add` per request. Numbers are never handed out twice and never
/// given back, even when the file cannot be created.
#[derive(Debug)]
pub struct KeyLogAllocator {
    pattern: PathBuf,
    counter: AtomicU64,
    verbose: bool,
}

impl KeyLogAllocator {
    pub fn new(pattern: impl Into<PathBuf>) -> Self {
        Self {
            pattern: pattern.into(),
            counter: AtomicU64::new(0),
            verbose: false,
        }
    }

    /// Emit a notice naming each created file.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn pattern(&self) -> &Path {
        &self.pattern
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Last sequence number handed out, 0 before the first allocation.
    pub fn high_water_mark(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Reserve the next sequence number and create its file.
    ///
    /// Fails with [`KeyLogError::Allocation`] if the file already exists or
    /// cannot be created. There is no retry.
    pub fn allocate_writer(&self) -> Result<DurableWriter> {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let path = derive_filename(&self.pattern, seq);
        let file = create_exclusive(&path).map_err(|source| KeyLogError::Allocation {
            path: path.clone(),
            source,
        })?;
        if self.verbose {
            info!(target: "sslkeylog", seq, "writing TLS keys to {}", path.display());
        }
        Ok(DurableWriter::new(file, path))
    }
}

/// Create `path` for writing, failing if it exists. Owner-only on Unix.
fn create_exclusive(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn filename_derivation() {
        let pattern = Path::new("keys.log");
        assert_eq!(derive_filename(pattern, 1), PathBuf::from("keys.log"));
        assert_eq!(derive_filename(pattern, 2), PathBuf::from("keys.log.2"));
        assert_eq!(derive_filename(pattern, 1000), PathBuf::from("keys.log.1000"));
    }

    #[test]
    fn sequential_allocations() {
        let dir = tempdir().unwrap();
        let allocator = KeyLogAllocator::new(dir.path().join("keys.log"));

        let mut writers: Vec<_> = (0..3).map(|_| allocator.allocate_writer().unwrap()).collect();
        let names: Vec<_> = writers
            .iter()
            .map(|w| w.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["keys.log", "keys.log.2", "keys.log.3"]);
        assert_eq!(allocator.high_water_mark(), 3);

        for writer in &mut writers {
            assert_eq!(fs::metadata(writer.path()).unwrap().len(), 0);
            writer.write_all(b"CLIENT_RANDOM aa bb\n").unwrap();
            assert!(fs::metadata(writer.path()).unwrap().len() > 0);
        }
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let pattern = dir.path().join("keys.log");
        fs::write(&pattern, b"out-of-band").unwrap();
        let allocator = KeyLogAllocator::new(&pattern);

        let err = allocator.allocate_writer().unwrap_err();
        match &err {
            KeyLogError::Allocation { path, source } => {
                assert_eq!(path, &pattern);
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("keys.log"));
        assert_eq!(fs::read(&pattern).unwrap(), b"out-of-band");

        // The failed attempt consumed 1.
        let writer = allocator.allocate_writer().unwrap();
        assert_eq!(writer.path(), dir.path().join("keys.log.2"));
    }

    #[test]
    fn missing_directory_fails_and_consumes_number() {
        let dir = tempdir().unwrap();
        let allocator = KeyLogAllocator::new(dir.path().join("missing").join("keys.log"));
        assert!(matches!(
            allocator.allocate_writer(),
            Err(KeyLogError::Allocation { .. })
        ));
        assert_eq!(allocator.high_water_mark(), 1);
        assert!(allocator.allocate_writer().is_err());
        assert_eq!(allocator.high_water_mark(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let allocator = KeyLogAllocator::new(dir.path().join("keys.log"));
        let writer = allocator.allocate_writer().unwrap();
        let mode = fs::metadata(writer.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "mode {mode:o}");
        assert_eq!(mode & 0o600, 0o600, "mode {mode:o}");
    }
}

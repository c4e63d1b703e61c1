//! Error types for key log allocation, writing and transport patching.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by `sslkeylog`.
#[derive(Debug, Error)]
pub enum KeyLogError {
    /// The derived key log file could not be created. The sequence number
    /// that produced `path` stays consumed.
    #[error("sslkeylog: failed to create key log file {path:?}: {source}")]
    Allocation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The OS write failed or was short; `written` bytes reached the file
    /// and were not synced.
    #[error("sslkeylog: write to {path:?} failed after {written} bytes: {source}")]
    Write {
        path: PathBuf,
        written: usize,
        #[source]
        source: io::Error,
    },

    /// The write succeeded but could not be synced to storage. The logical
    /// write counts as zero bytes.
    #[error("sslkeylog: failed to sync {path:?}: {source}")]
    Durability {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The transport handed to a patch operation is not a `TlsTransport`.
    #[error("sslkeylog: cannot configure transport, it's not a TlsTransport (got {kind})")]
    UnsupportedTransport { kind: &'static str },

    /// Building a rustls configuration failed.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// No usable PEM item was found.
    #[error("no {what} found in {path:?}")]
    Pem { what: &'static str, path: PathBuf },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl KeyLogError {
    /// Bytes that reached the file before the error. Always zero unless the
    /// error is a partial [`KeyLogError::Write`].
    pub fn bytes_written(&self) -> usize {
        match self {
            KeyLogError::Write { written, .. } => *written,
            _ => 0,
        }
    }
}

impl From<KeyLogError> for io::Error {
    fn from(err: KeyLogError) -> Self {
        match err {
            KeyLogError::Io(e) => e,
            KeyLogError::Allocation { source, .. }
            | KeyLogError::Write { source, .. }
            | KeyLogError::Durability { source, .. } => source,
            other => io::Error::other(other),
        }
    }
}

/// Result type for `sslkeylog` operations.
pub type Result<T> = std::result::Result<T, KeyLogError>;

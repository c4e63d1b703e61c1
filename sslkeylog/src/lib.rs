//! Opt-in TLS key logging for rustls, driven by `SSLKEYLOGFILE`.
//!
//! When `SSLKEYLOGFILE` is set, every TLS config built through a
//! [`KeyLogging`] handle writes its session secrets to its own file, in the
//! NSS key log format that Wireshark and similar tools read. The first file
//! is named after the variable itself; later ones get a sequence suffix
//! (`keys.log`, `keys.log.2`, `keys.log.3`, ...). Files are created
//! exclusively with owner-only permissions and every line is synced before
//! the handshake continues. When the variable is unset, nothing is created
//! and configs keep the rustls defaults.
//!
//! ```no_run
//! use rustls::RootCertStore;
//! use sslkeylog::KeyLogging;
//!
//! # fn main() -> sslkeylog::Result<()> {
//! let logging = KeyLogging::from_env();
//!
//! // A client config with key logging installed.
//! let config = logging.new_client_config(RootCertStore::empty(), rustls::DEFAULT_VERSIONS)?;
//! # drop(config);
//!
//! // Or a transport, or the process default transport.
//! let transport = logging.new_transport(RootCertStore::empty())?;
//! # drop(transport);
//! logging.patch_default_transport()?;
//! # Ok(())
//! # }
//! ```
//!
//! Logging session secrets defeats TLS for anyone who can read the files.
//! Keep it to debugging.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs;
use std::io::BufReader;
use std::path::Path;

pub mod allocator;
#[cfg(feature = "autopatch")]
pub mod autopatch;
pub mod config;
pub mod error;
pub mod handle;
pub mod keylog;
pub mod session;
#[cfg(test)]
mod test_support;
pub mod transport;
pub mod writer;

pub use allocator::{derive_filename, KeyLogAllocator};
pub use config::{KeyLogSettings, ENV_SSLKEYLOGFILE, ENV_SSLKEYLOGFILE_VERBOSE};
pub use error::{KeyLogError, Result};
pub use handle::KeyLogging;
pub use keylog::FileKeyLog;
pub use session::{describe_certificate, CertificateSummary, SessionSummary};
pub use transport::{
    client_config, default_transport, set_default_transport, ClientTlsStream, TlsTransport,
    Transport,
};
pub use writer::DurableWriter;

// 从文件加载证书
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(fs::File::open(path)?))
        .collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(KeyLogError::Pem {
            what: "certificate",
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}

// 从文件加载私钥
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut BufReader::new(fs::File::open(path)?))?.ok_or_else(|| {
        KeyLogError::Pem {
            what: "private key",
            path: path.to_path_buf(),
        }
    })
}

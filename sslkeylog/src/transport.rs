//! Client transports that key logging can be retrofitted onto.

use crate::error::{KeyLogError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustls::crypto::ring;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, KeyLog, RootCertStore, SupportedProtocolVersion};
use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

pub use tokio_rustls::client::TlsStream as ClientTlsStream;

/// A client transport held in a shared slot, such as the process default.
///
/// Patch operations downcast to [`TlsTransport`]; any other implementation is
/// reported with its [`Transport::kind`].
pub trait Transport: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Build a ring-backed client config trusting `roots`.
pub fn client_config(
    roots: impl Into<Arc<RootCertStore>>,
    versions: &[&'static SupportedProtocolVersion],
) -> Result<ClientConfig> {
    let config = ClientConfig::builder_with_provider(ring::default_provider().into())
        .with_protocol_versions(versions)?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

/// TLS over TCP, using `tls_config` when set and a default config built from
/// `roots` otherwise.
#[derive(Debug, Clone)]
pub struct TlsTransport {
    roots: Arc<RootCertStore>,
    tls_config: Option<Arc<ClientConfig>>,
}

impl Default for TlsTransport {
    fn default() -> Self {
        Self::new(RootCertStore::empty())
    }
}

impl TlsTransport {
    pub fn new(roots: impl Into<Arc<RootCertStore>>) -> Self {
        Self {
            roots: roots.into(),
            tls_config: None,
        }
    }

    pub fn with_tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    pub fn tls_config(&self) -> Option<&Arc<ClientConfig>> {
        self.tls_config.as_ref()
    }

    /// Route session secrets to `key_log`.
    ///
    /// The current config may be shared with other holders, so it is cloned
    /// before mutation; without one a default config is built from the roots.
    pub fn install_key_log(&mut self, key_log: Arc<dyn KeyLog>) -> Result<()> {
        let mut config = match &self.tls_config {
            Some(shared) => ClientConfig::clone(shared),
            None => client_config(Arc::clone(&self.roots), rustls::DEFAULT_VERSIONS)?,
        };
        config.key_log = key_log;
        self.tls_config = Some(Arc::new(config));
        Ok(())
    }

    fn effective_config(&self) -> Result<Arc<ClientConfig>> {
        match &self.tls_config {
            Some(config) => Ok(Arc::clone(config)),
            None => Ok(Arc::new(client_config(
                Arc::clone(&self.roots),
                rustls::DEFAULT_VERSIONS,
            )?)),
        }
    }

    /// Open a TCP connection to `addr` and run the TLS handshake.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        server_name: ServerName<'static>,
    ) -> Result<ClientTlsStream<TcpStream>> {
        let connector = TlsConnector::from(self.effective_config()?);
        let tcp = TcpStream::connect(addr).await?;
        Ok(connector.connect(server_name, tcp).await?)
    }
}

impl Transport for TlsTransport {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

static DEFAULT_TRANSPORT: Lazy<RwLock<Box<dyn Transport>>> =
    Lazy::new(|| RwLock::new(Box::new(TlsTransport::default())));

/// The process-wide default transport. Starts as a [`TlsTransport`] with no
/// trust anchors.
pub fn default_transport() -> &'static RwLock<Box<dyn Transport>> {
    &DEFAULT_TRANSPORT
}

/// Replace the default transport, returning the previous one.
pub fn set_default_transport(transport: Box<dyn Transport>) -> Box<dyn Transport> {
    std::mem::replace(&mut *DEFAULT_TRANSPORT.write(), transport)
}

/// Downcast `transport` for patching.
pub(crate) fn as_tls_transport(transport: &mut dyn Transport) -> Result<&mut TlsTransport> {
    let kind = transport.kind();
    transport
        .as_any_mut()
        .downcast_mut::<TlsTransport>()
        .ok_or(KeyLogError::UnsupportedTransport { kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::KeyLogAllocator;
    use crate::keylog::FileKeyLog;
    use tempfile::tempdir;

    #[derive(Debug)]
    struct PlainTcp;

    impl Transport for PlainTcp {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn downcast_rejects_other_transports() {
        let mut plain = PlainTcp;
        let err = as_tls_transport(&mut plain).unwrap_err();
        assert!(err.to_string().contains("PlainTcp"), "{err}");

        let mut tls = TlsTransport::default();
        assert!(as_tls_transport(&mut tls).is_ok());
    }

    #[test]
    fn install_builds_config_when_missing() {
        let dir = tempdir().unwrap();
        let allocator = KeyLogAllocator::new(dir.path().join("keys.log"));
        let mut transport = TlsTransport::default();
        assert!(transport.tls_config().is_none());

        let key_log = Arc::new(FileKeyLog::new(allocator.allocate_writer().unwrap()));
        transport.install_key_log(key_log).unwrap();
        let config = transport.tls_config().unwrap();
        assert!(config.key_log.will_log("CLIENT_RANDOM"));
    }

    #[test]
    fn install_leaves_shared_config_untouched() {
        let dir = tempdir().unwrap();
        let allocator = KeyLogAllocator::new(dir.path().join("keys.log"));
        let shared =
            Arc::new(client_config(RootCertStore::empty(), rustls::DEFAULT_VERSIONS).unwrap());
        let mut transport = TlsTransport::default().with_tls_config(Arc::clone(&shared));

        let key_log = Arc::new(FileKeyLog::new(allocator.allocate_writer().unwrap()));
        transport.install_key_log(key_log).unwrap();

        assert!(!shared.key_log.will_log("CLIENT_RANDOM"));
        let patched = transport.tls_config().unwrap();
        assert!(!Arc::ptr_eq(patched, &shared));
        assert!(patched.key_log.will_log("CLIENT_RANDOM"));
    }
}

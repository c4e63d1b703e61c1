//! The key logging handle passed to code that builds TLS configs.

use crate::allocator::KeyLogAllocator;
use crate::config::KeyLogSettings;
use crate::error::Result;
use crate::keylog::FileKeyLog;
use crate::transport::{self, Transport, TlsTransport};
use rustls::{ClientConfig, KeyLog, RootCertStore, ServerConfig, SupportedProtocolVersion};
use std::sync::Arc;
use tracing::info;

/// Optional key log allocator shared by every config built from this handle.
///
/// Construct it once at startup (usually with [`KeyLogging::from_env`]) and
/// pass clones to whatever builds TLS configs. A disabled handle turns every
/// operation into a no-op that leaves rustls defaults in place and creates no
/// files.
#[derive(Debug, Clone, Default)]
pub struct KeyLogging {
    allocator: Option<Arc<KeyLogAllocator>>,
}

impl KeyLogging {
    /// Configure from `SSLKEYLOGFILE` and `SSLKEYLOGFILE_VERBOSE`.
    pub fn from_env() -> Self {
        Self::from_settings(&KeyLogSettings::from_env())
    }

    pub fn from_settings(settings: &KeyLogSettings) -> Self {
        match &settings.pattern {
            Some(pattern) => {
                if settings.verbose {
                    info!(
                        target: "sslkeylog",
                        "enabled, writing TLS keys to {}",
                        pattern.display()
                    );
                }
                Self::with_allocator(KeyLogAllocator::new(pattern).with_verbose(settings.verbose))
            }
            None => Self::disabled(),
        }
    }

    pub fn disabled() -> Self {
        Self { allocator: None }
    }

    pub fn with_allocator(allocator: KeyLogAllocator) -> Self {
        Self {
            allocator: Some(Arc::new(allocator)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.allocator.is_some()
    }

    pub fn allocator(&self) -> Option<&KeyLogAllocator> {
        self.allocator.as_deref()
    }

    /// A key log hook writing to a fresh file, or `None` when disabled.
    pub fn new_key_log(&self) -> Result<Option<Arc<dyn KeyLog>>> {
        let Some(allocator) = self.allocator.as_deref() else {
            return Ok(None);
        };
        let key_log: Arc<dyn KeyLog> = Arc::new(FileKeyLog::new(allocator.allocate_writer()?));
        Ok(Some(key_log))
    }

    /// Build a client config trusting `roots`, with key logging when enabled.
    pub fn new_client_config(
        &self,
        roots: impl Into<Arc<RootCertStore>>,
        versions: &[&'static SupportedProtocolVersion],
    ) -> Result<ClientConfig> {
        let mut config = transport::client_config(roots, versions)?;
        self.apply_to_client(&mut config)?;
        Ok(config)
    }

    pub fn apply_to_client(&self, config: &mut ClientConfig) -> Result<()> {
        if let Some(key_log) = self.new_key_log()? {
            config.key_log = key_log;
        }
        Ok(())
    }

    pub fn apply_to_server(&self, config: &mut ServerConfig) -> Result<()> {
        if let Some(key_log) = self.new_key_log()? {
            config.key_log = key_log;
        }
        Ok(())
    }

    /// A transport trusting `roots`, with key logging when enabled.
    pub fn new_transport(&self, roots: impl Into<Arc<RootCertStore>>) -> Result<TlsTransport> {
        let mut transport = TlsTransport::new(roots);
        if let Some(key_log) = self.new_key_log()? {
            transport.install_key_log(key_log)?;
        }
        Ok(transport)
    }

    /// Retrofit key logging onto an existing transport.
    ///
    /// Fails with [`crate::KeyLogError::UnsupportedTransport`] if `transport`
    /// is not a [`TlsTransport`]; the check runs before a file is allocated.
    /// Does nothing when disabled.
    pub fn patch_transport(&self, transport: &mut dyn Transport) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let tls = transport::as_tls_transport(transport)?;
        if let Some(key_log) = self.new_key_log()? {
            tls.install_key_log(key_log)?;
        }
        Ok(())
    }

    /// [`KeyLogging::patch_transport`] applied to the process default transport.
    pub fn patch_default_transport(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let mut guard = transport::default_transport().write();
        self.patch_transport(&mut **guard)?;
        if self.allocator.as_deref().is_some_and(KeyLogAllocator::is_verbose) {
            info!(target: "sslkeylog", "enabled for default transport");
        }
        Ok(())
    }
}

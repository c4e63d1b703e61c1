//! Opt-in patching of the default transport from the environment.
//!
//! Enabled by the `autopatch` cargo feature. Call [`install`] early in
//! `main`, after any [`crate::set_default_transport`] and before the default
//! transport is first used.

use crate::error::Result;
use crate::handle::KeyLogging;

/// Read the environment and patch the default transport.
///
/// A default transport that is not a [`crate::TlsTransport`] is returned as
/// an error; whether that is fatal is up to the caller.
pub fn install() -> Result<KeyLogging> {
    let logging = KeyLogging::from_env();
    logging.patch_default_transport()?;
    Ok(logging)
}

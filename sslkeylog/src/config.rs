//! Environment configuration.
//!
//! Key logging is driven by two variables:
//! - `SSLKEYLOGFILE`: base file name for key log files. Unset or empty
//!   disables the feature.
//! - `SSLKEYLOGFILE_VERBOSE`: boolean, enables notices about which files are
//!   written.
//!
//! Verbose notices are `tracing` events at `info` level with target
//! `sslkeylog`. They are only printed if the host installs a subscriber; a
//! process without one stays silent even with `SSLKEYLOGFILE_VERBOSE=1`.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

pub const ENV_SSLKEYLOGFILE: &str = "SSLKEYLOGFILE";
pub const ENV_SSLKEYLOGFILE_VERBOSE: &str = "SSLKEYLOGFILE_VERBOSE";

/// Snapshot of the key log configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyLogSettings {
    /// Base file name. `None` means key logging is disabled.
    pub pattern: Option<PathBuf>,
    /// Emit notices about created files.
    pub verbose: bool,
}

impl KeyLogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Read settings through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let pattern = lookup(ENV_SSLKEYLOGFILE)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let verbose = lookup(ENV_SSLKEYLOGFILE_VERBOSE)
            .and_then(|v| v.to_str().and_then(parse_bool))
            .unwrap_or(false);
        Self { pattern, verbose }
    }

    /// Set the base file name.
    pub fn with_pattern(mut self, pattern: impl Into<PathBuf>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set verbose notices.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.pattern.is_some()
    }
}

/// Parse a boolean flag value. Case-insensitive; `None` if unrecognised.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}

//! Human-readable summaries of a finished handshake.

use rustls::{CipherSuite, CommonState, ProtocolVersion};
use std::fmt;
use x509_parser::prelude::*;

/// Negotiated parameters of one TLS session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub protocol_version: Option<ProtocolVersion>,
    pub cipher_suite: Option<CipherSuite>,
    pub peer_certificate: Option<CertificateSummary>,
}

impl SessionSummary {
    /// Works for both client and server connections.
    pub fn from_state(state: &CommonState) -> Self {
        Self {
            protocol_version: state.protocol_version(),
            cipher_suite: state.negotiated_cipher_suite().map(|s| s.suite()),
            peer_certificate: state
                .peer_certificates()
                .and_then(|certs| certs.first())
                .and_then(|der| describe_certificate(der.as_ref())),
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(version) = self.protocol_version {
            writeln!(f, "Protocol Version: {:?}", version)?;
        }
        if let Some(suite) = self.cipher_suite {
            writeln!(f, "Cipher Suite: {:?}", suite)?;
        }
        if let Some(cert) = &self.peer_certificate {
            write!(f, "{}", cert)?;
        }
        Ok(())
    }
}

/// The fields of a leaf certificate worth printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub serial_hex: String,
    pub not_before: String,
    pub not_after: String,
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  - Subject: {}", self.subject)?;
        writeln!(f, "  - Issuer: {}", self.issuer)?;
        writeln!(f, "  - Serial Number: {}", self.serial_hex)?;
        writeln!(
            f,
            "  - Validity: Not Before: {}, Not After: {}",
            self.not_before, self.not_after
        )
    }
}

/// Parse a DER certificate. `None` if it is not valid X.509.
pub fn describe_certificate(der: &[u8]) -> Option<CertificateSummary> {
    let (_, cert) = parse_x509_certificate(der).ok()?;
    Some(CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial_hex: hex::encode(cert.raw_serial()),
        not_before: cert.validity().not_before.to_string(),
        not_after: cert.validity().not_after.to_string(),
    })
}

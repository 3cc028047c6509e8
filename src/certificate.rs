//! Client certificate for TLS client authentication.
//!
//! Holds the PEM bundle (certificate chain plus private key) handed to the
//! transport, and the subject fields used to name the certificate in logs.
//! The key material itself is never printed.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use x509_parser::certificate::X509Certificate;
use x509_parser::pem::Pem;

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Client certificate
// ─────────────────────────────────────────────────────────────────────────────

/// A PEM client certificate with its private key
#[derive(Clone)]
pub struct ClientCertificate {
    pem: Arc<[u8]>,
    common_name: Option<String>,
    display_name: String,
}

impl ClientCertificate {
    /// Build from a PEM bundle holding the certificate chain and the private key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the bundle has no certificate, no private key,
    /// or is not accepted as a TLS identity.
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Result<Self> {
        let pem: Vec<u8> = pem.into();

        let mut leaf: Option<Pem> = None;
        let mut has_key = false;
        for block in Pem::iter_from_buffer(&pem) {
            let block =
                block.map_err(|e| Error::Config(format!("Invalid client certificate PEM: {e}")))?;
            if block.label == "CERTIFICATE" {
                if leaf.is_none() {
                    leaf = Some(block);
                }
            } else if block.label.ends_with("PRIVATE KEY") {
                has_key = true;
            }
        }

        let leaf = leaf.ok_or_else(|| {
            Error::Config("Client certificate PEM contains no CERTIFICATE block".to_string())
        })?;
        if !has_key {
            return Err(Error::Config(
                "Client certificate PEM contains no private key".to_string(),
            ));
        }

        let cert = leaf
            .parse_x509()
            .map_err(|e| Error::Config(format!("Failed to parse client certificate: {e}")))?;
        let common_name = extract_cn(&cert);
        let display_name = common_name.clone().unwrap_or_else(|| "<unknown>".to_owned());

        reqwest::Identity::from_pem(&pem)
            .map_err(|e| Error::Config(format!("Client certificate rejected: {e}")))?;

        Ok(Self {
            pem: pem.into(),
            common_name,
            display_name,
        })
    }

    /// Read the certificate and key from separate PEM files
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let mut pem = std::fs::read(cert_path)?;
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend(std::fs::read(key_path)?);
        Self::from_pem(pem)
    }

    /// Subject Common Name, if any
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    /// Label for logs
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Raw PEM bundle
    pub fn pem(&self) -> &[u8] {
        &self.pem
    }

    /// TLS identity for the HTTP client
    pub fn identity(&self) -> Result<reqwest::Identity> {
        reqwest::Identity::from_pem(&self.pem)
            .map_err(|e| Error::Config(format!("Client certificate rejected: {e}")))
    }
}

impl PartialEq for ClientCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.pem == other.pem
    }
}

impl Eq for ClientCertificate {}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

fn extract_cn(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_owned)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

use std::sync::Arc;

use thiserror::Error;
use x509_parser::prelude::*;

/// Error type for certificate handling.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),

    #[error("PEM error: {0}")]
    Pem(String),
}

/// A certificate held as raw DER bytes with extracted metadata.
///
/// The raw bytes are the source of truth; `parse` re-borrows the full
/// X.509 structure from them on demand.
#[derive(Debug, Clone)]
pub struct CertificateEntry {
    pub raw: Arc<Vec<u8>>,
    /// Serial number as big-endian bytes, without leading zeros.
    pub serial: Vec<u8>,
    pub subject: String,
    pub issuer: String,
}

impl CertificateEntry {
    /// Create a certificate entry from DER-encoded bytes.
    pub fn from_der(der: impl AsRef<[u8]>) -> Result<Self, CertificateError> {
        let der_bytes = der.as_ref();
        let (_, cert) =
            X509Certificate::from_der(der_bytes).map_err(|e| CertificateError::X509(e.into()))?;

        Ok(Self {
            raw: Arc::new(der_bytes.to_vec()),
            serial: cert.tbs_certificate.serial.to_bytes_be(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
        })
    }

    /// Create a certificate entry from a PEM-encoded certificate.
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self, CertificateError> {
        let (_, doc) = x509_parser::pem::parse_x509_pem(pem.as_ref())
            .map_err(|e| CertificateError::Pem(e.to_string()))?;
        Self::from_der(&doc.contents)
    }

    /// Parse the certificate from the stored DER bytes.
    pub fn parse(&self) -> Result<X509Certificate<'_>, CertificateError> {
        let (_, cert) =
            X509Certificate::from_der(&self.raw).map_err(|e| CertificateError::X509(e.into()))?;
        Ok(cert)
    }

    pub fn serial_hex(&self) -> String {
        hex::encode(&self.serial)
    }
}

impl PartialEq for CertificateEntry {
    fn eq(&self, other: &Self) -> bool {
        // DER is canonical, so byte equality subsumes subject, issuer,
        // serial and signature equality.
        self.raw == other.raw
    }
}

impl Eq for CertificateEntry {}

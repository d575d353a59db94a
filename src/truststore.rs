use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::fs;
use walkdir::WalkDir;

use crate::cert::{CertificateEntry, CertificateError};

/// Error type for trust anchor store operations.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    #[error("certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<walkdir::Error> for TrustStoreError {
    fn from(e: walkdir::Error) -> Self {
        TrustStoreError::Io(e.into())
    }
}

/// Set of self-signed root certificates accepted as terminal authority.
///
/// Read-only during validation; anchors are typically loaded once at
/// startup. Updates at runtime require external synchronization and are
/// expected to be rare.
#[derive(Debug, Clone, Default)]
pub struct TrustAnchorStore {
    anchors: Arc<DashMap<String, CertificateEntry>>,
}

impl TrustAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single anchor.
    pub fn add_anchor(&self, anchor: CertificateEntry) {
        if anchor.subject != anchor.issuer {
            tracing::warn!(
                "trust anchor {} is not self-signed (issued by {})",
                anchor.subject,
                anchor.issuer
            );
        }
        self.anchors.insert(anchor.serial_hex(), anchor);
    }

    /// Add DER-encoded anchors, skipping entries that fail to parse.
    ///
    /// Returns the number of anchors added.
    pub fn add_anchors_der<I, D>(&self, der_certs: I) -> usize
    where
        I: IntoIterator<Item = D>,
        D: AsRef<[u8]>,
    {
        let mut count = 0;
        for der in der_certs {
            match CertificateEntry::from_der(der.as_ref()) {
                Ok(entry) => {
                    self.add_anchor(entry);
                    count += 1;
                }
                Err(e) => tracing::warn!("skipping unparseable trust anchor: {e}"),
            }
        }
        count
    }

    /// Load anchors from a directory of `.der`, `.pem` or `.crt` files.
    pub async fn load_from_dir<P: Into<PathBuf>>(&self, dir: P) -> Result<usize, TrustStoreError> {
        let dir = dir.into();
        let mut count = 0;

        for entry in WalkDir::new(&dir) {
            let entry = entry?;
            let path = entry.path();

            let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
                continue;
            };
            let is_pem = ext.eq_ignore_ascii_case("pem");
            if !is_pem && !ext.eq_ignore_ascii_case("der") && !ext.eq_ignore_ascii_case("crt") {
                continue;
            }

            let Ok(bytes) = fs::read(path).await else {
                continue;
            };
            let parsed = if is_pem {
                CertificateEntry::from_pem(&bytes)
            } else {
                CertificateEntry::from_der(&bytes)
            };
            match parsed {
                Ok(anchor) => {
                    self.add_anchor(anchor);
                    count += 1;
                }
                Err(e) => tracing::warn!("skipping {}: {e}", path.display()),
            }
        }
        tracing::info!("loaded {count} trust anchors from {}", dir.display());
        Ok(count)
    }

    /// Whether `cert` is one of the stored anchors, by exact certificate
    /// equality.
    pub fn contains(&self, cert: &CertificateEntry) -> bool {
        self.anchors
            .get(&cert.serial_hex())
            .is_some_and(|anchor| anchor.value() == cert)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Snapshot of all stored anchors.
    pub fn iter(&self) -> Vec<CertificateEntry> {
        self.anchors.iter().map(|e| e.value().clone()).collect()
    }
}

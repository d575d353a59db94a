//! The trust-linker contract.
//!
//! A trust linker decides, for one (child, issuer) pair at a given
//! validation time, whether revocation information confirms or denies the
//! trust edge between them. Linkers are independent values held by the
//! validator in an ordered pipeline; the first definitive verdict wins and
//! an abstaining linker hands over to the next one.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use ::time::OffsetDateTime;
use x509_parser::prelude::*;

use crate::cert::{CertificateEntry, CertificateError};
use crate::crl::CrlError;
use crate::revocation::RevocationData;

/// Reason codes attached to a negative trust decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustLinkerReason {
    InvalidSignature,
    InvalidRevocationStatus,
    InvalidValidityInterval,
    InvalidKeyUsage,
    InvalidTrust,
    InvalidAlgorithm,
    RootNotTrusted,
}

impl fmt::Display for TrustLinkerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidRevocationStatus => "INVALID_REVOCATION_STATUS",
            Self::InvalidValidityInterval => "INVALID_VALIDITY_INTERVAL",
            Self::InvalidKeyUsage => "INVALID_KEY_USAGE",
            Self::InvalidTrust => "INVALID_TRUST",
            Self::InvalidAlgorithm => "INVALID_ALGORITHM",
            Self::RootNotTrusted => "ROOT_NOT_TRUSTED",
        };
        f.write_str(s)
    }
}

/// A negative trust decision: reason code plus a diagnostic message naming
/// the offending certificate and, where applicable, the CRL serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustVerdict {
    pub reason: TrustLinkerReason,
    pub message: String,
}

impl TrustVerdict {
    pub fn new(reason: TrustLinkerReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for TrustVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Outcome of consulting a single trust linker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustLinkerResult {
    /// The linker confirms the trust edge.
    Trusted,
    /// The linker denies the trust edge; fatal for the whole chain.
    Untrusted(TrustVerdict),
    /// The linker has no opinion; the next linker in the pipeline decides.
    Abstain,
}

impl TrustLinkerResult {
    pub fn untrusted(reason: TrustLinkerReason, message: impl Into<String>) -> Self {
        Self::Untrusted(TrustVerdict::new(reason, message))
    }

    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Abstain)
    }
}

/// Fatal linker failures, distinct from an Untrusted verdict.
///
/// These indicate malformed structures in data that already passed earlier
/// parsing (a trusted issuer's CRL, the child's own extensions), so they
/// point at a programmer or repository fault rather than at the peer.
#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("certificate structure error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("CRL error: {0}")]
    Crl(#[from] CrlError),

    #[error("invalid CRL distribution URI {uri}: {detail}")]
    InvalidUri { uri: String, detail: String },
}

/// A pluggable step deciding revocation for one (child, issuer) pair.
#[async_trait]
pub trait TrustLinker: Send + Sync {
    /// Short identifier used in log output.
    fn name(&self) -> &'static str;

    /// Decide whether revocation information establishes a trust link from
    /// `issuer` to `child` at the given validation time. Evidence that was
    /// actually consulted is appended to `revocation`.
    async fn has_trust_link(
        &self,
        child: &CertificateEntry,
        issuer: &CertificateEntry,
        at: OffsetDateTime,
        revocation: &mut RevocationData,
    ) -> Result<TrustLinkerResult, LinkerError>;
}

/// An optional predicate over the leaf certificate, checked after path
/// validation succeeds.
pub trait CertificateConstraint: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, leaf: &CertificateEntry) -> Result<(), TrustVerdict>;
}

/// Requires the leaf to carry an ExtendedKeyUsage extension covering the
/// selected purposes (the anyExtendedKeyUsage OID also satisfies them).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedKeyUsageConstraint {
    pub client_auth: bool,
    pub server_auth: bool,
}

impl CertificateConstraint for ExtendedKeyUsageConstraint {
    fn name(&self) -> &'static str {
        "extended-key-usage"
    }

    fn check(&self, leaf: &CertificateEntry) -> Result<(), TrustVerdict> {
        let Ok(cert) = leaf.parse() else {
            return Err(TrustVerdict::new(
                TrustLinkerReason::InvalidTrust,
                format!("cannot parse leaf certificate {}", leaf.subject),
            ));
        };

        let eku = cert.tbs_certificate.extensions().iter().find_map(|ext| {
            match ext.parsed_extension() {
                ParsedExtension::ExtendedKeyUsage(eku) => Some(eku),
                _ => None,
            }
        });

        let Some(eku) = eku else {
            return Err(TrustVerdict::new(
                TrustLinkerReason::InvalidKeyUsage,
                format!("{} has no extended key usage extension", leaf.subject),
            ));
        };

        if self.client_auth && !(eku.any || eku.client_auth) {
            return Err(TrustVerdict::new(
                TrustLinkerReason::InvalidKeyUsage,
                format!("{} is not certified for client authentication", leaf.subject),
            ));
        }
        if self.server_auth && !(eku.any || eku.server_auth) {
            return Err(TrustVerdict::new(
                TrustLinkerReason::InvalidKeyUsage,
                format!("{} is not certified for server authentication", leaf.subject),
            ));
        }
        Ok(())
    }
}

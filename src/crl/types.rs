use std::collections::HashMap;
use std::sync::Arc;

use ::time::OffsetDateTime;
use tracing::debug;
use x509_parser::prelude::*;

use super::errors::{CrlError, CrlResult};
use super::extensions;

/// Revocation reasons as per RFC 5280
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CaCompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    RemoveFromCrl = 8,
    PrivilegeWithdrawn = 9,
    AaCompromise = 10,
}

impl RevocationReason {
    /// Parse revocation reason from integer value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::KeyCompromise),
            2 => Some(Self::CaCompromise),
            3 => Some(Self::AffiliationChanged),
            4 => Some(Self::Superseded),
            5 => Some(Self::CessationOfOperation),
            6 => Some(Self::CertificateHold),
            8 => Some(Self::RemoveFromCrl),
            9 => Some(Self::PrivilegeWithdrawn),
            10 => Some(Self::AaCompromise),
            _ => None,
        }
    }
}

/// One revoked serial in a CRL.
#[derive(Debug, Clone)]
pub struct RevokedEntry {
    pub revocation_date: OffsetDateTime,
    pub reason: Option<RevocationReason>,
}

/// Cache key for fetched CRLs: source URI plus asserted issuer subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrlCacheKey {
    pub uri: String,
    pub issuer_subject: String,
}

impl CrlCacheKey {
    pub fn new(uri: impl Into<String>, issuer_subject: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            issuer_subject: issuer_subject.into(),
        }
    }
}

/// A fetched and parsed X.509 v2 CRL.
///
/// All fields relevant to revocation decisions are extracted once at parse
/// time; the raw DER bytes are kept for signature verification and for the
/// revocation evidence sink.
#[derive(Debug, Clone)]
pub struct CrlEntry {
    /// The raw CRL data in DER format
    pub raw: Arc<Vec<u8>>,
    /// When this CRL was fetched
    pub fetched_at: OffsetDateTime,
    /// Distribution point URI this CRL was fetched from
    pub uri: String,
    /// The issuer DN of this CRL
    pub issuer: String,
    pub this_update: OffsetDateTime,
    pub next_update: Option<OffsetDateTime>,
    /// Signature algorithm as a dotted-decimal OID
    pub signature_algorithm: String,
    /// Revoked serial numbers (big-endian bytes) and their entries
    pub revoked: HashMap<Vec<u8>, RevokedEntry>,
    /// Raw DER value of the CRLNumber extension (if present)
    pub crl_number: Option<Vec<u8>>,
    /// Raw DER value of the DeltaCRLIndicator extension; present on deltas
    pub delta_crl_indicator: Option<Vec<u8>>,
    /// IssuingDistributionPoint declares this an indirect CRL
    pub indirect: bool,
    /// Delta CRL locations from the FreshestCRL extension
    pub freshest_uris: Vec<String>,
}

impl CrlEntry {
    /// Parse a CRL entry from DER data.
    ///
    /// A failure to parse the outer structure yields `CrlError::Parse`;
    /// malformed extensions yield `CrlError::Extension`, which callers
    /// treat as fatal rather than as a cache miss.
    pub fn from_der(der: Vec<u8>, uri: &str) -> CrlResult<Self> {
        let (_, crl) =
            CertificateRevocationList::from_der(&der).map_err(|e| CrlError::Parse(e.into()))?;

        let issuer = crl.issuer().to_string();
        let this_update = crl.last_update().to_datetime();
        let next_update = crl.next_update().map(|t| t.to_datetime());
        let signature_algorithm = crl.signature_algorithm.algorithm.to_id_string();

        let mut revoked = HashMap::new();
        for revoked_cert in crl.iter_revoked_certificates() {
            let reason = revoked_cert
                .reason_code()
                .and_then(|(_, code)| RevocationReason::from_u8(code.0));
            revoked.insert(
                revoked_cert.user_certificate.to_bytes_be(),
                RevokedEntry {
                    revocation_date: revoked_cert.revocation_date.to_datetime(),
                    reason,
                },
            );
        }

        let crl_number = extensions::crl_number(&crl);
        let delta_crl_indicator = extensions::delta_crl_indicator(&crl);
        let indirect = extensions::is_indirect(&crl)?;
        let freshest_uris = extensions::freshest_crl_uris(&crl)?;

        if let Some(ref num) = crl_number {
            debug!("CRL number: {}", hex::encode(num));
        }

        Ok(Self {
            raw: Arc::new(der),
            fetched_at: OffsetDateTime::now_utc(),
            uri: uri.to_string(),
            issuer,
            this_update,
            next_update,
            signature_algorithm,
            revoked,
            crl_number,
            delta_crl_indicator,
            indirect,
            freshest_uris,
        })
    }

    /// Parse the CRL from the stored DER bytes.
    pub fn parse(&self) -> CrlResult<CertificateRevocationList<'_>> {
        let (_, crl) = CertificateRevocationList::from_der(&self.raw)
            .map_err(|e| CrlError::Parse(e.into()))?;
        Ok(crl)
    }

    /// Freshness predicate: whether this CRL covers the validation time.
    ///
    /// A CRL without nextUpdate never covers anything (fail closed).
    pub fn covers(&self, at: OffsetDateTime) -> bool {
        match self.next_update {
            Some(next_update) => self.this_update <= at && at <= next_update,
            None => false,
        }
    }

    /// Look up a serial in the revoked set.
    pub fn revocation_status(&self, serial: &[u8]) -> Option<&RevokedEntry> {
        self.revoked.get(serial)
    }

    /// Whether this CRL is a delta referring to a base.
    pub fn is_delta(&self) -> bool {
        self.delta_crl_indicator.is_some()
    }
}

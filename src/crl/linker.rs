//! Trust linker implementation based on CRL revocation information.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

use crate::algorithm::AlgorithmPolicy;
use crate::cert::CertificateEntry;
use crate::crypto::{CryptoBackend, DefaultCryptoBackend};
use crate::linker::{LinkerError, TrustLinker, TrustLinkerReason, TrustLinkerResult};
use crate::revocation::{CrlRevocationData, RevocationData};

use super::extensions;
use super::repository::CrlRepository;
use super::types::CrlEntry;

/// Decides revocation status for a (child, issuer) pair from base and
/// delta CRLs published at the child's distribution points.
pub struct CrlTrustLinker {
    repository: Arc<dyn CrlRepository>,
    crypto: Arc<dyn CryptoBackend>,
    algorithms: AlgorithmPolicy,
}

impl CrlTrustLinker {
    pub fn new(repository: Arc<dyn CrlRepository>) -> Self {
        Self::with_crypto(repository, Arc::new(DefaultCryptoBackend))
    }

    pub fn with_crypto(repository: Arc<dyn CrlRepository>, crypto: Arc<dyn CryptoBackend>) -> Self {
        Self {
            repository,
            crypto,
            algorithms: AlgorithmPolicy::default(),
        }
    }

    pub fn set_algorithm_policy(&mut self, policy: AlgorithmPolicy) -> &mut Self {
        self.algorithms = policy;
        self
    }

    /// Integrity of a CRL relative to its asserted issuer: issuer match,
    /// signature, freshness window, cRLSign authorization. Any failure
    /// makes the CRL unusable for this decision (the linker abstains).
    fn check_crl_integrity(
        &self,
        entry: &CrlEntry,
        issuer: &CertificateEntry,
        at: OffsetDateTime,
    ) -> bool {
        if entry.issuer != issuer.subject {
            debug!(
                "CRL issuer {} does not match certificate subject {}",
                entry.issuer, issuer.subject
            );
            return false;
        }

        let Ok(issuer_cert) = issuer.parse() else {
            warn!("cannot parse issuer certificate {}", issuer.subject);
            return false;
        };

        if let Err(e) = self.crypto.verify_crl(&entry.raw, &issuer_cert) {
            debug!("CRL signature verification failed for {}: {e}", entry.uri);
            return false;
        }

        if !entry.covers(at) {
            debug!("CRL {} is outside its validity window at {at}", entry.uri);
            return false;
        }

        if !extensions::has_crl_sign(&issuer_cert) {
            debug!("cRLSign bit not set for CRL issuing certificate {}", issuer.subject);
            return false;
        }

        true
    }

    /// Process one CRL and, for base CRLs, its delta successors.
    ///
    /// `base_crl_number` is set on recursive delta calls and carries the
    /// base's CRLNumber for the linkage check. Recursion depth is bounded
    /// by the number of delta distribution points, since deltas do not
    /// recurse further.
    fn process_crl<'a>(
        &'a self,
        uri: Url,
        child: &'a CertificateEntry,
        issuer: &'a CertificateEntry,
        at: OffsetDateTime,
        revocation: &'a mut RevocationData,
        base_crl_number: Option<Vec<u8>>,
    ) -> Pin<Box<dyn Future<Output = Result<TrustLinkerResult, LinkerError>> + Send + 'a>> {
        Box::pin(async move {
            debug!("processing CRL {uri} for {}", child.subject);

            let Some(entry) = self.repository.find(&uri, issuer, at).await? else {
                return Ok(TrustLinkerResult::Abstain);
            };

            if !self.check_crl_integrity(&entry, issuer, at) {
                return Ok(TrustLinkerResult::Abstain);
            }

            // Weak crypto is fatal, not transient: it must not fall through
            // to the next linker.
            if let TrustLinkerResult::Untrusted(verdict) =
                self.algorithms.check_crl(&entry.signature_algorithm, &entry.issuer)
            {
                return Ok(TrustLinkerResult::Untrusted(verdict));
            }

            // Indirect CRLs are not supported.
            if entry.indirect {
                debug!("indirect CRL detected at {uri}");
                return Ok(TrustLinkerResult::Abstain);
            }

            if let Some(expected) = &base_crl_number
                && entry.delta_crl_indicator.as_ref() != Some(expected)
            {
                warn!(
                    "delta CRL indicator at {uri} does not match the base CRL number"
                );
                return Ok(TrustLinkerResult::Abstain);
            }

            // This CRL is being relied on; record it as evidence.
            revocation.add_crl(CrlRevocationData::new(
                entry.raw.as_ref().clone(),
                &entry.uri,
            ));

            let revoked = entry
                .revocation_status(&child.serial)
                .is_some_and(|e| e.revocation_date <= at);
            if !revoked {
                debug!("CRL {} OK for {} at {at}", entry.uri, child.subject);
            }

            if entry.is_delta() {
                // The base decides for serials a delta does not condemn.
                if !revoked {
                    return Ok(TrustLinkerResult::Abstain);
                }
            } else {
                for delta_uri in &entry.freshest_uris {
                    let parsed = Url::parse(delta_uri).map_err(|e| LinkerError::InvalidUri {
                        uri: delta_uri.clone(),
                        detail: e.to_string(),
                    })?;
                    debug!("trying delta CRL {parsed}");
                    let result = self
                        .process_crl(
                            parsed,
                            child,
                            issuer,
                            at,
                            &mut *revocation,
                            entry.crl_number.clone(),
                        )
                        .await?;
                    if result.is_definitive() {
                        return Ok(result);
                    }
                }
            }

            if revoked {
                return Ok(TrustLinkerResult::untrusted(
                    TrustLinkerReason::InvalidRevocationStatus,
                    format!(
                        "certificate {} (serial {}) revoked by CRL {}",
                        child.subject,
                        child.serial_hex(),
                        entry.uri
                    ),
                ));
            }

            Ok(TrustLinkerResult::Trusted)
        })
    }
}

#[async_trait]
impl TrustLinker for CrlTrustLinker {
    fn name(&self) -> &'static str {
        "crl"
    }

    async fn has_trust_link(
        &self,
        child: &CertificateEntry,
        issuer: &CertificateEntry,
        at: OffsetDateTime,
        revocation: &mut RevocationData,
    ) -> Result<TrustLinkerResult, LinkerError> {
        let uri = {
            let cert = child.parse()?;
            extensions::crl_distribution_uri(&cert)?
        };
        let Some(uri) = uri else {
            debug!("no CRL distribution URI in {}", child.subject);
            return Ok(TrustLinkerResult::Abstain);
        };
        let uri = Url::parse(&uri).map_err(|e| LinkerError::InvalidUri {
            uri,
            detail: e.to_string(),
        })?;

        self.process_crl(uri, child, issuer, at, revocation, None)
            .await
    }
}

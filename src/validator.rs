//! Chain walking and the trust decision.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::algorithm::AlgorithmPolicy;
use crate::cert::CertificateEntry;
use crate::config::ValidatorConfig;
use crate::crl::{CachingCrlRepository, CrlError, CrlTrustLinker, HttpCrlFetcher};
use crate::crl::extensions;
use crate::crypto::{CryptoBackend, DefaultCryptoBackend};
use crate::linker::{
    CertificateConstraint, LinkerError, TrustLinker, TrustLinkerReason, TrustLinkerResult,
    TrustVerdict,
};
use crate::revocation::RevocationData;
use crate::truststore::TrustAnchorStore;

/// Outcome of a failed validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The chain was walked and found untrustworthy.
    #[error("chain untrusted: {0}")]
    Untrusted(TrustVerdict),

    /// A structural fault in data that should have passed earlier parsing;
    /// not a statement about the chain's trustworthiness.
    #[error("internal validation error: {0}")]
    Internal(#[from] LinkerError),

    /// Validation was attempted without any configured trust anchors.
    #[error("no trust anchors configured")]
    NoAnchors,
}

/// What to do with a (child, issuer) pair when every linker abstained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RevocationPolicy {
    /// Reject the chain; unknown revocation status is a failure.
    #[default]
    FailClosed,
    /// Accept the pair with a warning.
    FailOpen,
}

/// Validates ordered certificate chains against trust anchors, with
/// revocation decided by an ordered pipeline of trust linkers.
///
/// The chain is supplied leaf-first; the final element must be one of the
/// configured anchors. Linkers are consulted per adjacent pair in the
/// order they were added, and the first definitive verdict wins.
pub struct TrustValidator {
    anchors: TrustAnchorStore,
    linkers: Vec<Arc<dyn TrustLinker>>,
    constraints: Vec<Arc<dyn CertificateConstraint>>,
    algorithms: AlgorithmPolicy,
    crypto: Arc<dyn CryptoBackend>,
    revocation_policy: RevocationPolicy,
}

impl TrustValidator {
    pub fn new(anchors: TrustAnchorStore) -> Self {
        Self::with_crypto(anchors, Arc::new(DefaultCryptoBackend))
    }

    pub fn with_crypto(anchors: TrustAnchorStore, crypto: Arc<dyn CryptoBackend>) -> Self {
        Self {
            anchors,
            linkers: Vec::new(),
            constraints: Vec::new(),
            algorithms: AlgorithmPolicy::default(),
            crypto,
            revocation_policy: RevocationPolicy::default(),
        }
    }

    /// Build a validator wired for CRL-based revocation checking from
    /// configuration: HTTP fetcher, singleflight cache and CRL linker.
    pub fn with_config(
        anchors: TrustAnchorStore,
        config: &ValidatorConfig,
    ) -> Result<Self, CrlError> {
        let fetcher = HttpCrlFetcher::with_timeout(config.fetcher.timeout_secs)?;
        let repository = Arc::new(CachingCrlRepository::with_capacity(
            Arc::new(fetcher),
            config.cache.max_entries,
        ));
        let mut crl_linker = CrlTrustLinker::new(repository);
        crl_linker.set_algorithm_policy(AlgorithmPolicy::new(config.revocation.allow_sha1_crls));

        let mut validator = Self::new(anchors);
        validator.add_trust_linker(Arc::new(crl_linker));
        validator.set_revocation_policy(if config.revocation.fail_open {
            RevocationPolicy::FailOpen
        } else {
            RevocationPolicy::FailClosed
        });
        Ok(validator)
    }

    /// Append a linker to the ordered pipeline.
    pub fn add_trust_linker(&mut self, linker: Arc<dyn TrustLinker>) -> &mut Self {
        self.linkers.push(linker);
        self
    }

    /// Register an additional predicate over the leaf certificate.
    pub fn add_certificate_constraint(
        &mut self,
        constraint: Arc<dyn CertificateConstraint>,
    ) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    pub fn set_revocation_policy(&mut self, policy: RevocationPolicy) -> &mut Self {
        self.revocation_policy = policy;
        self
    }

    pub fn set_algorithm_policy(&mut self, policy: AlgorithmPolicy) -> &mut Self {
        self.algorithms = policy;
        self
    }

    /// Validate a chain at the current time.
    pub async fn is_trusted(&self, chain: &[CertificateEntry]) -> Result<(), ValidationError> {
        self.is_trusted_at(chain, OffsetDateTime::now_utc()).await
    }

    /// Validate a chain at an explicit time.
    pub async fn is_trusted_at(
        &self,
        chain: &[CertificateEntry],
        at: OffsetDateTime,
    ) -> Result<(), ValidationError> {
        let mut revocation = RevocationData::new();
        self.is_trusted_with_revocation_data(chain, at, &mut revocation)
            .await
    }

    /// Validate a chain, collecting the revocation evidence that was
    /// consulted into the caller-owned sink.
    pub async fn is_trusted_with_revocation_data(
        &self,
        chain: &[CertificateEntry],
        at: OffsetDateTime,
        revocation: &mut RevocationData,
    ) -> Result<(), ValidationError> {
        if self.anchors.is_empty() {
            return Err(ValidationError::NoAnchors);
        }
        let Some(root) = chain.last() else {
            return Err(untrusted(
                TrustLinkerReason::InvalidTrust,
                "empty certificate chain",
            ));
        };

        // Chain ordering precondition.
        for pair in chain.windows(2) {
            if pair[0].issuer != pair[1].subject {
                return Err(untrusted(
                    TrustLinkerReason::InvalidTrust,
                    format!(
                        "issuer of {} does not match subject of {}",
                        pair[0].subject, pair[1].subject
                    ),
                ));
            }
        }

        for (idx, entry) in chain.iter().enumerate() {
            self.check_certificate(idx, entry, chain, at)?;
        }

        if !self.anchors.contains(root) {
            return Err(untrusted(
                TrustLinkerReason::RootNotTrusted,
                format!("{} is not a configured trust anchor", root.subject),
            ));
        }

        for constraint in &self.constraints {
            if let Err(verdict) = constraint.check(&chain[0]) {
                debug!("constraint {} rejected the leaf", constraint.name());
                return Err(ValidationError::Untrusted(verdict));
            }
        }

        // Revocation, pairwise from the leaf up. The anchor itself is only
        // ever the issuer side and is never revocation-checked.
        if !self.linkers.is_empty() {
            for i in 0..chain.len().saturating_sub(1) {
                self.check_revocation(&chain[i], &chain[i + 1], at, revocation)
                    .await?;
            }
        }

        debug!("chain for {} is trusted at {at}", chain[0].subject);
        Ok(())
    }

    fn check_certificate(
        &self,
        idx: usize,
        entry: &CertificateEntry,
        chain: &[CertificateEntry],
        at: OffsetDateTime,
    ) -> Result<(), ValidationError> {
        let cert = entry
            .parse()
            .map_err(|e| ValidationError::Internal(e.into()))?;

        let not_before = cert.validity().not_before.to_datetime();
        let not_after = cert.validity().not_after.to_datetime();
        if at < not_before || at > not_after {
            return Err(untrusted(
                TrustLinkerReason::InvalidValidityInterval,
                format!("{} is not valid at {at}", entry.subject),
            ));
        }

        let sig_alg = cert.signature_algorithm.algorithm.to_id_string();
        if let TrustLinkerResult::Untrusted(verdict) =
            self.algorithms.check_certificate(&sig_alg, &entry.subject)
        {
            return Err(ValidationError::Untrusted(verdict));
        }

        let verified = if idx + 1 < chain.len() {
            let issuer_cert = chain[idx + 1]
                .parse()
                .map_err(|e| ValidationError::Internal(e.into()))?;
            self.crypto
                .verify_certificate(&cert, Some(issuer_cert.public_key()))
        } else {
            // Candidate anchor; must verify under its own key.
            self.crypto.verify_certificate(&cert, None)
        };
        if verified.is_err() {
            return Err(untrusted(
                TrustLinkerReason::InvalidSignature,
                format!("signature of {} does not verify", entry.subject),
            ));
        }

        if idx > 0 {
            match extensions::basic_constraints(&cert) {
                Some((true, path_len)) => {
                    // `idx - 1` intermediates sit below this CA.
                    if let Some(limit) = path_len
                        && (idx - 1) as u32 > limit
                    {
                        return Err(untrusted(
                            TrustLinkerReason::InvalidTrust,
                            format!("{} exceeds its path length constraint", entry.subject),
                        ));
                    }
                }
                _ => {
                    return Err(untrusted(
                        TrustLinkerReason::InvalidTrust,
                        format!("{} is not a CA certificate", entry.subject),
                    ));
                }
            }
        }

        Ok(())
    }

    async fn check_revocation(
        &self,
        child: &CertificateEntry,
        issuer: &CertificateEntry,
        at: OffsetDateTime,
        revocation: &mut RevocationData,
    ) -> Result<(), ValidationError> {
        for linker in &self.linkers {
            match linker.has_trust_link(child, issuer, at, revocation).await? {
                TrustLinkerResult::Trusted => {
                    debug!("linker {} confirmed {}", linker.name(), child.subject);
                    return Ok(());
                }
                TrustLinkerResult::Untrusted(verdict) => {
                    return Err(ValidationError::Untrusted(verdict));
                }
                TrustLinkerResult::Abstain => {
                    debug!("linker {} abstained for {}", linker.name(), child.subject);
                }
            }
        }

        match self.revocation_policy {
            RevocationPolicy::FailOpen => {
                warn!(
                    "revocation status of {} could not be determined, accepting",
                    child.subject
                );
                Ok(())
            }
            RevocationPolicy::FailClosed => Err(untrusted(
                TrustLinkerReason::InvalidRevocationStatus,
                format!(
                    "revocation status of {} could not be determined",
                    child.subject
                ),
            )),
        }
    }
}

fn untrusted(reason: TrustLinkerReason, message: impl Into<String>) -> ValidationError {
    ValidationError::Untrusted(TrustVerdict::new(reason, message))
}

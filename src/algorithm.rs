//! Signature-algorithm acceptance policy.
//!
//! Works on dotted-decimal algorithm OIDs as produced by
//! `Oid::to_id_string`. Two profiles exist: certificates and CRLs. The CRL
//! profile may additionally tolerate the SHA-1 family, which some
//! authorities still use to sign legacy revocation lists.

use crate::linker::{TrustLinkerReason, TrustLinkerResult};

/// md2WithRSAEncryption (RFC 3279). Always rejected.
pub const MD2_WITH_RSA: &str = "1.2.840.113549.1.1.2";
/// md5WithRSAEncryption (RFC 3279). Always rejected.
pub const MD5_WITH_RSA: &str = "1.2.840.113549.1.1.4";
/// sha1WithRSAEncryption (RFC 3279). Legacy, CRL profile only.
pub const SHA1_WITH_RSA: &str = "1.2.840.113549.1.1.5";
/// RSASSA-PSS (RFC 4055).
pub const RSASSA_PSS: &str = "1.2.840.113549.1.1.10";
/// sha256WithRSAEncryption (RFC 4055).
pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
/// sha384WithRSAEncryption (RFC 4055).
pub const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
/// sha512WithRSAEncryption (RFC 4055).
pub const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";
/// ecdsa-with-SHA1 (RFC 3279). Legacy, CRL profile only.
pub const ECDSA_WITH_SHA1: &str = "1.2.840.10045.4.1";
/// ecdsa-with-SHA224 (RFC 5758).
pub const ECDSA_WITH_SHA224: &str = "1.2.840.10045.4.3.1";
/// ecdsa-with-SHA256 (RFC 5758).
pub const ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
/// ecdsa-with-SHA384 (RFC 5758).
pub const ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";
/// ecdsa-with-SHA512 (RFC 5758).
pub const ECDSA_WITH_SHA512: &str = "1.2.840.10045.4.3.4";
/// dsa-with-SHA1 (RFC 3279). Legacy, CRL profile only.
pub const DSA_WITH_SHA1: &str = "1.2.840.10040.4.3";
/// dsa-with-SHA256 (RFC 5758).
pub const DSA_WITH_SHA256: &str = "2.16.840.1.101.3.4.3.2";
/// Ed25519 (RFC 8410).
pub const ED25519: &str = "1.3.101.112";

/// Acceptable for both certificates and CRLs.
const ACCEPTED: &[&str] = &[
    RSASSA_PSS,
    SHA256_WITH_RSA,
    SHA384_WITH_RSA,
    SHA512_WITH_RSA,
    ECDSA_WITH_SHA224,
    ECDSA_WITH_SHA256,
    ECDSA_WITH_SHA384,
    ECDSA_WITH_SHA512,
    DSA_WITH_SHA256,
    ED25519,
];

/// Acceptable for CRLs when legacy SHA-1 tolerance is enabled.
const SHA1_LEGACY: &[&str] = &[SHA1_WITH_RSA, ECDSA_WITH_SHA1, DSA_WITH_SHA1];

/// Static predicate over signature-algorithm identifiers.
///
/// Everything not on the accepted list is rejected, so MD2 and MD5 fall out
/// along with any unrecognized OID.
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmPolicy {
    allow_sha1_crls: bool,
}

impl Default for AlgorithmPolicy {
    fn default() -> Self {
        Self {
            allow_sha1_crls: true,
        }
    }
}

impl AlgorithmPolicy {
    pub fn new(allow_sha1_crls: bool) -> Self {
        Self { allow_sha1_crls }
    }

    /// Check a certificate signature algorithm. SHA-1 is not tolerated here.
    pub fn check_certificate(&self, oid: &str, subject: &str) -> TrustLinkerResult {
        if ACCEPTED.contains(&oid) {
            return TrustLinkerResult::Trusted;
        }
        TrustLinkerResult::untrusted(
            TrustLinkerReason::InvalidAlgorithm,
            format!("certificate {subject} is signed with unacceptable algorithm {oid}"),
        )
    }

    /// Check a CRL signature algorithm, with optional SHA-1 tolerance.
    pub fn check_crl(&self, oid: &str, issuer: &str) -> TrustLinkerResult {
        if ACCEPTED.contains(&oid) || (self.allow_sha1_crls && SHA1_LEGACY.contains(&oid)) {
            return TrustLinkerResult::Trusted;
        }
        TrustLinkerResult::untrusted(
            TrustLinkerReason::InvalidAlgorithm,
            format!("CRL issued by {issuer} is signed with unacceptable algorithm {oid}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::TrustLinkerReason;

    fn reason(result: TrustLinkerResult) -> TrustLinkerReason {
        match result {
            TrustLinkerResult::Untrusted(verdict) => verdict.reason,
            other => panic!("expected Untrusted, got {other:?}"),
        }
    }

    #[test]
    fn md5_is_rejected_everywhere() {
        let policy = AlgorithmPolicy::default();
        assert_eq!(
            reason(policy.check_certificate(MD5_WITH_RSA, "CN=x")),
            TrustLinkerReason::InvalidAlgorithm
        );
        assert_eq!(
            reason(policy.check_crl(MD5_WITH_RSA, "CN=x")),
            TrustLinkerReason::InvalidAlgorithm
        );
    }

    #[test]
    fn sha256_is_accepted() {
        let policy = AlgorithmPolicy::default();
        assert_eq!(
            policy.check_certificate(SHA256_WITH_RSA, "CN=x"),
            TrustLinkerResult::Trusted
        );
        assert_eq!(
            policy.check_crl(ECDSA_WITH_SHA256, "CN=x"),
            TrustLinkerResult::Trusted
        );
    }

    #[test]
    fn sha1_is_crl_only() {
        let policy = AlgorithmPolicy::default();
        assert_eq!(policy.check_crl(SHA1_WITH_RSA, "CN=x"), TrustLinkerResult::Trusted);
        assert_eq!(
            reason(policy.check_certificate(SHA1_WITH_RSA, "CN=x")),
            TrustLinkerReason::InvalidAlgorithm
        );
    }

    #[test]
    fn sha1_tolerance_can_be_disabled() {
        let policy = AlgorithmPolicy::new(false);
        assert_eq!(
            reason(policy.check_crl(SHA1_WITH_RSA, "CN=x")),
            TrustLinkerReason::InvalidAlgorithm
        );
    }

    #[test]
    fn unknown_oid_is_rejected() {
        let policy = AlgorithmPolicy::default();
        assert!(matches!(
            policy.check_certificate("1.2.3.4.5", "CN=x"),
            TrustLinkerResult::Untrusted(_)
        ));
    }
}

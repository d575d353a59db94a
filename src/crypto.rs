//! Injected cryptographic backend.
//!
//! Signature verification is a constructor argument of the validator and
//! the CRL linker rather than a process-wide provider, so deployments can
//! swap the implementation without global mutation.

use x509_parser::prelude::*;

/// Signature verification seam used by the validator and linkers.
pub trait CryptoBackend: Send + Sync + std::fmt::Debug {
    /// Verify a certificate signature. `issuer_key` is `None` for
    /// self-signed certificates, which verify under their own key.
    fn verify_certificate(
        &self,
        cert: &X509Certificate<'_>,
        issuer_key: Option<&SubjectPublicKeyInfo<'_>>,
    ) -> Result<(), X509Error>;

    /// Verify a DER-encoded CRL signature under the issuer's public key.
    fn verify_crl(&self, crl_der: &[u8], issuer: &X509Certificate<'_>) -> Result<(), X509Error>;
}

/// Default backend delegating to the `x509-parser` verification support.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCryptoBackend;

impl CryptoBackend for DefaultCryptoBackend {
    fn verify_certificate(
        &self,
        cert: &X509Certificate<'_>,
        issuer_key: Option<&SubjectPublicKeyInfo<'_>>,
    ) -> Result<(), X509Error> {
        cert.verify_signature(issuer_key)
    }

    fn verify_crl(&self, crl_der: &[u8], issuer: &X509Certificate<'_>) -> Result<(), X509Error> {
        let (_, crl) = CertificateRevocationList::from_der(crl_der)
            .map_err(|e| -> X509Error { e.into() })?;
        x509_parser::verify::verify_signature(
            issuer.public_key(),
            &crl.signature_algorithm,
            &crl.signature_value,
            crl.tbs_cert_list.as_ref(),
        )
    }
}

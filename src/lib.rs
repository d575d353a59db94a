//! X.509 certificate chain validation with CRL-based revocation checking.
//!
//! A chain arrives pre-ordered (leaf first, candidate anchor last) and is
//! walked by the [`TrustValidator`]: validity windows, signature and
//! algorithm checks, basic constraints, anchor membership, and then
//! revocation via an ordered pipeline of [`TrustLinker`]s. The bundled
//! [`CrlTrustLinker`] resolves base and delta CRLs through a singleflight
//! cache and records the evidence it relied on in a [`RevocationData`]
//! sink owned by the caller.

pub mod algorithm;
pub mod cert;
pub mod config;
pub mod crl;
pub mod crypto;
pub mod linker;
pub mod revocation;
pub mod telemetry;
pub mod truststore;
pub mod validator;

// Re-export commonly used types
pub use cert::CertificateEntry;
pub use config::ValidatorConfig;
pub use crl::{CachingCrlRepository, CrlTrustLinker, HttpCrlFetcher};
pub use linker::{TrustLinker, TrustLinkerReason, TrustLinkerResult, TrustVerdict};
pub use revocation::RevocationData;
pub use truststore::TrustAnchorStore;
pub use validator::{RevocationPolicy, TrustValidator, ValidationError};

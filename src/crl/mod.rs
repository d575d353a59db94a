//! Certificate Revocation List (CRL) support
//!
//! This module provides CRL-based revocation checking per RFC 5280:
//!
//! # Features
//! - CRL fetching from distribution points
//! - CRL integrity validation (signature, timing, issuer authorization)
//! - Delta CRL chaining via FreshestCRL / DeltaCRLIndicator
//! - Singleflight CRL caching
//! - A `TrustLinker` implementation driving all of the above

pub mod errors;
pub mod extensions;
pub mod fetcher;
pub mod linker;
pub mod repository;
pub mod types;

// Re-export public types
pub use errors::{CrlError, CrlResult};
pub use fetcher::{CrlFetcher, HttpCrlFetcher};
pub use linker::CrlTrustLinker;
pub use repository::{CachingCrlRepository, CrlRepository};
pub use types::{CrlCacheKey, CrlEntry, RevocationReason, RevokedEntry};

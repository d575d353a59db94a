//! End-to-end chain validation with CRL-based revocation.
//!
//! Builds a real three-tier PKI with rcgen (root, intermediate, leaf plus
//! signed CRLs) and serves the CRLs through an in-memory fetcher, so the
//! full pipeline runs: distribution point extraction, cache, integrity and
//! signature verification, revocation lookup, verdict mapping.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rcgen::{
    CertificateParams, CertificateRevocationListParams, CrlDistributionPoint, DistinguishedName,
    DnType, Issuer, KeyIdMethod, KeyPair, KeyUsagePurpose, RevokedCertParams, SerialNumber,
    date_time_ymd,
};
use time::OffsetDateTime;
use url::Url;

use trustlink::crl::{CachingCrlRepository, CrlError, CrlFetcher, CrlResult, CrlTrustLinker};
use trustlink::validator::RevocationPolicy;
use trustlink::{
    CertificateEntry, RevocationData, TrustAnchorStore, TrustLinkerReason, TrustValidator,
    ValidationError,
};

const ROOT_CRL_URI: &str = "http://crl.example.com/root.crl";
const INT_CRL_URI: &str = "http://crl.example.com/intermediate.crl";

fn at() -> OffsetDateTime {
    date_time_ymd(2025, 1, 1)
}

struct StaticFetcher {
    crls: HashMap<String, Vec<u8>>,
    hits: AtomicUsize,
}

impl StaticFetcher {
    fn new(crls: HashMap<String, Vec<u8>>) -> Self {
        Self {
            crls,
            hits: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CrlFetcher for StaticFetcher {
    async fn fetch(&self, uri: &Url) -> CrlResult<Vec<u8>> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.crls
            .get(uri.as_str())
            .cloned()
            .ok_or(CrlError::Timeout)
    }
}

struct TestPki {
    root: CertificateEntry,
    root_issuer: Issuer<'static, KeyPair>,
    intermediate: CertificateEntry,
    int_issuer: Issuer<'static, KeyPair>,
}

impl TestPki {
    fn new() -> Self {
        trustlink::telemetry::init_tracing();

        let mut root_params = CertificateParams::default();
        let root_key = KeyPair::generate().unwrap();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "Trustlink Test Root");
        root_params.distinguished_name = dn;
        root_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        root_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let root_cert = root_params.self_signed(&root_key).unwrap();
        let root = CertificateEntry::from_der(root_cert.der()).unwrap();
        let root_issuer = Issuer::new(root_params, root_key);

        let mut int_params = CertificateParams::default();
        let int_key = KeyPair::generate().unwrap();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "Trustlink Test Intermediate");
        int_params.distinguished_name = dn;
        int_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        int_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        int_params.crl_distribution_points = vec![CrlDistributionPoint {
            uris: vec![ROOT_CRL_URI.to_string()],
        }];
        let int_cert = int_params.signed_by(&int_key, &root_issuer).unwrap();
        let intermediate = CertificateEntry::from_der(int_cert.der()).unwrap();
        let int_issuer = Issuer::new(int_params, int_key);

        Self {
            root,
            root_issuer,
            intermediate,
            int_issuer,
        }
    }

    fn leaf(&self, serial: &[u8]) -> CertificateEntry {
        let mut params = CertificateParams::default();
        let key_pair = KeyPair::generate().unwrap();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "peer.example.com");
        params.distinguished_name = dn;
        params.serial_number = Some(SerialNumber::from_slice(serial));
        params.use_authority_key_identifier_extension = true;
        params.crl_distribution_points = vec![CrlDistributionPoint {
            uris: vec![INT_CRL_URI.to_string()],
        }];
        let cert = params.signed_by(&key_pair, &self.int_issuer).unwrap();
        CertificateEntry::from_der(cert.der()).unwrap()
    }

    fn crl(
        issuer: &Issuer<'static, KeyPair>,
        revoked: Vec<(Vec<u8>, OffsetDateTime)>,
    ) -> Vec<u8> {
        let params = CertificateRevocationListParams {
            this_update: date_time_ymd(2024, 12, 1),
            next_update: date_time_ymd(2025, 6, 1),
            crl_number: SerialNumber::from(7u64),
            issuing_distribution_point: None,
            key_identifier_method: KeyIdMethod::Sha256,
            revoked_certs: revoked
                .into_iter()
                .map(|(serial, when)| RevokedCertParams {
                    serial_number: SerialNumber::from_slice(&serial),
                    revocation_time: when,
                    reason_code: Some(rcgen::RevocationReason::KeyCompromise),
                    invalidity_date: None,
                })
                .collect(),
        };
        params.signed_by(issuer).unwrap().der().as_ref().to_vec()
    }

    /// CRLs for both tiers: the intermediate's CRL carries the given
    /// revoked serials, the root's CRL revokes nothing.
    fn crl_set(&self, revoked: Vec<(Vec<u8>, OffsetDateTime)>) -> HashMap<String, Vec<u8>> {
        HashMap::from([
            (INT_CRL_URI.to_string(), Self::crl(&self.int_issuer, revoked)),
            (ROOT_CRL_URI.to_string(), Self::crl(&self.root_issuer, vec![])),
        ])
    }

    fn validator(&self, fetcher: Arc<StaticFetcher>) -> TrustValidator {
        let anchors = TrustAnchorStore::new();
        anchors.add_anchor(self.root.clone());
        let repository = Arc::new(CachingCrlRepository::new(fetcher));
        let mut validator = TrustValidator::new(anchors);
        validator.add_trust_linker(Arc::new(CrlTrustLinker::new(repository)));
        validator
    }
}

fn untrusted_reason(result: Result<(), ValidationError>) -> TrustLinkerReason {
    match result {
        Err(ValidationError::Untrusted(verdict)) => verdict.reason,
        other => panic!("expected Untrusted, got {other:?}"),
    }
}

#[tokio::test]
async fn valid_chain_is_trusted_with_crl_evidence() {
    let pki = TestPki::new();
    let leaf = pki.leaf(&[0x20]);
    let fetcher = Arc::new(StaticFetcher::new(pki.crl_set(vec![
        (vec![0x10], date_time_ymd(2024, 12, 15)),
        (vec![0x11], date_time_ymd(2024, 12, 15)),
    ])));
    let validator = pki.validator(fetcher);

    let chain = vec![leaf, pki.intermediate.clone(), pki.root.clone()];
    let mut revocation = RevocationData::new();
    validator
        .is_trusted_with_revocation_data(&chain, at(), &mut revocation)
        .await
        .unwrap();

    // One CRL per checked pair, each inside its freshness window.
    assert_eq!(revocation.crls().len(), 2);
    assert!(revocation.crls().iter().any(|crl| crl.uri == INT_CRL_URI));
    assert!(revocation.crls().iter().any(|crl| crl.uri == ROOT_CRL_URI));
}

#[tokio::test]
async fn revoked_leaf_is_untrusted() {
    let pki = TestPki::new();
    let leaf = pki.leaf(&[0x10]);
    let fetcher = Arc::new(StaticFetcher::new(
        pki.crl_set(vec![(vec![0x10], date_time_ymd(2024, 12, 15))]),
    ));
    let validator = pki.validator(fetcher);

    let chain = vec![leaf, pki.intermediate.clone(), pki.root.clone()];
    let result = validator.is_trusted_at(&chain, at()).await;
    match result {
        Err(ValidationError::Untrusted(verdict)) => {
            assert_eq!(verdict.reason, TrustLinkerReason::InvalidRevocationStatus);
            assert!(verdict.message.contains("10"));
        }
        other => panic!("expected Untrusted, got {other:?}"),
    }
}

#[tokio::test]
async fn future_dated_revocation_is_still_trusted() {
    let pki = TestPki::new();
    let leaf = pki.leaf(&[0x10]);
    // Revocation becomes effective one month after the validation time.
    let fetcher = Arc::new(StaticFetcher::new(
        pki.crl_set(vec![(vec![0x10], date_time_ymd(2025, 2, 1))]),
    ));
    let validator = pki.validator(fetcher);

    let chain = vec![leaf, pki.intermediate.clone(), pki.root.clone()];
    validator.is_trusted_at(&chain, at()).await.unwrap();
}

#[tokio::test]
async fn fetch_failure_fails_closed_by_default() {
    let pki = TestPki::new();
    let leaf = pki.leaf(&[0x20]);
    let fetcher = Arc::new(StaticFetcher::new(HashMap::new()));
    let validator = pki.validator(fetcher);

    let chain = vec![leaf, pki.intermediate.clone(), pki.root.clone()];
    assert_eq!(
        untrusted_reason(validator.is_trusted_at(&chain, at()).await),
        TrustLinkerReason::InvalidRevocationStatus
    );
}

#[tokio::test]
async fn fetch_failure_can_fail_open() {
    let pki = TestPki::new();
    let leaf = pki.leaf(&[0x20]);
    let fetcher = Arc::new(StaticFetcher::new(HashMap::new()));
    let mut validator = pki.validator(fetcher);
    validator.set_revocation_policy(RevocationPolicy::FailOpen);

    let chain = vec![leaf, pki.intermediate.clone(), pki.root.clone()];
    validator.is_trusted_at(&chain, at()).await.unwrap();
}

#[tokio::test]
async fn missing_distribution_point_respects_policy() {
    let pki = TestPki::new();

    // Leaf without any CRL distribution point.
    let mut params = CertificateParams::default();
    let key_pair = KeyPair::generate().unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "nodp.example.com");
    params.distinguished_name = dn;
    params.serial_number = Some(SerialNumber::from_slice(&[0x30]));
    let cert = params.signed_by(&key_pair, &pki.int_issuer).unwrap();
    let leaf = CertificateEntry::from_der(cert.der()).unwrap();

    let fetcher = Arc::new(StaticFetcher::new(pki.crl_set(vec![])));
    let chain = vec![leaf, pki.intermediate.clone(), pki.root.clone()];

    let validator = pki.validator(fetcher.clone());
    assert_eq!(
        untrusted_reason(validator.is_trusted_at(&chain, at()).await),
        TrustLinkerReason::InvalidRevocationStatus
    );

    let mut validator = pki.validator(fetcher);
    validator.set_revocation_policy(RevocationPolicy::FailOpen);
    validator.is_trusted_at(&chain, at()).await.unwrap();
}

#[tokio::test]
async fn repeated_validation_reuses_cached_crls() {
    let pki = TestPki::new();
    let leaf = pki.leaf(&[0x20]);
    let fetcher = Arc::new(StaticFetcher::new(pki.crl_set(vec![])));
    let validator = pki.validator(fetcher.clone());

    let chain = vec![leaf, pki.intermediate.clone(), pki.root.clone()];
    validator.is_trusted_at(&chain, at()).await.unwrap();
    validator.is_trusted_at(&chain, at()).await.unwrap();

    // Two distribution points, each fetched exactly once.
    assert_eq!(fetcher.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn outdated_validation_time_is_rejected() {
    let pki = TestPki::new();
    let leaf = pki.leaf(&[0x20]);
    let fetcher = Arc::new(StaticFetcher::new(pki.crl_set(vec![])));
    let validator = pki.validator(fetcher);

    // Before every notBefore in the chain.
    let chain = vec![leaf, pki.intermediate.clone(), pki.root.clone()];
    assert_eq!(
        untrusted_reason(
            validator
                .is_trusted_at(&chain, date_time_ymd(1970, 6, 1))
                .await
        ),
        TrustLinkerReason::InvalidValidityInterval
    );
}

#[tokio::test]
async fn concurrent_validations_share_one_fetch_per_uri() {
    let pki = TestPki::new();
    let leaf = pki.leaf(&[0x20]);
    let fetcher = Arc::new(StaticFetcher::new(pki.crl_set(vec![])));
    let validator = Arc::new(pki.validator(fetcher.clone()));

    let chain = Arc::new(vec![leaf, pki.intermediate.clone(), pki.root.clone()]);
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let validator = validator.clone();
            let chain = chain.clone();
            tokio::spawn(async move { validator.is_trusted_at(&chain, at()).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(fetcher.hits.load(Ordering::SeqCst), 2);
}

//! Extension plumbing for certificates and CRLs.
//!
//! Only `uniformResourceIdentifier` general names are consulted when
//! extracting distribution points; DN and email name forms are skipped.

use tracing::debug;
use x509_parser::extensions::{
    CRLDistributionPoints, DistributionPointName, GeneralName, ParsedExtension,
};
use x509_parser::prelude::*;

use super::errors::{CrlError, CrlResult};

/// DeltaCRLIndicator (RFC 5280 §5.2.4); no `oid_registry` constant.
const EXT_DELTA_CRL_INDICATOR: &str = "2.5.29.27";
/// IssuingDistributionPoint (RFC 5280 §5.2.5).
const EXT_ISSUING_DISTRIBUTION_POINT: &str = "2.5.29.28";
/// FreshestCRL (RFC 5280 §5.2.6).
const EXT_FRESHEST_CRL: &str = "2.5.29.46";

/// First URI full-name from the certificate's CRLDistributionPoints.
///
/// Returns `Ok(None)` when the extension is absent or names no URI; a
/// malformed extension is an error.
pub fn crl_distribution_uri(cert: &X509Certificate<'_>) -> CrlResult<Option<String>> {
    let Some(ext) = cert
        .tbs_certificate
        .extensions()
        .iter()
        .find(|e| e.oid == oid_registry::OID_X509_EXT_CRL_DISTRIBUTION_POINTS)
    else {
        return Ok(None);
    };

    let (_, points) =
        CRLDistributionPoints::from_der(ext.value).map_err(|e| CrlError::Extension {
            extension: "CRLDistributionPoints",
            detail: e.to_string(),
        })?;

    Ok(first_uri(&points))
}

/// Delta CRL locations from the CRL's FreshestCRL extension: every
/// distribution point is a candidate, the first URI name of each wins.
pub fn freshest_crl_uris(crl: &CertificateRevocationList<'_>) -> CrlResult<Vec<String>> {
    let Some(ext) = find_crl_extension(crl, EXT_FRESHEST_CRL) else {
        return Ok(Vec::new());
    };

    let (_, points) =
        CRLDistributionPoints::from_der(ext.value).map_err(|e| CrlError::Extension {
            extension: "FreshestCRL",
            detail: e.to_string(),
        })?;

    let mut uris = Vec::new();
    for point in &points.points {
        let Some(DistributionPointName::FullName(names)) = &point.distribution_point else {
            continue;
        };
        if let Some(uri) = names.iter().find_map(uri_name) {
            uris.push(uri);
        }
    }
    Ok(uris)
}

/// Raw DER value of the CRLNumber extension, if present. DER is canonical,
/// so the raw bytes compare equal exactly when the numbers do.
pub fn crl_number(crl: &CertificateRevocationList<'_>) -> Option<Vec<u8>> {
    crl.tbs_cert_list
        .extensions()
        .iter()
        .find(|e| e.oid == oid_registry::OID_X509_EXT_CRL_NUMBER)
        .map(|e| e.value.to_vec())
}

/// Raw DER value of the DeltaCRLIndicator extension, if present.
pub fn delta_crl_indicator(crl: &CertificateRevocationList<'_>) -> Option<Vec<u8>> {
    find_crl_extension(crl, EXT_DELTA_CRL_INDICATOR).map(|e| e.value.to_vec())
}

/// Whether the CRL declares itself indirect via IssuingDistributionPoint.
pub fn is_indirect(crl: &CertificateRevocationList<'_>) -> CrlResult<bool> {
    let Some(ext) = find_crl_extension(crl, EXT_ISSUING_DISTRIBUTION_POINT) else {
        return Ok(false);
    };
    match ext.parsed_extension() {
        ParsedExtension::IssuingDistributionPoint(idp) => Ok(idp.indirect_crl),
        other => Err(CrlError::Extension {
            extension: "IssuingDistributionPoint",
            detail: format!("unexpected content: {other:?}"),
        }),
    }
}

/// Whether the certificate carries a KeyUsage extension with cRLSign set.
pub fn has_crl_sign(cert: &X509Certificate<'_>) -> bool {
    for ext in cert.tbs_certificate.extensions() {
        if ext.oid == oid_registry::OID_X509_EXT_KEY_USAGE
            && let ParsedExtension::KeyUsage(ku) = ext.parsed_extension()
        {
            return ku.crl_sign();
        }
    }
    false
}

/// BasicConstraints of the certificate: (is CA, path length constraint).
pub fn basic_constraints(cert: &X509Certificate<'_>) -> Option<(bool, Option<u32>)> {
    for ext in cert.tbs_certificate.extensions() {
        if ext.oid == oid_registry::OID_X509_EXT_BASIC_CONSTRAINTS
            && let ParsedExtension::BasicConstraints(bc) = ext.parsed_extension()
        {
            return Some((bc.ca, bc.path_len_constraint));
        }
    }
    None
}

fn first_uri(points: &CRLDistributionPoints<'_>) -> Option<String> {
    for point in &points.points {
        let Some(DistributionPointName::FullName(names)) = &point.distribution_point else {
            continue;
        };
        for name in names {
            match uri_name(name) {
                Some(uri) => return Some(uri),
                None => debug!("skipping non-URI distribution point name"),
            }
        }
    }
    None
}

fn uri_name(name: &GeneralName<'_>) -> Option<String> {
    match name {
        GeneralName::URI(uri) => Some((*uri).to_string()),
        _ => None,
    }
}

fn find_crl_extension<'a: 'b, 'b>(
    crl: &'a CertificateRevocationList<'b>,
    oid: &str,
) -> Option<&'a X509Extension<'b>> {
    crl.tbs_cert_list
        .extensions()
        .iter()
        .find(move |e| e.oid.to_id_string() == oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{
        CertificateParams, CrlDistributionPoint, DistinguishedName, DnType, KeyPair,
        KeyUsagePurpose,
    };

    fn self_signed(params: CertificateParams) -> Vec<u8> {
        let key_pair = KeyPair::generate().unwrap();
        params.self_signed(&key_pair).unwrap().der().as_ref().to_vec()
    }

    fn named_params(name: &str) -> CertificateParams {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, name);
        params.distinguished_name = dn;
        params.use_authority_key_identifier_extension = true;
        params
    }

    #[test]
    fn extracts_first_distribution_uri() {
        let mut params = named_params("dp.example.com");
        params.crl_distribution_points = vec![CrlDistributionPoint {
            uris: vec![
                "http://crl.example.com/ca.crl".to_string(),
                "http://backup.example.com/ca.crl".to_string(),
            ],
        }];
        let der = self_signed(params);
        let (_, cert) = X509Certificate::from_der(&der).unwrap();

        let uri = crl_distribution_uri(&cert).unwrap();
        assert_eq!(uri.as_deref(), Some("http://crl.example.com/ca.crl"));
    }

    #[test]
    fn missing_distribution_points_is_none() {
        let der = self_signed(named_params("plain.example.com"));
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        assert!(crl_distribution_uri(&cert).unwrap().is_none());
    }

    #[test]
    fn detects_crl_sign_bit() {
        let mut params = named_params("signer.example.com");
        params.key_usages = vec![KeyUsagePurpose::CrlSign];
        let der = self_signed(params);
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        assert!(has_crl_sign(&cert));

        let der = self_signed(named_params("nosign.example.com"));
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        assert!(!has_crl_sign(&cert));
    }

    #[test]
    fn reads_basic_constraints() {
        let mut params = named_params("ca.example.com");
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Constrained(1));
        let der = self_signed(params);
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        assert_eq!(basic_constraints(&cert), Some((true, Some(1))));

        let der = self_signed(named_params("ee.example.com"));
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        assert!(basic_constraints(&cert).is_none_or(|(ca, _)| !ca));
    }
}

//! Revocation evidence collected during one validation.

/// A DER-encoded CRL that was actually consulted, with its source URI.
#[derive(Debug, Clone)]
pub struct CrlRevocationData {
    pub encoded: Vec<u8>,
    pub uri: String,
}

impl CrlRevocationData {
    pub fn new(encoded: Vec<u8>, uri: impl Into<String>) -> Self {
        Self {
            encoded,
            uri: uri.into(),
        }
    }
}

/// A DER-encoded OCSP response that was actually consulted.
#[derive(Debug, Clone)]
pub struct OcspRevocationData {
    pub encoded: Vec<u8>,
}

impl OcspRevocationData {
    pub fn new(encoded: Vec<u8>) -> Self {
        Self { encoded }
    }
}

/// Append-only sink for the revocation material linkers relied on.
///
/// Owned by the caller; its lifecycle spans a single validation. Callers
/// that need the evidence (audit trails, long-term signature formats) pass
/// a sink into the validator and read it back after the call.
#[derive(Debug, Default)]
pub struct RevocationData {
    crls: Vec<CrlRevocationData>,
    ocsp_responses: Vec<OcspRevocationData>,
}

impl RevocationData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_crl(&mut self, data: CrlRevocationData) {
        self.crls.push(data);
    }

    pub fn add_ocsp_response(&mut self, data: OcspRevocationData) {
        self.ocsp_responses.push(data);
    }

    pub fn crls(&self) -> &[CrlRevocationData] {
        &self.crls
    }

    pub fn ocsp_responses(&self) -> &[OcspRevocationData] {
        &self.ocsp_responses
    }

    pub fn is_empty(&self) -> bool {
        self.crls.is_empty() && self.ocsp_responses.is_empty()
    }
}

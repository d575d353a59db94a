use thiserror::Error;
use x509_parser::prelude::X509Error;

/// CRL-related errors
#[derive(Debug, Error)]
pub enum CrlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid CRL URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported CRL URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("HTTP status {status} fetching CRL from {uri}")]
    Status { status: u16, uri: String },

    #[error("timeout while fetching CRL")]
    Timeout,

    #[error("CRL parsing failed: {0}")]
    Parse(#[from] X509Error),

    #[error("malformed {extension} CRL extension: {detail}")]
    Extension {
        extension: &'static str,
        detail: String,
    },
}

/// Convenient Result type alias
pub type CrlResult<T> = Result<T, CrlError>;

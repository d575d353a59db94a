use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::errors::{CrlError, CrlResult};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Retrieves raw CRL bytes by URI.
///
/// The bundled implementation speaks http(s); transports for other schemes
/// (ldap in particular) plug in through this trait. Errors are never fatal
/// to a validation — the CRL linker abstains on them.
#[async_trait]
pub trait CrlFetcher: Send + Sync {
    async fn fetch(&self, uri: &Url) -> CrlResult<Vec<u8>>;
}

/// HTTP(S) CRL fetcher with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpCrlFetcher {
    client: Client,
    request_timeout: Duration,
}

impl HttpCrlFetcher {
    /// Create a fetcher with the default timeout.
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> CrlResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Create a fetcher with a custom timeout in seconds.
    pub fn with_timeout(timeout_secs: u64) -> CrlResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[async_trait]
impl CrlFetcher for HttpCrlFetcher {
    async fn fetch(&self, uri: &Url) -> CrlResult<Vec<u8>> {
        match uri.scheme() {
            "http" | "https" => {}
            other => return Err(CrlError::UnsupportedScheme(other.to_string())),
        }

        debug!("fetching CRL from {uri}");
        let response = match timeout(self.request_timeout, self.client.get(uri.clone()).send()).await
        {
            Ok(result) => result?,
            Err(_) => return Err(CrlError::Timeout),
        };

        if !response.status().is_success() {
            return Err(CrlError::Status {
                status: response.status().as_u16(),
                uri: uri.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub fetcher: FetcherConfig,
    pub cache: CacheConfig,
    pub revocation: RevocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Per-request timeout for CRL downloads, in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on cached CRLs; the oldest entry is evicted when full.
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationConfig {
    /// Accept a chain when every linker abstains. Default is to fail closed.
    pub fail_open: bool,
    /// Tolerate SHA-1 signatures on legacy CRLs.
    pub allow_sha1_crls: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig { timeout_secs: 30 },
            cache: CacheConfig { max_entries: 64 },
            revocation: RevocationConfig {
                fail_open: false,
                allow_sha1_crls: true,
            },
        }
    }
}

impl ValidatorConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLib::builder()
            // Set default values
            .set_default("fetcher.timeout_secs", 30)?
            .set_default("cache.max_entries", 64)?
            .set_default("revocation.fail_open", false)?
            .set_default("revocation.allow_sha1_crls", true)?
            // Add a config file under config/trustlink.toml
            // or any other format supported by the `config` crate
            .add_source(File::with_name("config/trustlink").required(false))
            // Allow overrides via environment variables prefixed with
            // 'TRUSTLINK', e.g. TRUSTLINK_REVOCATION.FAIL_OPEN=true
            .add_source(Environment::with_prefix("TRUSTLINK").separator("_"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_closed() {
        let config = ValidatorConfig::default();
        assert!(!config.revocation.fail_open);
        assert!(config.revocation.allow_sha1_crls);
        assert_eq!(config.fetcher.timeout_secs, 30);
    }

    #[test]
    fn load_uses_defaults_without_sources() {
        let config = ValidatorConfig::load().expect("failed to load config");
        assert_eq!(config.cache.max_entries, 64);
    }
}

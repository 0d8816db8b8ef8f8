//! Channel configuration: the callback Token, EncodingAESKey, and tenant id.
//!
//! The pipeline never owns defaults for any of these. Config is loaded per
//! request through [`ConfigSource`]; a failed load must fail the request
//! rather than fall back to a compiled-in secret.

use async_trait::async_trait;
use thiserror::Error;

use crate::keygen::verify_encoding_aes_key;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("token must be 1..=32 ascii alphanumeric characters")]
    InvalidToken,
    #[error("encoding aes key must be 43 base64 characters decoding to 32 bytes")]
    InvalidAesKey,
    #[error("tenant id must be non-empty")]
    InvalidTenantId,
    #[error("channel config unavailable: {0}")]
    Unavailable(String),
}

/// Verified credentials for one callback channel.
#[derive(Clone)]
pub struct ChannelConfig {
    pub token: String,
    pub encoding_aes_key: String,
    pub tenant_id: String,
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Token and key are secrets; only the tenant id is loggable.
        f.debug_struct("ChannelConfig")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl ChannelConfig {
    /// Validate and build a config.
    ///
    /// Token: 1..=32 ASCII alphanumerics (the shape the admin console
    /// accepts). Key: 43 chars, base64-decoding to 32 bytes with one `=`
    /// appended. Tenant id: non-empty.
    pub fn new(
        token: String,
        encoding_aes_key: String,
        tenant_id: String,
    ) -> Result<Self, ConfigError> {
        if token.is_empty()
            || token.len() > 32
            || !token.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(ConfigError::InvalidToken);
        }
        if !verify_encoding_aes_key(&encoding_aes_key) {
            return Err(ConfigError::InvalidAesKey);
        }
        if tenant_id.is_empty() {
            return Err(ConfigError::InvalidTenantId);
        }
        Ok(Self {
            token,
            encoding_aes_key,
            tenant_id,
        })
    }
}

/// Upstream source of the channel config, fetched once per request.
///
/// In the CRM this is a database read; the pipeline only sees the trait.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<ChannelConfig, ConfigError>;
}

/// In-memory source holding one fixed config. Used by tests and by services
/// that load credentials once at startup.
#[derive(Clone, Debug)]
pub struct StaticSource {
    config: ChannelConfig,
}

impl StaticSource {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigSource for StaticSource {
    async fn load(&self) -> Result<ChannelConfig, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Source reading `WECOM_CALLBACK_TOKEN`, `WECOM_ENCODING_AES_KEY`, and
/// `WECOM_CORP_ID` from the environment at each load.
#[derive(Clone, Debug, Default)]
pub struct EnvSource;

#[async_trait]
impl ConfigSource for EnvSource {
    async fn load(&self) -> Result<ChannelConfig, ConfigError> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| ConfigError::Unavailable(format!("{name} not set")))
        };
        ChannelConfig::new(
            var("WECOM_CALLBACK_TOKEN")?,
            var("WECOM_ENCODING_AES_KEY")?,
            var("WECOM_CORP_ID")?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "YWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWE";

    #[test]
    fn accepts_well_formed_config() {
        let cfg = ChannelConfig::new("mytoken123".into(), KEY.into(), "ww123".into())
            .expect("config");
        assert_eq!(cfg.tenant_id, "ww123");
    }

    #[test]
    fn rejects_bad_tokens() {
        assert!(matches!(
            ChannelConfig::new(String::new(), KEY.into(), "ww1".into()),
            Err(ConfigError::InvalidToken)
        ));
        assert!(matches!(
            ChannelConfig::new("a".repeat(33), KEY.into(), "ww1".into()),
            Err(ConfigError::InvalidToken)
        ));
        assert!(matches!(
            ChannelConfig::new("has-dash".into(), KEY.into(), "ww1".into()),
            Err(ConfigError::InvalidToken)
        ));
    }

    #[test]
    fn rejects_bad_keys_and_tenants() {
        assert!(matches!(
            ChannelConfig::new("tok".into(), "shortkey".into(), "ww1".into()),
            Err(ConfigError::InvalidAesKey)
        ));
        assert!(matches!(
            ChannelConfig::new("tok".into(), KEY.into(), String::new()),
            Err(ConfigError::InvalidTenantId)
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = ChannelConfig::new("supersecret".into(), KEY.into(), "ww1".into())
            .expect("config");
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("supersecret"));
        assert!(!dbg.contains(KEY));
        assert!(dbg.contains("ww1"));
    }
}

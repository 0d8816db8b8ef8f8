#![doc = r#"
wecom-callback

Verification and decryption pipeline for WeCom (WeChat Work) callback
requests: the URL-ownership challenge and encrypted message/event delivery.

Components:
- signature: SHA1 over the lexicographically sorted (token, timestamp, nonce,
  payload) tuple, checked before any decryption.
- crypto: AES-256-CBC with the key derived from the 43-char EncodingAESKey,
  IV = first 16 key bytes, PKCS7 to a 32-byte boundary; recovers the embedded
  plaintext and trailing receiver id, and can seal encrypted replies.
- envelope: flat pattern-based extraction of the platform's XML fields
  (CDATA or bare text).
- config: `ChannelConfig` credentials plus the async `ConfigSource` seam the
  CRM's config store plugs into.
- handler: axum routes implementing the platform's response contract
  (soft-ack with `200 "success"`, 403 on signature/tenant failures, 500 on
  decryption/config failures).
- keygen: Token / EncodingAESKey generation for the admin console.

Quick usage:

```ignore
use wecom_callback::{ChannelConfig, CallbackState, StaticSource, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ChannelConfig::new(
        std::env::var("WECOM_CALLBACK_TOKEN")?,
        std::env::var("WECOM_ENCODING_AES_KEY")?,
        std::env::var("WECOM_CORP_ID")?,
    )?;
    let app = router(CallbackState::with_source(StaticSource::new(config)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    axum::serve(listener, app).await?;
    Ok(())
}
```
"#]

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod handler;
pub mod keygen;
pub mod signature;

pub use config::{ChannelConfig, ConfigError, ConfigSource, EnvSource, StaticSource};
pub use crypto::{seal_reply, ChannelCipher, CipherError, Opened};
pub use envelope::Envelope;
pub use handler::{router, CallbackState, EventDispatcher, NoopDispatcher, ACK_BODY};

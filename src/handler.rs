//! Axum callback endpoint.
//!
//! GET is the URL-ownership challenge: verify the signature over the encrypted
//! `echostr`, decrypt it, check the tenant, and echo the plaintext back.
//! POST is message/event delivery: verify over the `Encrypt` field, decrypt,
//! parse the inner envelope, and hand it to the dispatcher.
//!
//! Response contract (reverse-engineered platform behavior, keep exactly):
//! - missing/empty parameters and unparseable bodies are acknowledged with
//!   `200 "success"`, never a 4xx, because the platform's probe requests
//!   sometimes omit parameters and retry hard errors;
//! - signature and tenant failures are 403, decryption failures 500;
//! - a successful POST always answers `200 "success"` regardless of what the
//!   business dispatch does.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use crate::config::ConfigSource;
use crate::crypto::ChannelCipher;
use crate::envelope::Envelope;
use crate::signature;

/// Body the platform expects for anything it should not retry.
pub const ACK_BODY: &str = "success";

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Receives decrypted, parsed envelopes. Business logic lives behind this
/// trait; its failures are logged and never change the HTTP response.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, envelope: Envelope) -> Result<(), BoxError>;
}

/// Dispatcher that only logs what arrived.
#[derive(Clone, Debug, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl EventDispatcher for NoopDispatcher {
    async fn dispatch(&self, envelope: Envelope) -> Result<(), BoxError> {
        debug!(
            msg_type = envelope.msg_type.as_deref().unwrap_or("-"),
            event = envelope.event.as_deref().unwrap_or("-"),
            "callback envelope received"
        );
        Ok(())
    }
}

/// Shared state for the callback routes.
#[derive(Clone)]
pub struct CallbackState {
    pub config: Arc<dyn ConfigSource>,
    pub dispatcher: Arc<dyn EventDispatcher>,
}

impl CallbackState {
    pub fn new(config: Arc<dyn ConfigSource>, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// State with the given source and a logging-only dispatcher.
    pub fn with_source(source: impl ConfigSource + 'static) -> Self {
        Self::new(Arc::new(source), Arc::new(NoopDispatcher))
    }
}

/// Router mounting the challenge and delivery handlers at `/callback`.
pub fn router(state: CallbackState) -> Router {
    Router::new()
        .route("/callback", get(verify_url).post(receive_message))
        .with_state(state)
}

/// Query parameters on both GET and POST. `msg_signature` is the documented
/// name; some platform surfaces send `signature` instead.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    msg_signature: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    echostr: Option<String>,
}

impl CallbackQuery {
    fn signature(&self) -> Option<&str> {
        non_empty(&self.msg_signature).or_else(|| non_empty(&self.signature))
    }
}

/// Empty strings count as missing; the pipeline fails closed on them.
fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

fn ack() -> Response {
    (StatusCode::OK, ACK_BODY).into_response()
}

/// GET: URL-ownership challenge.
#[instrument(level = "debug", skip_all)]
pub async fn verify_url(
    State(state): State<CallbackState>,
    Query(q): Query<CallbackQuery>,
) -> Response {
    let (Some(claimed), Some(timestamp), Some(nonce), Some(echostr)) = (
        q.signature(),
        non_empty(&q.timestamp),
        non_empty(&q.nonce),
        non_empty(&q.echostr),
    ) else {
        debug!("challenge request missing parameters; acknowledging");
        return ack();
    };

    let cfg = match state.config.load().await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "channel config unavailable");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let expected = signature::compute_signature(&cfg.token, timestamp, nonce, echostr);
    if !expected.eq_ignore_ascii_case(claimed) {
        warn!(claimed = %claimed, expected = %expected, "challenge signature mismatch");
        return StatusCode::FORBIDDEN.into_response();
    }

    let opened = match ChannelCipher::new(&cfg.encoding_aes_key).and_then(|c| c.open(echostr)) {
        Ok(opened) => opened,
        Err(e) => {
            error!(error = %e, "echostr decryption failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if opened.receiver_id != cfg.tenant_id {
        warn!(
            recovered = %opened.receiver_id,
            expected = %cfg.tenant_id,
            "challenge tenant mismatch"
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    debug!("challenge verified");
    // The body must be exactly the decrypted plaintext, nothing else.
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        opened.plaintext,
    )
        .into_response()
}

/// POST: encrypted message/event delivery.
#[instrument(level = "debug", skip_all)]
pub async fn receive_message(
    State(state): State<CallbackState>,
    Query(q): Query<CallbackQuery>,
    body: String,
) -> Response {
    let Some(encrypt) = Envelope::parse(&body).and_then(|env| env.encrypt) else {
        debug!("body is not an encrypted envelope; acknowledging");
        return ack();
    };
    if encrypt.is_empty() {
        return ack();
    }
    // In-body MsgSignature/TimeStamp/Nonce duplicates are ignored; the
    // query-string values are authoritative.
    let (Some(claimed), Some(timestamp), Some(nonce)) = (
        q.signature(),
        non_empty(&q.timestamp),
        non_empty(&q.nonce),
    ) else {
        debug!("delivery missing query parameters; acknowledging");
        return ack();
    };

    let cfg = match state.config.load().await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "channel config unavailable");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let expected = signature::compute_signature(&cfg.token, timestamp, nonce, &encrypt);
    if !expected.eq_ignore_ascii_case(claimed) {
        warn!(claimed = %claimed, expected = %expected, "delivery signature mismatch");
        return StatusCode::FORBIDDEN.into_response();
    }

    let opened = match ChannelCipher::new(&cfg.encoding_aes_key).and_then(|c| c.open(&encrypt)) {
        Ok(opened) => opened,
        Err(e) => {
            error!(error = %e, "message decryption failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if opened.receiver_id != cfg.tenant_id {
        warn!(
            recovered = %opened.receiver_id,
            expected = %cfg.tenant_id,
            "delivery tenant mismatch"
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    let Some(inner) = Envelope::parse(&opened.plaintext) else {
        warn!("decrypted payload is not a recognizable envelope; acknowledging");
        return ack();
    };

    if let Err(e) = state.dispatcher.dispatch(inner).await {
        // Dispatch outcomes never change the acknowledgement.
        error!(error = %e, "event dispatch failed");
    }
    ack()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, ConfigError};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct DownSource;

    #[async_trait]
    impl ConfigSource for DownSource {
        async fn load(&self) -> Result<ChannelConfig, ConfigError> {
            Err(ConfigError::Unavailable("database offline".into()))
        }
    }

    #[tokio::test]
    async fn config_outage_is_a_hard_error() {
        let app = router(CallbackState::with_source(DownSource));
        let resp = app
            .clone()
            .oneshot(
                Request::get("/callback?msg_signature=x&timestamp=1&nonce=n&echostr=e")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = app
            .oneshot(
                Request::post("/callback?msg_signature=x&timestamp=1&nonce=n")
                    .body(Body::from(
                        "<xml><Encrypt><![CDATA[abc]]></Encrypt></xml>",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn missing_parameters_never_reach_the_config_source() {
        // A bare probe with no query at all must be acknowledged even while
        // the config store is down.
        let app = router(CallbackState::with_source(DownSource));
        let resp = app
            .oneshot(Request::get("/callback").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

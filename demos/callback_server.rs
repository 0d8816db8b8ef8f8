//! Demo callback server.
//!
//! Mounts the verification/decryption pipeline at `/callback` and a health
//! probe at `/health`. Point the WeCom admin console at the public URL and it
//! will complete the GET challenge against this process.
//!
//! Running:
//! ```bash
//! WECOM_CALLBACK_TOKEN=your_token \
//! WECOM_ENCODING_AES_KEY=your_43_char_key \
//! WECOM_CORP_ID=wwxxxxxxxxxxxxxxxx \
//! cargo run --example callback_server
//! ```

use async_trait::async_trait;
use axum::{response::IntoResponse, routing::get, Json};
use tracing::info;

use wecom_callback::handler::BoxError;
use wecom_callback::{router, CallbackState, Envelope, EnvSource, EventDispatcher};

/// Dispatcher that logs every decrypted envelope. A real deployment would
/// enqueue a sync_msg pull or notify the CRM here.
struct LoggingDispatcher;

#[async_trait]
impl EventDispatcher for LoggingDispatcher {
    async fn dispatch(&self, envelope: Envelope) -> Result<(), BoxError> {
        info!(
            msg_type = envelope.msg_type.as_deref().unwrap_or("-"),
            event = envelope.event.as_deref().unwrap_or("-"),
            from = envelope.from_user_name.as_deref().unwrap_or("-"),
            "callback received"
        );
        Ok(())
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let _ = dotenvy::dotenv();

    // Config is re-read from the environment on every request; there are no
    // compiled-in fallback secrets.
    let state = CallbackState::new(
        std::sync::Arc::new(EnvSource),
        std::sync::Arc::new(LoggingDispatcher),
    );

    let app = router(state).route("/health", get(health));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

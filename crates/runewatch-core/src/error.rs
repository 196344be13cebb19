// Error types shared across the detection and build pipeline.

use thiserror::Error;

/// Failures talking to the local control API (HTTP + WebSocket).
///
/// Passive status paths downgrade every variant to a "disconnected" status;
/// only the on-demand lookups surface these to callers.
#[derive(Debug, Error)]
pub enum LcuError {
    #[error("not connected to the client control API")]
    NotConnected,

    #[error("control API resource not found")]
    NotFound,

    #[error("control API returned status {0}")]
    Status(u16),

    #[error("control API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("control API websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("control API handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("failed to build TLS connector: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("failed to decode control API payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed control API payload: {0}")]
    MalformedPayload(String),
}

/// Failures polling the in-game live data endpoint. Always treated as
/// "disconnected" by the watcher.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("live endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("live endpoint returned status {0}")]
    Status(u16),

    #[error("failed to decode live endpoint payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures resolving a build document.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build provider is not configured")]
    Disabled,

    #[error("build request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("build provider returned status {0}")]
    Status(u16),

    #[error("failed to decode build payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("build provider error: {0}")]
    Upstream(String),
}

/// Failures loading static game data (champion list, item catalog).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("static data request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("static data endpoint returned status {0}")]
    Status(u16),

    #[error("failed to decode static data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("static data is missing {0}")]
    Missing(String),
}

// Seam between the connector and the wire. The production implementation
// lives in `wamp`; tests substitute in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::credentials::Credentials;
use crate::error::LcuError;

/// A change pushed by the client for one subscribed resource.
///
/// `payload` is `Value::Null` when the resource was deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketEvent {
    pub uri: String,
    pub payload: Value,
}

impl SocketEvent {
    pub fn new(uri: impl Into<String>, payload: Value) -> Self {
        Self {
            uri: uri.into(),
            payload,
        }
    }
}

/// Request/response half of the control API.
#[async_trait]
pub trait LcuApi: Send + Sync {
    /// GET `endpoint` and return its JSON body (`Null` for an empty body).
    /// A 404 maps to [`LcuError::NotFound`].
    async fn request(&self, endpoint: &str) -> Result<Value, LcuError>;
}

/// An open, authenticated connection.
///
/// The event receiver closes when the socket does; `reader` (if any) is the
/// task feeding it and is aborted on disconnect.
pub struct LcuSession {
    pub api: Arc<dyn LcuApi>,
    pub events: mpsc::Receiver<SocketEvent>,
    pub reader: Option<JoinHandle<()>>,
}

/// Opens sessions against a discovered client.
#[async_trait]
pub trait LcuTransport: Send + Sync {
    /// Connect and subscribe to change events for each resource path.
    async fn connect(
        &self,
        credentials: &Credentials,
        resources: &[&str],
    ) -> Result<LcuSession, LcuError>;
}

// Production transport: HTTPS requests plus a WAMP 1.0 event socket, both
// against the client's loopback endpoint with its self-signed certificate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::Connector;
use tracing::{debug, info, warn};

use super::transport::{LcuApi, LcuSession, LcuTransport, SocketEvent};
use crate::credentials::{Credentials, AUTH_USER};
use crate::error::LcuError;

const WAMP_SUBSCRIBE: i64 = 5;
const WAMP_EVENT: i64 = 8;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// WAMP topic carrying change events for one resource path.
pub fn topic_for(resource: &str) -> String {
    format!("OnJsonApiEvent{}", resource.replace('/', "_"))
}

pub fn subscribe_frame(resource: &str) -> String {
    serde_json::json!([WAMP_SUBSCRIBE, topic_for(resource)]).to_string()
}

/// Decode an event frame `[8, topic, {uri, eventType, data}]`.
///
/// Anything else (welcome frames, malformed text) yields `None`. Deletes are
/// delivered with a `Null` payload.
pub fn parse_event_frame(text: &str) -> Option<SocketEvent> {
    let frame: Value = serde_json::from_str(text).ok()?;
    let parts = frame.as_array()?;
    if parts.first()?.as_i64()? != WAMP_EVENT {
        return None;
    }
    let body = parts.get(2)?;
    let uri = body.get("uri")?.as_str()?;
    let deleted = body.get("eventType").and_then(Value::as_str) == Some("Delete");
    let payload = if deleted {
        Value::Null
    } else {
        body.get("data").cloned().unwrap_or(Value::Null)
    };
    Some(SocketEvent::new(uri, payload))
}

/// Forward decoded events from a message stream until it closes, errors,
/// or the receiver is dropped.
///
/// Generic over the stream so it can be driven by in-memory streams.
pub async fn pump_frames<St>(mut stream: St, tx: &mpsc::Sender<SocketEvent>)
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let Some(event) = parse_event_frame(text.as_str()) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            Ok(Message::Close(frame)) => {
                info!("control API closed the event socket: {frame:?}");
                break;
            }
            Err(e) => {
                warn!("control API event socket error: {e}");
                break;
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// HTTPS request half
// ---------------------------------------------------------------------------

pub struct HttpLcuApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpLcuApi {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, LcuError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: credentials.base_url(),
            token: credentials.token.clone(),
        })
    }
}

#[async_trait]
impl LcuApi for HttpLcuApi {
    async fn request(&self, endpoint: &str) -> Result<Value, LcuError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .basic_auth(AUTH_USER, Some(&self.token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LcuError::NotFound);
        }
        if !status.is_success() {
            return Err(LcuError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

// ---------------------------------------------------------------------------
// Event socket
// ---------------------------------------------------------------------------

pub struct WampTransport {
    request_timeout: Duration,
}

impl WampTransport {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for WampTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl LcuTransport for WampTransport {
    async fn connect(
        &self,
        credentials: &Credentials,
        resources: &[&str],
    ) -> Result<LcuSession, LcuError> {
        let api = HttpLcuApi::new(credentials, self.request_timeout)?;

        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;

        let mut request = credentials.websocket_url().into_client_request()?;
        let auth = HeaderValue::from_str(&credentials.basic_auth_header())
            .map_err(|e| LcuError::MalformedPayload(format!("auth header: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("wamp"));

        // The prober awaits this inline, so the handshake is bounded.
        let handshake = tokio_tungstenite::connect_async_tls_with_config(
            request,
            None,
            false,
            Some(Connector::NativeTls(tls)),
        );
        let (socket, _response) = tokio::time::timeout(self.request_timeout, handshake)
            .await
            .map_err(|_| LcuError::HandshakeTimeout(self.request_timeout))??;

        let (mut write, read) = socket.split();
        for resource in resources {
            write
                .send(Message::Text(subscribe_frame(resource).into()))
                .await?;
            debug!("subscribed to {resource}");
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader = tokio::spawn(async move {
            // The sink must outlive the reader or the socket half-closes.
            let _write = write;
            pump_frames(read, &tx).await;
        });

        Ok(LcuSession {
            api: Arc::new(api),
            events: rx,
            reader: Some(reader),
        })
    }
}

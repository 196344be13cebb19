use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LiveError;

pub const DEFAULT_LIVE_URL: &str = "https://127.0.0.1:2999/liveclientdata/allgamedata";

/// Where the watcher reads the live match document from.
#[async_trait]
pub trait LiveSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, LiveError>;
}

/// GET against the loopback live endpoint. The endpoint serves a
/// self-signed certificate, so validation is off.
pub struct HttpLiveSource {
    client: reqwest::Client,
    url: String,
}

impl HttpLiveSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LiveError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LiveSource for HttpLiveSource {
    async fn fetch(&self) -> Result<Value, LiveError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LiveError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

//! Remote authoritative store interface and the production HTTP adapter.

use crate::cache::MARKER_FIELD;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors talking to the remote store.
///
/// Every variant is a failed attempt to the gateway; the retry budget lives
/// there, not in the adapter.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store returned status {0}")]
    Status(u16),

    #[error("invalid remote response: {0}")]
    InvalidResponse(String),
}

/// A record fetched from the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub body: Value,
    pub last_modified: i64,
}

/// The remote authoritative store.
///
/// All operations are keyed by (location, key); bodies are opaque JSON.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches a record body and its freshness marker.
    async fn get(&self, location: &str, key: &str) -> Result<Option<RemoteRecord>, RemoteError>;

    /// Fetches only the freshness marker, cheaper than the full body.
    async fn get_marker(&self, location: &str, key: &str) -> Result<Option<i64>, RemoteError>;

    /// Stores a record body.
    async fn put(&self, location: &str, key: &str, body: &Value) -> Result<(), RemoteError>;
}

/// HTTP remote store configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the remote store, without a trailing slash.
    pub base_url: String,
    /// Event name; prefixes every remote path.
    pub event: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            event: event.into(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Production `RemoteStore` speaking HTTP/JSON.
///
/// Paths mirror the store's document layout:
/// - body:   `GET/PUT {base}/{event}/{location}/{key}.json`
/// - marker: `GET {base}/{event}/{location}/{key}/last_modified.json`
///
/// An absent document reads as JSON `null` or HTTP 404, both mapped to
/// `None`.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    event: String,
}

impl HttpRemote {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            event: config.event,
        })
    }

    fn body_url(&self, location: &str, key: &str) -> String {
        format!("{}/{}/{}/{}.json", self.base_url, self.event, location, key)
    }

    fn marker_url(&self, location: &str, key: &str) -> String {
        format!(
            "{}/{}/{}/{}/last_modified.json",
            self.base_url, self.event, location, key
        )
    }

    async fn get_json(&self, url: &str) -> Result<Option<Value>, RemoteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(value))
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn get(&self, location: &str, key: &str) -> Result<Option<RemoteRecord>, RemoteError> {
        let url = self.body_url(location, key);
        match self.get_json(&url).await? {
            Some(body) => {
                let last_modified = body.get(MARKER_FIELD).and_then(Value::as_i64).unwrap_or(0);
                Ok(Some(RemoteRecord {
                    body,
                    last_modified,
                }))
            }
            None => Ok(None),
        }
    }

    async fn get_marker(&self, location: &str, key: &str) -> Result<Option<i64>, RemoteError> {
        let url = self.marker_url(location, key);
        match self.get_json(&url).await? {
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| RemoteError::InvalidResponse(format!("non-integer marker: {}", value))),
            None => Ok(None),
        }
    }

    async fn put(&self, location: &str, key: &str, body: &Value) -> Result<(), RemoteError> {
        let url = self.body_url(location, key);
        let response = self
            .client
            .put(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

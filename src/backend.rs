//! Client for the REST API that performs the object-store calls.

use crate::credentials::Credentials;
use crate::error::BackendError;
use crate::listing::{EntryKind, ObjectEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    Ok,
    Error,
    None,
}

/// Reply of the startup session probe (`GET /`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReply {
    pub status: ReplyStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bucket: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub buckets: Vec<String>,
}

/// `{status, message}` reply shared by connect, set-bucket and bucket refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: ReplyStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: Vec<String>,
}

impl StatusReply {
    pub fn ok(message: Vec<String>) -> Self {
        Self {
            status: ReplyStatus::Ok,
            message,
        }
    }

    pub fn error(token: &str) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: vec![token.to_string()],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    /// Error token of a failed reply; empty when the backend sent none.
    pub fn token(&self) -> &str {
        self.message.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SizeReply {
    size: u64,
}

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    endpoint: &'a str,
    key: &'a str,
    secret: &'a str,
}

#[derive(Debug, Serialize)]
struct BucketRequest<'a> {
    bucket: &'a str,
}

/// A listing row as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
struct WireEntry {
    key: String,
    #[serde(rename = "type", default)]
    kind: Option<WireKind>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireKind {
    File,
    Folder,
}

impl From<WireEntry> for ObjectEntry {
    fn from(wire: WireEntry) -> Self {
        let kind = match wire.kind {
            Some(WireKind::File) => EntryKind::File,
            Some(WireKind::Folder) => EntryKind::Folder,
            None if wire.key.ends_with('/') => EntryKind::Folder,
            None => EntryKind::File,
        };
        ObjectEntry {
            key: wire.key,
            kind,
            size: wire.size,
            last_modified: wire.last_modified,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The backend serializes timestamps either as RFC 3339 or as HTTP dates.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_timestamp(&s)))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The REST surface the browser consumes.
///
/// Calls are credentialed by the session the implementation carries; the
/// browser never re-sends credentials outside of [`Backend::connect`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Probes for an existing session (`GET /`).
    async fn session(&self) -> BackendResult<SessionReply>;

    /// Opens a connection with new credentials (`POST /`).
    async fn connect(&self, credentials: &Credentials) -> BackendResult<StatusReply>;

    /// Makes `bucket` the active bucket of the session (`POST /bucket`).
    async fn set_bucket(&self, bucket: &str) -> BackendResult<StatusReply>;

    /// Re-reads the bucket list of the live connection (`GET /buckets`).
    async fn buckets(&self) -> BackendResult<StatusReply>;

    /// Lists the rows directly under `prefix`; empty means bucket root.
    async fn list_objects(&self, prefix: &str) -> BackendResult<Vec<ObjectEntry>>;

    /// Total size in bytes of every object under `prefix`.
    async fn folder_size(&self, prefix: &str) -> BackendResult<u64>;
}

pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> BackendResult<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| BackendError::Transport(format!("invalid API url {}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> BackendResult<Url> {
        self.base
            .join(path)
            .map_err(|e| BackendError::Transport(format!("invalid API path {}: {}", path, e)))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn session(&self) -> BackendResult<SessionReply> {
        let url = self.url("")?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn connect(&self, credentials: &Credentials) -> BackendResult<StatusReply> {
        let url = self.url("")?;
        debug!("POST {} endpoint={}", url, credentials.endpoint);
        let body = ConnectRequest {
            endpoint: &credentials.endpoint,
            key: &credentials.access_key,
            secret: &credentials.secret_key,
        };
        let response = self.client.post(url).json(&body).send().await?;
        Self::decode(response).await
    }

    async fn set_bucket(&self, bucket: &str) -> BackendResult<StatusReply> {
        let url = self.url("bucket")?;
        debug!("POST {} bucket={}", url, bucket);
        let response = self
            .client
            .post(url)
            .json(&BucketRequest { bucket })
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn buckets(&self) -> BackendResult<StatusReply> {
        let url = self.url("buckets")?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn list_objects(&self, prefix: &str) -> BackendResult<Vec<ObjectEntry>> {
        let url = self.url("objects")?;
        debug!("GET {} prefix={:?}", url, prefix);
        let response = self
            .client
            .get(url)
            .query(&[("prefix", prefix)])
            .send()
            .await?;
        let rows: Vec<WireEntry> = Self::decode(response).await?;
        Ok(rows.into_iter().map(ObjectEntry::from).collect())
    }

    async fn folder_size(&self, prefix: &str) -> BackendResult<u64> {
        let url = self.url("size")?;
        debug!("GET {} prefix={:?}", url, prefix);
        let response = self
            .client
            .get(url)
            .query(&[("prefix", prefix)])
            .send()
            .await?;
        let reply: SizeReply = Self::decode(response).await?;
        Ok(reply.size)
    }
}

//! Fetchers turn a URI into bytes.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use url::Url;

use crate::util::Cancellation;
use crate::{PluginError, Result};

const DEFAULT_USER_AGENT: &str = concat!("kubeplug/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BODY_SIZE: u64 = 1 << 30;
/// Upper bound on the buffer reserved from a `Content-Length` header.
const MAX_PREALLOCATION: u64 = 64 << 20;

/// Source of artifact bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full content behind `uri`.
    async fn fetch(&self, uri: &str, cancel: &Cancellation) -> Result<Vec<u8>>;
}

/// Timeouts and identification for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Responses larger than this fail with `FetchFailed`.
    pub max_body_size: u64,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl HttpFetcherConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = bytes;
        self
    }
}

/// Fetches `http(s)://` URIs over the network and `file://` URIs from disk.
///
/// Requests are not retried; a flaky network surfaces as `FetchFailed`.
pub struct HttpFetcher {
    client: Client,
    max_body_size: u64,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpFetcherConfig::default())
    }

    pub fn with_config(config: HttpFetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            max_body_size: config.max_body_size,
        })
    }

    async fn fetch_http(&self, uri: &str, cancel: &Cancellation) -> Result<Vec<u8>> {
        let response = self.client.get(uri).send().await.map_err(|e| fetch_failed(uri, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(uri, format!("HTTP {}", status.as_u16())));
        }

        let advertised = response.content_length().unwrap_or(0);
        if advertised > self.max_body_size {
            return Err(fetch_failed(uri, self.too_large(advertised)));
        }

        let mut body = Vec::with_capacity(advertised.min(MAX_PREALLOCATION) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            cancel.check()?;
            let chunk = chunk.map_err(|e| fetch_failed(uri, e))?;
            let received = (body.len() + chunk.len()) as u64;
            if received > self.max_body_size {
                return Err(fetch_failed(uri, self.too_large(received)));
            }
            body.extend_from_slice(&chunk);
        }

        log::debug!("Fetched {} bytes from {}", body.len(), uri);
        Ok(body)
    }

    fn too_large(&self, size: u64) -> String {
        format!("response of {} bytes exceeds the limit of {} bytes", size, self.max_body_size)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, uri: &str, cancel: &Cancellation) -> Result<Vec<u8>> {
        cancel.check()?;

        let url = Url::parse(uri).map_err(|e| fetch_failed(uri, e))?;
        match url.scheme() {
            "http" | "https" => self.fetch_http(uri, cancel).await,
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| fetch_failed(uri, "not a local file path"))?;
                tokio::fs::read(&path).await.map_err(|e| fetch_failed(uri, e))
            }
            other => Err(fetch_failed(uri, format!("unsupported scheme {:?}", other))),
        }
    }
}

/// Serves the content of one local file for every URI.
///
/// Useful for installing from a local artifact and in tests.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, uri: &str, cancel: &Cancellation) -> Result<Vec<u8>> {
        cancel.check()?;
        log::debug!("Reading {} from local file {}", uri, self.path.display());
        tokio::fs::read(&self.path).await.map_err(|e| fetch_failed(uri, e))
    }
}

fn fetch_failed(uri: &str, reason: impl ToString) -> PluginError {
    PluginError::FetchFailed {
        uri: uri.to_string(),
        reason: reason.to_string(),
    }
}

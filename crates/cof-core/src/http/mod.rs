//! HTTP plumbing for the catalog API, probes and media streaming.
//!
//! `Transport` is blocking (libcurl underneath); async callers go through
//! [`get`] and [`blocking`], which hop onto the blocking pool.

mod curl_transport;
#[cfg(test)]
pub(crate) mod fake;
pub mod user_agent;

pub use curl_transport::CurlTransport;

use serde::de::DeserializeOwned;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("transfer failed: {0}")]
    Curl(#[from] curl::Error),
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u32 },
    #[error("partial transfer from {url}: expected {expected} bytes, got {received}")]
    PartialTransfer {
        url: String,
        expected: u64,
        received: u64,
    },
    #[error("decode {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocking task failed: {0}")]
    Join(String),
}

/// A GET request. Query pairs are appended to `url` in order.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Platform auth plus a browser User-Agent.
    pub fn authorized(self, token: &str, user_agent: &str) -> Self {
        self.header("Authorization", format!("JWT {}", token))
            .header("User-Agent", user_agent)
    }

    /// Final URL with query pairs appended.
    pub fn full_url(&self) -> Result<url::Url, HttpError> {
        let mut url = url::Url::parse(&self.url).map_err(|source| HttpError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

/// Buffered response (catalog pages and probes only; media goes through `download`).
#[derive(Debug, Clone)]
pub struct Response {
    pub url: String,
    pub status: u32,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup (last value wins).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HttpError::Status {
                url: self.url,
                status: self.status,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|source| HttpError::Decode {
            url: self.url.clone(),
            source,
        })
    }
}

/// Blocking HTTP client used by every component.
pub trait Transport: Send + Sync {
    /// GET and buffer the whole body. Non-2xx statuses are returned, not raised.
    fn get(&self, request: &Request) -> Result<Response, HttpError>;

    /// GET and stream the body into `sink`. Non-2xx and short transfers are errors.
    /// Returns the number of bytes written.
    fn download(&self, request: &Request, sink: &mut dyn Write) -> Result<u64, HttpError>;
}

/// Runs [`Transport::get`] on the blocking pool.
pub async fn get(transport: &Arc<dyn Transport>, request: Request) -> Result<Response, HttpError> {
    let transport = Arc::clone(transport);
    tokio::task::spawn_blocking(move || transport.get(&request))
        .await
        .map_err(|e| HttpError::Join(e.to_string()))?
}

/// Runs `f` with the transport on the blocking pool (file streaming, probes with several requests).
pub async fn blocking<F, T>(transport: &Arc<dyn Transport>, f: F) -> Result<T, HttpError>
where
    F: FnOnce(&dyn Transport) -> Result<T, HttpError> + Send + 'static,
    T: Send + 'static,
{
    let transport = Arc::clone(transport);
    tokio::task::spawn_blocking(move || f(transport.as_ref()))
        .await
        .map_err(|e| HttpError::Join(e.to_string()))?
}

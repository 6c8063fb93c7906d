//! Where the poller gets its samples from

use std::error::Error as _;
use std::fmt;
use std::future::Future;
use std::io;

use reqwest::{Client, Url};
use tracing::debug;

/// Failure to fetch a sample from a remote process
#[derive(Debug)]
pub enum NetworkError {
    /// Nothing listening at the address; worth skipping and retrying
    ConnectionRefused { url: String, detail: String },
    /// Non-2xx response
    Status { url: String, status: u16, body: String },
    Transport { url: String, detail: String },
}

impl NetworkError {
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, NetworkError::ConnectionRefused { .. })
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionRefused { url, detail } => {
                write!(f, "connection refused by {}: {}", url, detail)
            }
            NetworkError::Status { url, status, body } => {
                write!(f, "{} answered with status {}: {:?}", url, status, body)
            }
            NetworkError::Transport { url, detail } => {
                write!(f, "get request to {} failed: {}", url, detail)
            }
        }
    }
}

impl std::error::Error for NetworkError {}

/// A source of wire-format lines.
pub trait RedSource {
    /// Fetch one `"<requests>, <errors>, <seconds>"` line.
    fn fetch(&mut self) -> impl Future<Output = Result<String, NetworkError>> + Send;
}

/// Fetches samples with an HTTP GET
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    pub fn new(url: Url) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .build()
            .map_err(|e| NetworkError::Transport {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        Ok(HttpSource { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl RedSource for HttpSource {
    async fn fetch(&mut self) -> Result<String, NetworkError> {
        let url = self.url.to_string();
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        debug!(%url, %status, "fetched sample");

        let body = response.text().await.map_err(|e| classify(&url, e))?;
        if !status.is_success() {
            return Err(NetworkError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn classify(url: &str, err: reqwest::Error) -> NetworkError {
    let detail = err.to_string();
    if is_connection_refused(&err) {
        NetworkError::ConnectionRefused {
            url: url.to_string(),
            detail,
        }
    } else {
        NetworkError::Transport {
            url: url.to_string(),
            detail,
        }
    }
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        if err.is_connect() && cause.to_string().contains("onnection refused") {
            return true;
        }
        source = cause.source();
    }
    false
}

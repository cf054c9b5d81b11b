use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport failure: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum TransportBuildError {
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to setup proxy '{proxy}': {source}")]
    Proxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
}

/// The slice of an HTTP response the engine cares about. Bodies are never
/// read; classification is status-driven.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub location: Option<String>,
}

/// The one seam between the engine and the network. Workers only ever issue
/// GETs through this; tests swap in a canned implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub verify_ssl: bool,
    pub proxy: Option<String>,
    pub extra_header: Option<(String, String)>,
}

/// reqwest-backed transport. Redirects are never followed: the classifier
/// needs to see 301/302 and their Location header itself.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn build(config: &TransportConfig) -> Result<Self, TransportBuildError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let ua = reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            TransportBuildError::InvalidHeader {
                name: "User-Agent".to_string(),
                reason: e.to_string(),
            }
        })?;
        headers.insert(reqwest::header::USER_AGENT, ua);

        if let Some((name, value)) = config.extra_header.as_ref() {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(
                |e| TransportBuildError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                },
            )?;
            let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                TransportBuildError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(header_name, header_value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout_seconds));

        if !config.verify_ssl {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| TransportBuildError::Proxy {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportBuildError::Client { source: e })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        Ok(TransportResponse {
            status,
            content_length: resp.content_length(),
            location,
        })
    }
}

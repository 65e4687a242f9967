//! Transport seam between the API layer and the network.
//!
//! Everything above this module talks to a [`Transport`], so tests can swap
//! the HTTP client for a scripted one.

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// HTTP method of an open-API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

/// Sends one request and returns the decoded JSON body.
///
/// Implementations return the whole body, envelope included; interpreting
/// `err_code` is left to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request to `path` (relative to the base URL).
    ///
    /// # Errors
    /// Returns error if the request fails or the body is not JSON.
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport that authenticates with the configured plugin token
    /// and user key.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if a credential is not a valid header value,
    /// `ApiError::Http` if the client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("X-PLUGIN-TOKEN", header_value("plugin token", &config.plugin_token)?);
        headers.insert("X-USER-KEY", header_value("user key", &config.user_key)?);

        let client = reqwest::Client::builder()
            .user_agent(concat!("larkbridge/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn header_value(what: &str, raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|_| ApiError::Config(format!("{what} is not a valid header value")))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        debug!(method = %method, path = %path, "Sending request");

        let mut request = self.client.request(method.into(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        serde_json::from_slice(&bytes).map_err(|_| {
            ApiError::Transport(format!(
                "HTTP {status} from {method} {path}: response body is not JSON"
            ))
        })
    }
}

//! `reqwest` implementation of [`HttpTransport`].

use super::contract::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct ReqwestTransport {
    client: reqwest::Client,
    api_root: Url,
}

impl ReqwestTransport {
    pub fn new(api_root: &str, timeout: Duration) -> Result<Self, ApiError> {
        let api_root = Url::parse(api_root)?;
        if api_root.cannot_be_a_base() {
            return Err(ApiError::ConfigError(format!(
                "API root {} cannot carry path segments",
                api_root
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_root })
    }

    /// Full URL of `request`, segments percent-encoded.
    pub fn url_for(&self, request: &HttpRequest) -> Result<Url, ApiError> {
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::ConfigError(format!("Invalid API root {}", self.api_root)))?
            .pop_if_empty()
            .extend(&request.segments);
        Ok(url)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = self.url_for(&request)?;
        debug!(method = ?request.method, url = %url, "Sending request");

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        debug!(status, "Received response");
        Ok(HttpResponse::new(status, body))
    }
}

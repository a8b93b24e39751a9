//! Data Source
//!
//! Addressing context of one connection: identity, read-only flag, API and
//! websocket roots. Every request of [`DataSourceClient`] is routed through it.

pub mod client;
pub mod error_log;

pub use client::{DataSourceClient, DeleteChildrenReport, NodeDetails};
pub use error_log::{ErrorLog, ErrorReport};

use crate::channel::channel_url;
use crate::config::LagoonConfig;
use crate::error::ApiError;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub id: String,
    pub readonly: bool,
    pub api_root: String,
    pub ws_root: String,
    /// Free-text filter applied when a listing does not name one.
    pub filter: String,
}

impl DataSource {
    /// Source `id` served under `api_root`; the websocket root is derived from it.
    pub fn new(id: impl Into<String>, api_root: impl Into<String>) -> Result<Self, ApiError> {
        let api_root = api_root.into();
        let ws_root = derive_ws_root(&api_root)?;
        Ok(Self {
            id: id.into(),
            readonly: false,
            api_root,
            ws_root,
            filter: String::new(),
        })
    }

    /// Build from resolved configuration. `id` overrides `datasource.id`.
    pub fn from_config(config: &LagoonConfig, id: Option<&str>) -> Result<Self, ApiError> {
        let id = id
            .map(str::to_string)
            .or_else(|| config.datasource.id.clone())
            .ok_or_else(|| {
                ApiError::ConfigError(
                    "No data source selected: set datasource.id or pass one explicitly".to_string(),
                )
            })?;
        let mut source = Self::new(id, config.server.api_root.clone())?;
        if let Some(ws_root) = &config.server.ws_root {
            source.ws_root = ws_root.trim_end_matches('/').to_string();
        }
        source.readonly = config.datasource.readonly;
        source.filter = config.datasource.filter.clone();
        Ok(source)
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn with_ws_root(mut self, ws_root: impl Into<String>) -> Self {
        self.ws_root = ws_root.into();
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Channel URL for a deferred response link such as `/ws/{uuid}`.
    pub fn channel_url(&self, link: &str) -> String {
        channel_url(&self.ws_root, link)
    }

    pub(crate) fn entrypoints_route(&self) -> Vec<String> {
        vec!["data".into(), self.id.clone(), "entrypoint".into()]
    }

    pub(crate) fn entrypoint_route(&self, path: &str, tail: Option<&str>) -> Vec<String> {
        let mut route = self.entrypoints_route();
        route.push(path.to_string());
        route.extend(tail.map(str::to_string));
        route
    }

    pub(crate) fn command_route(&self) -> Vec<String> {
        vec!["data".into(), self.id.clone(), "command".into()]
    }

    pub(crate) fn infos_route(&self) -> Vec<String> {
        vec!["data".into(), self.id.clone(), "infos".into()]
    }

    pub(crate) fn state_route(&self) -> Vec<String> {
        vec!["data".into(), self.id.clone(), "state".into()]
    }
}

/// Map `http`→`ws` and `https`→`wss`, keeping host, port and path.
pub fn derive_ws_root(api_root: &str) -> Result<String, ApiError> {
    let mut url = Url::parse(api_root)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(api_root.trim_end_matches('/').to_string()),
        other => {
            return Err(ApiError::ConfigError(format!(
                "Cannot derive a websocket root from scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ApiError::ConfigError(format!("Cannot switch {} to {}", api_root, scheme)))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

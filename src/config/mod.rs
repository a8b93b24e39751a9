//! Configuration
//!
//! Layered configuration resolved through the `config` crate. Precedence,
//! lowest first: built-in defaults, the global file
//! (`<config dir>/lagoon/config.toml`), the local `lagoon.toml`, and
//! `LAGOON_*` environment variables (`__` separates nested keys, e.g.
//! `LAGOON_SERVER__API_ROOT`).

pub mod facade;
pub mod merge;
pub mod sources;

pub use facade::ConfigLoader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LagoonConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub datasource: DataSourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LagoonConfig {
    /// Render as TOML, as it would be written to `lagoon.toml`.
    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Root of the HTTP API, e.g. `http://localhost:4000/lagoon`.
    #[serde(default = "default_api_root")]
    pub api_root: String,

    /// Root of the streaming channels; derived from `api_root` when unset.
    #[serde(default)]
    pub ws_root: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Deferred channels silent for longer than this are closed and rejected.
    #[serde(default)]
    pub channel_idle_timeout_secs: Option<u64>,
}

pub(crate) fn default_api_root() -> String {
    "http://localhost:4000/lagoon".to_string()
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_root: default_api_root(),
            ws_root: None,
            request_timeout_secs: default_request_timeout_secs(),
            channel_idle_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Data source used when none is given on the command line.
    #[serde(default)]
    pub id: Option<String>,

    /// Refuse destructive operations client-side.
    #[serde(default)]
    pub readonly: bool,

    /// Default free-text filter for listings.
    #[serde(default)]
    pub filter: String,
}

//! Built-in defaults, the lowest layer of every merge.

use crate::config::{default_api_root, default_request_timeout_secs};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.api_root", default_api_root())?
        .set_default(
            "server.request_timeout_secs",
            default_request_timeout_secs() as i64,
        )?
        .set_default("datasource.readonly", false)?
        .set_default("datasource.filter", "")
}

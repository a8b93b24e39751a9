//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::LagoonConfig;
use crate::error::ApiError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global file, `dir/lagoon.toml` and the environment.
    pub fn load(dir: &Path) -> Result<LagoonConfig, ApiError> {
        Ok(MergeService::load(dir)?)
    }

    /// Load from one file with the environment on top.
    pub fn load_from_file(path: &Path) -> Result<LagoonConfig, ApiError> {
        if !path.is_file() {
            return Err(ApiError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        Ok(MergeService::load_from_file(path)?)
    }

    pub fn default() -> LagoonConfig {
        LagoonConfig::default()
    }
}

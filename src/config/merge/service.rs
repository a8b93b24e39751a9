//! MergeService: stacks the sources in precedence order and deserializes the result.

use crate::config::sources::{environment, global_file, local_file};
use crate::config::LagoonConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

use super::merge_policy;

pub struct MergeService;

impl MergeService {
    /// Precedence: defaults -> global file -> local file -> environment (highest).
    pub fn load(dir: &Path) -> Result<LagoonConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = local_file::add_to_builder(builder, dir)?;
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        debug!(dir = %dir.display(), "Configuration resolved");
        config.try_deserialize()
    }

    pub fn load_from_file(path: &Path) -> Result<LagoonConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        debug!(file = %path.display(), "Configuration resolved");
        config.try_deserialize()
    }
}

//! Local `lagoon.toml` next to where the client runs.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};

pub const LOCAL_FILE_NAME: &str = "lagoon.toml";

pub fn path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_FILE_NAME)
}

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    dir: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(File::from(path(dir)).required(false)))
}

pub mod link_config;

use std::env;
use std::path::PathBuf;

pub use link_config::LinkConfig;

use crate::core::bluetooth::constants::DEFAULT_CONFIG_FILE;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "BOILER_CONFIG";

/// Configuration path: the explicit argument, then `BOILER_CONFIG`, then the default file.
pub fn config_path(argument: Option<String>) -> PathBuf {
    argument
        .or_else(|| env::var(CONFIG_ENV_VAR).ok())
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

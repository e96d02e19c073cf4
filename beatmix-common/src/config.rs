//! Configuration file resolution and loading

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name looked up in the platform config directories
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the configuration file following this priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. User config directory (`<config_dir>/beatmix/config.toml`)
/// 4. System config (`/etc/beatmix/config.toml`, Linux only)
///
/// Returns `None` when no file is found; callers then run on built-in defaults.
/// An explicitly requested path (1 or 2) is returned even if it does not exist,
/// so that loading it reports the problem instead of silently using defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("beatmix").join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/beatmix").join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and deserialize a TOML file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading configuration from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
    })?;

    Ok(toml::from_str(&content)?)
}

/// OS-dependent default directory for recordings and tracklists
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("beatmix"))
        .unwrap_or_else(|| PathBuf::from("./beatmix_data"))
}

//! Initialize the configuration directory: create ~/.herald and a default config.
//!
//! The template is `crates/lib/config/config.json`. Credentials are left out of it; set them
//! in the file or through ANNOUNCE_BOT_TOKEN, ANNOUNCE_ADMIN_ROOM and ANNOUNCE_SECRET.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

static DEFAULT_CONFIG: &str = include_str!("../config/config.json");

/// Create the config directory and write the default `config.json` if it does not exist.
/// An existing config file is left untouched. Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if config_path.exists() {
        log::info!("config already exists at {}, leaving it", config_path.display());
    } else {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

//! Path resolution for roadhouse
//!
//! # Environment Variables
//!
//! - `ROADHOUSE_CONFIG_DIR` - Override config directory
//! - `ROADHOUSE_STATE_DIR` - Override state directory (default state file)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `ROADHOUSE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/roadhouse` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\roadhouse`
//!    - macOS/Linux: `~/.config/roadhouse`
//!
//! For state_dir():
//! 1. `ROADHOUSE_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/roadhouse` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\roadhouse`
//!    - macOS/Linux: `~/.local/state/roadhouse`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "ROADHOUSE_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "ROADHOUSE_STATE_DIR";

const APP_DIR: &str = "roadhouse";

/// Get the roadhouse config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join(APP_DIR);
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of the settings file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the roadhouse state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join(APP_DIR);
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Default location of the file backend's state
pub fn default_state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join("groups.json"))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

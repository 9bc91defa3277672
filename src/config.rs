//! User settings (`config.toml`) and construction of the API client.
//!
//! ```toml
//! [remote]
//! backend = "http"
//! endpoint = "https://network.example.com/v1"
//! token_env = "ROADHOUSE_TOKEN"
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 500
//!
//! [apply]
//! jobs = 4
//! ```

use crate::paths;
use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use netkit::backend::Backend;
use netkit::backend::file::FileBackend;
use netkit::backend::http::HttpBackend;
use netkit::backend::memory::MemoryBackend;
use netkit::{Client, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which backend talks to the networking API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// JSON over HTTP
    Http,
    /// Local JSON state file
    #[default]
    File,
    /// In-process, discarded on exit
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub retry: RetrySettings,
    pub apply: ApplySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub backend: BackendKind,
    /// Base URL for the HTTP backend
    pub endpoint: Option<String>,
    /// State file for the file backend
    pub state_file: Option<String>,
    /// Environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            endpoint: None,
            state_file: None,
            token_env: "ROADHOUSE_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub fn to_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplySettings {
    pub jobs: usize,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Values from the command line that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct RemoteOverrides {
    pub backend: Option<BackendKind>,
    pub endpoint: Option<String>,
    pub state: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default location, or defaults if absent.
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Fold command-line overrides into the settings.
    pub fn apply_overrides(&mut self, overrides: &RemoteOverrides) {
        if let Some(backend) = overrides.backend {
            self.remote.backend = backend;
        }
        if let Some(endpoint) = &overrides.endpoint {
            self.remote.endpoint = Some(endpoint.clone());
        }
        if let Some(state) = &overrides.state {
            self.remote.state_file = Some(state.display().to_string());
        }
    }

    /// Path of the file backend's state.
    pub fn state_file(&self) -> Result<PathBuf> {
        match &self.remote.state_file {
            Some(path) => Ok(paths::expand(path)),
            None => paths::default_state_file(),
        }
    }

    /// Build the backend selected by the settings.
    pub fn backend(&self) -> Result<Box<dyn Backend>> {
        let backend: Box<dyn Backend> = match self.remote.backend {
            BackendKind::Memory => Box::new(MemoryBackend::new()),
            BackendKind::File => {
                let path = self.state_file()?;
                log::debug!("Using state file {}", path.display());
                Box::new(FileBackend::new(path))
            }
            BackendKind::Http => {
                let Some(endpoint) = &self.remote.endpoint else {
                    bail!("The http backend needs an endpoint (--endpoint or [remote] endpoint)");
                };
                let mut http = HttpBackend::with_timeout(
                    endpoint.as_str(),
                    Duration::from_secs(self.remote.timeout_secs),
                );
                match std::env::var(&self.remote.token_env) {
                    Ok(token) if !token.is_empty() => http = http.with_token(token),
                    _ => log::debug!("{} not set, sending unauthenticated requests", self.remote.token_env),
                }
                Box::new(http)
            }
        };
        Ok(backend)
    }

    /// Build a retrying client around the selected backend.
    pub fn client(&self) -> Result<Client> {
        Ok(Client::with_backend(self.backend()?).retry_config(self.retry.to_config()))
    }
}

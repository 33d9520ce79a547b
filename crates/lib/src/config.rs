//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.duet/config.json`) and
//! environment. A missing file means defaults; the backend section covers
//! both how to launch the subprocess and where its bridge listens.

use crate::model::ModelId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend process launch and bridge address settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Model defaults.
    #[serde(default)]
    pub models: ModelsConfig,
}

/// Backend launch and bridge address settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Host the backend serves on (default "127.0.0.1").
    #[serde(default = "default_backend_host")]
    pub host: String,

    /// Port for the backend's HTTP health endpoint and WebSocket bridge
    /// (default 4680). Overridden by DUET_BACKEND_PORT.
    #[serde(default = "default_backend_port")]
    pub port: u16,

    /// Backend executable; resolved from PATH when bare (default
    /// "duet-backend").
    #[serde(default = "default_backend_command")]
    pub command: String,

    /// Extra arguments, placed before the generated `--port` flag.
    #[serde(default)]
    pub args: Vec<String>,

    /// How long to wait for the backend to report ready before giving up
    /// (default 10000 ms).
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,
}

fn default_backend_host() -> String {
    "127.0.0.1".to_string()
}

fn default_backend_port() -> u16 {
    4680
}

fn default_backend_command() -> String {
    "duet-backend".to_string()
}

fn default_readiness_timeout_ms() -> u64 {
    10_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_backend_host(),
            port: default_backend_port(),
            command: default_backend_command(),
            args: Vec::new(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
        }
    }
}

/// Model defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    /// Model both surfaces start on.
    #[serde(default)]
    pub default: ModelId,
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DUET_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".duet").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or DUET_CONFIG_PATH). Missing file
/// means default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Resolve the backend port: env DUET_BACKEND_PORT overrides config.
pub fn resolve_backend_port(config: &Config) -> u16 {
    std::env::var("DUET_BACKEND_PORT")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(config.backend.port)
}

/// WebSocket URL of the backend bridge.
pub fn ws_url(config: &Config) -> String {
    format!("ws://{}:{}/ws", config.backend.host.trim(), config.backend.port)
}

/// HTTP health endpoint of the backend.
pub fn health_url(config: &Config) -> String {
    format!("http://{}:{}/", config.backend.host.trim(), config.backend.port)
}

/// Create the config directory and a default config file when missing.
/// Returns the path written (or already present).
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    if !path.exists() {
        let body = serde_json::to_string_pretty(&Config::default())?;
        std::fs::write(path, body)
            .with_context(|| format!("writing default config to {}", path.display()))?;
    }
    Ok(path.to_path_buf())
}

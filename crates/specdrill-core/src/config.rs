//! Project configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::generate::StatusPolicy;

/// Seconds before a single request is abandoned.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// OpenAPI document: local path or http(s) URL
    #[serde(default)]
    pub spec: Option<String>,

    /// Base URL of the server to test. Always wins over a derived one.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds, applied to every request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How expected status codes are derived
    #[serde(default)]
    pub status_policy: StatusPolicy,

    /// Concurrent workers; 1 runs cases sequentially
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Dump every executed case to JSONL files
    #[serde(default)]
    pub dump: bool,

    /// Directory for dump files (default: ".specdrill/dumps")
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_workers() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            status_policy: StatusPolicy::default(),
            workers: default_workers(),
            dump: false,
            dump_dir: None,
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from the first default location that exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".specdrill.toml", ".specdrill.json", "specdrill.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    #[must_use]
    pub fn dump_dir(&self) -> PathBuf {
        self.dump_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".specdrill/dumps"))
    }

    /// Example config file
    #[must_use]
    pub fn example() -> &'static str {
        r#"# specdrill configuration

# OpenAPI document: local file or http(s) URL
spec = "openapi.yaml"

# Server to test. Required for local spec files; derived from the
# spec URL (scheme + host) when omitted for remote ones.
base_url = "http://localhost:8080"

# Per-request timeout in seconds
# timeout_secs = 30

# Expected status: "any_success" always expects 200,
# "declared" expects the first declared 2xx code
# status_policy = "any_success"

# Concurrent workers (1 = sequential)
# workers = 1

# Dump every executed case to JSONL files (default: false)
# dump = true
# dump_dir = ".specdrill/dumps"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}

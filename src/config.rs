//! Client configuration
//!
//! Loaded from a TOML file. Only `server_url` is required.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".local").join("share").join("secure_camera")
}

fn default_chunk_seconds() -> u64 {
    15
}

fn default_rotation_grace_ms() -> u64 {
    500
}

fn default_download_concurrency() -> usize {
    4
}

fn default_chunk_timeout_secs() -> Option<u64> {
    Some(120)
}

fn default_load_timeout_secs() -> u64 {
    10
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

/// Capture input handed to ffmpeg (`-f <format> -i <input>`)
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureInput {
    pub format: String,
    pub input: String,
}

impl Default for CaptureInput {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self {
                format: "avfoundation".to_string(),
                input: "0:0".to_string(),
            }
        } else {
            Self {
                format: "v4l2".to_string(),
                input: "/dev/video0".to_string(),
            }
        }
    }
}

/// Client configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the remote store (e.g. http://host:5000)
    pub server_url: String,
    /// Private document area for segments, downloads and deliverables
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Length of one recorded segment in seconds (default: 15)
    #[serde(default = "default_chunk_seconds")]
    pub chunk_seconds: u64,
    /// Pause between stopping one capture target and starting the next
    #[serde(default = "default_rotation_grace_ms")]
    pub rotation_grace_ms: u64,
    /// Maximum chunk fetches in flight per download
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,
    /// Per-chunk fetch timeout; omit to rely on transport timeouts only
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: Option<u64>,
    /// Bounded wait for loading a chunk during reassembly
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    #[serde(default)]
    pub capture: CaptureInput,
}

impl ClientConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ClientConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server_url must not be empty".to_string()));
        }
        if self.chunk_seconds == 0 {
            return Err(ConfigError::Invalid("chunk_seconds must be greater than 0".to_string()));
        }
        if self.download_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "download_concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Default config path: ~/.config/secure_camera/config.toml
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("secure_camera")
            .join("config.toml")
    }

    pub fn chunk_duration(&self) -> Duration {
        Duration::from_secs(self.chunk_seconds)
    }

    pub fn rotation_grace(&self) -> Duration {
        Duration::from_millis(self.rotation_grace_ms)
    }

    pub fn chunk_timeout(&self) -> Option<Duration> {
        self.chunk_timeout_secs.map(Duration::from_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn segments_dir(&self) -> PathBuf {
        self.data_dir.join("segments")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn library_dir(&self) -> PathBuf {
        self.data_dir.join("library")
    }
}

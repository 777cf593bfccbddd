//! Remote store types and errors

use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by any call to the remote store
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Network(e.to_string())
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// One compressed segment ready to be sent
#[derive(Debug, Clone)]
pub struct SegmentUpload {
    pub session_id: String,
    pub sequence_number: u64,
    pub tier: Tier,
    pub file_path: PathBuf,
}

/// Response of the storage info endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    pub storage_used: f64,
    pub storage_limit: f64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub storage_percentage: Option<f64>,
    #[serde(default)]
    pub subscription_tier: Option<String>,
}

/// A recording session stored on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub session_id: String,
    #[serde(default)]
    pub session_name: String,
    #[serde(default)]
    pub chunk_count: u64,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionList {
    pub videos: Vec<RemoteSession>,
}

/// Body of JSON requests that only carry credentials
#[derive(Debug, Serialize)]
pub(crate) struct AuthBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
}

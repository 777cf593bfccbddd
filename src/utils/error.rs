//! Error types and handling
//!
//! Common error types used across the application.

use crate::account::AccountError;
use crate::compression::CompressionError;
use crate::config::ConfigError;
use crate::download::DownloadError;
use crate::reassembly::ReassemblyError;
use crate::recorder::RecordingError;
use crate::remote::RemoteError;
use crate::retrieval::RetrievalError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),
}

impl From<RetrievalError> for AppError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::Remote(e) => AppError::Remote(e),
            RetrievalError::Download(e) => AppError::Download(e),
            RetrievalError::Reassembly(e) => AppError::Reassembly(e),
            RetrievalError::Io(e) => AppError::Io(e),
        }
    }
}

/// Error response for callers that render errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

fn remote_code(error: &RemoteError) -> &'static str {
    match error {
        RemoteError::NotAuthenticated => "NOT_AUTHENTICATED",
        RemoteError::QuotaExceeded => "QUOTA_EXCEEDED",
        RemoteError::Network(_) => "NETWORK_ERROR",
        RemoteError::Server { .. } => "SERVER_ERROR",
        RemoteError::InvalidResponse(_) => "INVALID_RESPONSE",
        RemoteError::MalformedManifest(_) => "MALFORMED_MANIFEST",
        RemoteError::Io(_) => "IO_ERROR",
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Account(_) => "ACCOUNT_ERROR",
            AppError::Recording(RecordingError::QuotaExceeded) => "QUOTA_EXCEEDED",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Compression(CompressionError::Cancelled) => "COMPRESSION_CANCELLED",
            AppError::Compression(_) => "COMPRESSION_FAILED",
            AppError::Remote(e) => remote_code(e),
            AppError::Download(DownloadError::ChunkTimeout { .. }) => "CHUNK_TIMEOUT",
            AppError::Download(DownloadError::Chunk { source, .. }) => remote_code(source),
            AppError::Download(_) => "DOWNLOAD_ERROR",
            AppError::Reassembly(ReassemblyError::CorruptChunk(_)) => "CORRUPT_CHUNK",
            AppError::Reassembly(ReassemblyError::ChunkLoadTimeout(_)) => "CHUNK_LOAD_TIMEOUT",
            AppError::Reassembly(ReassemblyError::NoValidContent) => "NO_VALID_CONTENT",
            AppError::Reassembly(ReassemblyError::ExportCancelled) => "EXPORT_CANCELLED",
            AppError::Reassembly(_) => "EXPORT_FAILED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

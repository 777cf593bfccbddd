//! Segment compression
//!
//! Transcodes a finished segment to the preset its tier calls for. Neither
//! the input nor the output is deleted here; the upload client removes both
//! once the server has confirmed the transfer.

use crate::media::{MediaError, MediaToolkit};
use crate::tier::Tier;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Compression failed: {0}")]
    Failed(String),

    #[error("Compression cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediaError> for CompressionError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Cancelled => CompressionError::Cancelled,
            MediaError::Io(e) => CompressionError::Io(e),
            other => CompressionError::Failed(other.to_string()),
        }
    }
}

/// Output path for the compressed copy of a segment
pub fn compressed_path(local_path: &Path) -> PathBuf {
    let stem = local_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "segment".to_string());
    local_path.with_file_name(format!("{}_compressed.mp4", stem))
}

/// Compression stage of the capture pipeline
pub struct Compressor {
    toolkit: Arc<dyn MediaToolkit>,
}

impl Compressor {
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { toolkit }
    }

    /// Compress `local_path` for `tier`, returning the compressed file's path
    pub async fn compress(&self, local_path: &Path, tier: Tier) -> Result<PathBuf, CompressionError> {
        if !local_path.exists() {
            return Err(CompressionError::Failed(format!(
                "Segment file not found: {:?}",
                local_path
            )));
        }

        let preset = tier.compression_preset();
        let output = compressed_path(local_path);
        tracing::debug!("Compressing {:?} with {:?} preset", local_path, preset);

        if let Err(e) = self.toolkit.transcode(local_path, &output, preset).await {
            // Original stays for a manual retry
            let _ = tokio::fs::remove_file(&output).await;
            return Err(e.into());
        }

        Ok(output)
    }
}

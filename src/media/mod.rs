//! Media tooling
//!
//! This module wraps the operations the pipelines need from a media stack:
//! probing a file, transcoding a segment to a tier preset, and concatenating
//! chunks without re-encoding.

pub mod ffmpeg;
pub mod types;

use crate::tier::CompressionPreset;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use ffmpeg::FfmpegToolkit;
pub use types::{MediaError, MediaInfo};

#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Inspect tracks and duration of a media file
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError>;

    /// Re-encode `input` into `output` with the given preset
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        preset: CompressionPreset,
    ) -> Result<(), MediaError>;

    /// Join `inputs` in order into `output` without re-encoding
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError>;
}

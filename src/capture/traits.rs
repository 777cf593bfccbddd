//! Capture trait definitions
//!
//! Platform-agnostic interface to a camera capture device. The recorder only
//! ever has one capture target (output file) open at a time.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use crate::tier::CapturePreset;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture device not opened")]
    NotOpen,

    #[error("A capture target is already running")]
    AlreadyCapturing,

    #[error("No capture target is running")]
    NotCapturing,

    #[error("Capture target produced no output: {0:?}")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// A capture device that writes video into one target file at a time
#[async_trait]
pub trait CaptureDevice: Send {
    /// Device identifier used in logs
    fn id(&self) -> &str;

    /// Open the device at the given preset
    async fn open(&mut self, preset: CapturePreset) -> CaptureResult<()>;

    /// Begin writing to a new output file
    async fn start_target(&mut self, path: &Path) -> CaptureResult<()>;

    /// Stop the running target and return the finished file's path
    async fn stop_target(&mut self) -> CaptureResult<PathBuf>;

    /// Whether a target is currently being written
    fn is_capturing(&self) -> bool;

    /// Release the device
    async fn close(&mut self) -> CaptureResult<()>;
}

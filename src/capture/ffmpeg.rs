//! Camera capture through ffmpeg
//!
//! Each capture target is one ffmpeg process reading the configured input
//! device and encoding straight into the segment file. Stopping a target asks
//! ffmpeg to quit so it can finalize the container.

use super::traits::{CaptureDevice, CaptureError, CapturePreset, CaptureResult};
use crate::config::CaptureInput;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

/// How long ffmpeg gets to finalize a file before it is killed
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

struct ActiveTarget {
    process: Child,
    path: PathBuf,
}

/// Capture device backed by an ffmpeg input (v4l2, avfoundation, lavfi, ...)
pub struct FfmpegCaptureDevice {
    id: String,
    ffmpeg: String,
    input: CaptureInput,
    preset: Option<CapturePreset>,
    active: Option<ActiveTarget>,
}

impl FfmpegCaptureDevice {
    pub fn new(ffmpeg: impl Into<String>, input: CaptureInput) -> Self {
        Self {
            id: format!("{}:{}", input.format, input.input),
            ffmpeg: ffmpeg.into(),
            input,
            preset: None,
            active: None,
        }
    }
}

/// Arguments for recording one segment file
pub fn capture_args(input: &CaptureInput, preset: CapturePreset, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostats".to_string(),
        "-f".to_string(),
        input.format.clone(),
    ];

    // lavfi sources carry size and rate in the filter string itself
    if input.format != "lavfi" {
        args.extend([
            "-framerate".to_string(),
            preset.fps.to_string(),
            "-video_size".to_string(),
            format!("{}x{}", preset.width, preset.height),
        ]);
    }

    args.extend([
        "-i".to_string(),
        input.input.clone(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-crf".to_string(),
        "18".to_string(),
        "-g".to_string(),
        (preset.fps * 2).to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

#[async_trait]
impl CaptureDevice for FfmpegCaptureDevice {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(&mut self, preset: CapturePreset) -> CaptureResult<()> {
        let probe = Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if !matches!(probe, Ok(status) if status.success()) {
            return Err(CaptureError::DeviceUnavailable(format!(
                "'{}' not found. Please install FFmpeg and add it to PATH.",
                self.ffmpeg
            )));
        }

        self.preset = Some(preset);
        tracing::info!(
            "Capture device {} opened at {}x{} @ {}fps",
            self.id,
            preset.width,
            preset.height,
            preset.fps
        );
        Ok(())
    }

    async fn start_target(&mut self, path: &Path) -> CaptureResult<()> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyCapturing);
        }
        let preset = self.preset.ok_or(CaptureError::NotOpen)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let process = Command::new(&self.ffmpeg)
            .args(capture_args(&self.input, preset, path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("Failed to start FFmpeg: {}", e)))?;

        tracing::debug!("Capture target started: {:?}", path);
        self.active = Some(ActiveTarget {
            process,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn stop_target(&mut self) -> CaptureResult<PathBuf> {
        let ActiveTarget { mut process, path } =
            self.active.take().ok_or(CaptureError::NotCapturing)?;

        // 'q' on stdin makes ffmpeg flush and write the trailer
        if let Some(mut stdin) = process.stdin.take() {
            let _ = stdin.write_all(b"q").await;
            drop(stdin);
        }

        match tokio::time::timeout(FINALIZE_TIMEOUT, process.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                tracing::warn!("FFmpeg capture exited with status {}", status);
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::warn!("FFmpeg did not finalize {:?} in time, killing it", path);
                process.kill().await?;
            }
        }

        if !path.exists() {
            return Err(CaptureError::MissingOutput(path));
        }
        tracing::debug!("Capture target finished: {:?}", path);
        Ok(path)
    }

    fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    async fn close(&mut self) -> CaptureResult<()> {
        if self.active.is_some() {
            self.stop_target().await?;
        }
        self.preset = None;
        tracing::info!("Capture device {} closed", self.id);
        Ok(())
    }
}

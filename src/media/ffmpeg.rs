//! FFmpeg-backed media toolkit
//!
//! Probing, transcoding and passthrough concatenation all shell out to the
//! `ffmpeg`/`ffprobe` executables.

use super::types::{MediaError, MediaInfo, ProbeOutput};
use super::MediaToolkit;
use crate::tier::CompressionPreset;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Media toolkit using the ffmpeg command line tools
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Run a tool to completion, mapping failures onto `MediaError`
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, MediaError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Ffmpeg(format!("Failed to start {}: {}", program, e)))?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        // No exit code means the process was killed by a signal
        if output.status.code().is_none() {
            return Err(MediaError::Cancelled);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(MediaError::Ffmpeg(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr_tail(&stderr)
        )))
    }
}

/// Last few lines of a tool's stderr; ffmpeg prints a banner first
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join(" | ")
}

/// Arguments for compressing a segment with one of the tier presets
pub fn transcode_args(input: &Path, output: &Path, preset: CompressionPreset) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];

    if let Some(filter) = preset.scale_filter() {
        args.extend(["-vf".to_string(), filter.to_string()]);
    }

    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        preset.h264_preset().to_string(),
        "-crf".to_string(),
        preset.crf().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        preset.audio_bitrate().to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

/// Arguments for a lossless concat of the inputs listed in `list_file`
pub fn concat_args(list_file: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_file.to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        // Output may carry a temporary extension
        "-f".to_string(),
        "mp4".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Body of an ffmpeg concat demuxer list
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration:stream=codec_type,width,height".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let stdout = self.run(&self.ffprobe, &args).await?;
        let probe: ProbeOutput = serde_json::from_slice(&stdout)
            .map_err(|e| MediaError::Probe(format!("Unexpected ffprobe output: {}", e)))?;
        probe.into_media_info()
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        preset: CompressionPreset,
    ) -> Result<(), MediaError> {
        let args = transcode_args(input, output, preset);
        tracing::info!("Starting FFmpeg transcode: {:?}", args);
        self.run(&self.ffmpeg, &args).await?;
        Ok(())
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let list = tempfile::Builder::new()
            .prefix(".concat-")
            .suffix(".txt")
            .tempfile_in(parent)?;
        tokio::fs::write(list.path(), concat_list(inputs)).await?;

        let args = concat_args(list.path(), output);
        tracing::info!("Starting FFmpeg concat of {} inputs: {:?}", inputs.len(), args);
        self.run(&self.ffmpeg, &args).await?;
        Ok(())
    }
}

//! Media types and errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a probe learned about a media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub has_video: bool,
    pub has_audio: bool,
    /// Container duration in seconds
    pub duration_secs: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Errors from media tooling
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Media operation cancelled")]
    Cancelled,
}

/// ffprobe JSON output (`-of json`)
#[derive(Debug, Deserialize)]
pub(crate) struct ProbeOutput {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProbeStream {
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProbeFormat {
    /// ffprobe reports durations as decimal strings
    pub duration: Option<String>,
}

impl ProbeOutput {
    pub(crate) fn into_media_info(self) -> Result<MediaInfo, MediaError> {
        let video = self
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));
        let has_audio = self
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        let duration_secs = match self.format.and_then(|f| f.duration) {
            Some(d) => d
                .trim()
                .parse::<f64>()
                .map_err(|_| MediaError::Probe(format!("Invalid duration '{}'", d)))?,
            None => 0.0,
        };

        Ok(MediaInfo {
            has_video: video.is_some(),
            has_audio,
            duration_secs,
            width: video.and_then(|v| v.width),
            height: video.and_then(|v| v.height),
        })
    }
}

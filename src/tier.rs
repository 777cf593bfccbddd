//! Subscription tier policy
//!
//! The tier decides capture resolution, the compression preset applied before
//! upload, and the storage ceiling the server enforces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription tier of the recording account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
    Pro,
}

impl Default for Tier {
    fn default() -> Self {
        Self::Free
    }
}

impl Tier {
    /// Wire name used by the remote store
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
            Tier::Pro => "pro",
        }
    }

    /// Parse a wire name. Unknown names fall back to `Free`, like the server does.
    pub fn from_wire(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "premium" => Tier::Premium,
            "pro" => Tier::Pro,
            _ => Tier::Free,
        }
    }

    /// Storage ceiling in seconds of recorded video
    pub fn storage_limit_seconds(&self) -> f64 {
        match self {
            Tier::Free => 20.0 * 60.0,
            Tier::Premium => 20.0 * 60.0 * 60.0,
            Tier::Pro => 200.0 * 60.0 * 60.0,
        }
    }

    /// Whether this is a paid tier
    pub fn is_paid(&self) -> bool {
        !matches!(self, Tier::Free)
    }

    /// Capture settings the device is opened with
    pub fn capture_preset(&self) -> CapturePreset {
        match self {
            Tier::Free => CapturePreset {
                width: 1280,
                height: 720,
                fps: 30,
            },
            Tier::Premium => CapturePreset {
                width: 1920,
                height: 1080,
                fps: 30,
            },
            Tier::Pro => CapturePreset {
                width: 1920,
                height: 1080,
                fps: 60,
            },
        }
    }

    /// Transcode preset applied before upload
    pub fn compression_preset(&self) -> CompressionPreset {
        if self.is_paid() {
            CompressionPreset::HighQuality
        } else {
            CompressionPreset::Reduced
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution and frame rate requested from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePreset {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// The two transcode presets segments are compressed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompressionPreset {
    /// Smaller output for the free tier, capped at 720p
    Reduced,
    /// Keeps source resolution; no scale or composition filter
    HighQuality,
}

impl CompressionPreset {
    /// CRF value for H.264 encoding
    pub fn crf(&self) -> u8 {
        match self {
            CompressionPreset::Reduced => 28,
            CompressionPreset::HighQuality => 18,
        }
    }

    /// x264 speed preset
    pub fn h264_preset(&self) -> &'static str {
        match self {
            CompressionPreset::Reduced => "faster",
            CompressionPreset::HighQuality => "medium",
        }
    }

    /// Scale filter, if any. Paid tiers never get one.
    pub fn scale_filter(&self) -> Option<&'static str> {
        match self {
            CompressionPreset::Reduced => {
                Some("scale='min(1280,iw)':'min(720,ih)':force_original_aspect_ratio=decrease,scale=trunc(iw/2)*2:trunc(ih/2)*2")
            }
            CompressionPreset::HighQuality => None,
        }
    }

    /// Audio bitrate for AAC
    pub fn audio_bitrate(&self) -> &'static str {
        match self {
            CompressionPreset::Reduced => "96k",
            CompressionPreset::HighQuality => "192k",
        }
    }
}

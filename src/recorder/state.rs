//! Recording state management
//!
//! Defines the recorder state machine, session identity and the per-segment
//! lifecycle.

use crate::tier::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    Idle,
    /// Writing the current segment
    Recording,
    /// Between two capture targets
    Rotating,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Idle
    }
}

/// One continuous recording attempt
///
/// A fresh session (new id, sequence back to 1) is created every time
/// recording starts; sequence counters are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Opaque session token
    pub session_id: String,

    pub tier: Tier,

    /// Length of one segment in seconds
    pub chunk_duration_secs: u64,

    /// Sequence number of the segment currently being written, starting at 1
    pub sequence: u64,

    pub started_at: DateTime<Utc>,
}

impl RecordingSession {
    pub fn new(tier: Tier, chunk_duration: Duration) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            tier,
            chunk_duration_secs: chunk_duration.as_secs(),
            sequence: 1,
            started_at: Utc::now(),
        }
    }

    /// Local file a given segment of this session is written to
    pub fn segment_path(&self, dir: &Path, sequence: u64) -> PathBuf {
        dir.join(format!("{}_chunk_{:03}.mov", self.session_id, sequence))
    }
}

/// A segment the recorder has finished writing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSegment {
    pub session_id: String,
    pub tier: Tier,
    pub sequence_number: u64,
    pub local_path: PathBuf,
}

/// Lifecycle of a segment after capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentState {
    Captured,
    Compressing,
    Compressed,
    Uploading,
    Uploaded,
    Failed,
}

impl SegmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentState::Uploaded | SegmentState::Failed)
    }

    /// Transitions are linear; `Failed` is reachable from any live state
    pub fn can_transition_to(&self, next: SegmentState) -> bool {
        use SegmentState::*;
        match (self, next) {
            (Captured, Compressing)
            | (Compressing, Compressed)
            | (Compressed, Uploading)
            | (Uploading, Uploaded) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentState::Captured => "captured",
            SegmentState::Compressing => "compressing",
            SegmentState::Compressed => "compressed",
            SegmentState::Uploading => "uploading",
            SegmentState::Uploaded => "uploaded",
            SegmentState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid segment transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SegmentState,
    pub to: SegmentState,
}

/// A segment tracked through compression and upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub session_id: String,
    pub sequence_number: u64,
    pub local_path: PathBuf,
    pub compressed_path: Option<PathBuf>,
    pub state: SegmentState,
    /// Human readable status, carries the error for failed segments
    pub status: String,
}

impl Segment {
    pub fn captured(completed: &CompletedSegment) -> Self {
        Self {
            session_id: completed.session_id.clone(),
            sequence_number: completed.sequence_number,
            local_path: completed.local_path.clone(),
            compressed_path: None,
            state: SegmentState::Captured,
            status: SegmentState::Captured.to_string(),
        }
    }

    pub fn advance(&mut self, next: SegmentState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.status = next.to_string();
        Ok(())
    }

    pub fn fail(&mut self, reason: impl fmt::Display) -> Result<(), InvalidTransition> {
        self.advance(SegmentState::Failed)?;
        self.status = format!("failed: {}", reason);
        Ok(())
    }
}

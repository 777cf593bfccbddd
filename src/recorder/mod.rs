//! Recording system module
//!
//! - `SegmentRecorder` drives a capture device and rotates its output into
//!   fixed-length segments
//! - `state` holds the session identity and the per-segment lifecycle

pub mod coordinator;
pub mod state;

pub use coordinator::{RecorderConfig, RecorderEvent, RecordingError, RecordingResult, SegmentRecorder};
pub use state::{CompletedSegment, RecorderState, RecordingSession, Segment, SegmentState};

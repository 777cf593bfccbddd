//! Camera capture
//!
//! The recorder drives a `CaptureDevice`; `FfmpegCaptureDevice` is the
//! production implementation. `wake` keeps the machine awake while recording.

pub mod ffmpeg;
pub mod traits;
pub mod wake;

pub use ffmpeg::FfmpegCaptureDevice;
pub use traits::{CaptureDevice, CaptureError, CapturePreset, CaptureResult};
pub use wake::{InhibitorKeepAwake, KeepAwake, KeepAwakeGuard, NoopKeepAwake};

//! Segment recorder
//!
//! Drives the capture device and rotates its output into fixed-length
//! segments. Each finished segment is handed to the upload pipeline over a
//! channel; the recorder never waits for compression or upload.

use super::state::{CompletedSegment, RecorderState, RecordingSession};
use crate::capture::{CaptureDevice, CaptureError, KeepAwake, KeepAwakeGuard};
use crate::quota::QuotaTracker;
use crate::tier::Tier;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    Started { session_id: String },
    SegmentCompleted { session_id: String, sequence_number: u64 },
    /// The device failed to finalize a segment; its number stays unused
    SegmentLost {
        session_id: String,
        sequence_number: u64,
        reason: String,
    },
    Stopped { session_id: String, segments: u64 },
    Error(String),
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub chunk_duration: Duration,
    /// Pause after stopping a target so the device can flush the file
    pub rotation_grace: Duration,
    pub segments_dir: PathBuf,
}

type SharedDevice = Arc<tokio::sync::Mutex<Box<dyn CaptureDevice>>>;

/// Everything owned by a running session. Dropping it cancels rotation and
/// releases the keep-awake lock.
struct ActiveSession {
    session: Arc<Mutex<RecordingSession>>,
    cancel: CancellationToken,
    rotation: Option<JoinHandle<()>>,
    _keep_awake: KeepAwakeGuard,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.rotation.take() {
            handle.abort();
        }
    }
}

/// State shared between the recorder and its rotation task
#[derive(Clone)]
struct Rotator {
    device: SharedDevice,
    session: Arc<Mutex<RecordingSession>>,
    state: Arc<RwLock<RecorderState>>,
    config: RecorderConfig,
    cancel: CancellationToken,
    segment_tx: mpsc::UnboundedSender<CompletedSegment>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl Rotator {
    async fn run(self) {
        let period = self.config.chunk_duration;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.rotate().await {
                        tracing::error!("Segment rotation failed: {}", e);
                        let _ = self.event_tx.send(RecorderEvent::Error(e.to_string()));
                    }
                }
            }
        }
        tracing::debug!("Rotation task finished");
    }

    /// Stop the current target, wait out the grace window, start the next one
    async fn rotate(&self) -> RecordingResult<()> {
        let mut device = self.device.lock().await;
        *self.state.write() = RecorderState::Rotating;

        let (session_id, tier, sequence, next_path) = {
            let session = self.session.lock();
            (
                session.session_id.clone(),
                session.tier,
                session.sequence,
                session.segment_path(&self.config.segments_dir, session.sequence + 1),
            )
        };

        let finished = match device.stop_target().await {
            Ok(path) => Some(path),
            Err(CaptureError::NotCapturing) => None,
            Err(e) => {
                tracing::warn!("Segment {} of {} lost: {}", sequence, session_id, e);
                let _ = self.event_tx.send(RecorderEvent::SegmentLost {
                    session_id: session_id.clone(),
                    sequence_number: sequence,
                    reason: e.to_string(),
                });
                None
            }
        };

        let cancelled = tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(self.config.rotation_grace) => false,
        };

        if let Some(local_path) = finished {
            hand_off(
                &self.segment_tx,
                &self.event_tx,
                CompletedSegment {
                    session_id: session_id.clone(),
                    tier,
                    sequence_number: sequence,
                    local_path,
                },
            );
        }

        if cancelled {
            return Ok(());
        }

        // The counter only moves once the next target is actually running,
        // so a failed start never leaves a gap in the numbering
        device.start_target(&next_path).await?;
        self.session.lock().sequence = sequence + 1;
        *self.state.write() = RecorderState::Recording;
        Ok(())
    }
}

fn hand_off(
    segment_tx: &mpsc::UnboundedSender<CompletedSegment>,
    event_tx: &broadcast::Sender<RecorderEvent>,
    segment: CompletedSegment,
) {
    tracing::info!(
        "Segment {} of session {} completed: {:?}",
        segment.sequence_number,
        segment.session_id,
        segment.local_path
    );
    let event = RecorderEvent::SegmentCompleted {
        session_id: segment.session_id.clone(),
        sequence_number: segment.sequence_number,
    };
    if segment_tx.send(segment).is_err() {
        tracing::warn!("Segment pipeline is gone, segment stays on disk");
    }
    let _ = event_tx.send(event);
}

/// Records a session as a sequence of fixed-length segments
pub struct SegmentRecorder {
    device: SharedDevice,
    quota: Arc<QuotaTracker>,
    keep_awake: Arc<dyn KeepAwake>,
    config: RecorderConfig,
    state: Arc<RwLock<RecorderState>>,
    active: Option<ActiveSession>,
    segment_tx: mpsc::UnboundedSender<CompletedSegment>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl SegmentRecorder {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        quota: Arc<QuotaTracker>,
        keep_awake: Arc<dyn KeepAwake>,
        config: RecorderConfig,
        segment_tx: mpsc::UnboundedSender<CompletedSegment>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            device: Arc::new(tokio::sync::Mutex::new(device)),
            quota,
            keep_awake,
            config,
            state: Arc::new(RwLock::new(RecorderState::Idle)),
            active: None,
            segment_tx,
            event_tx,
        }
    }

    pub fn state(&self) -> RecorderState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the running session, if any
    pub fn session(&self) -> Option<RecordingSession> {
        self.active.as_ref().map(|a| a.session.lock().clone())
    }

    /// Start a new session at `tier`
    pub async fn start(&mut self, tier: Tier) -> RecordingResult<RecordingSession> {
        if self.active.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        if !self.quota.check_capacity() {
            let snapshot = self.quota.snapshot();
            tracing::warn!(
                "Refusing to record: {:.0}s of {:.0}s used",
                snapshot.used_seconds,
                snapshot.limit_seconds
            );
            return Err(RecordingError::QuotaExceeded);
        }

        tokio::fs::create_dir_all(&self.config.segments_dir).await?;
        let session = RecordingSession::new(tier, self.config.chunk_duration);
        let first = session.segment_path(&self.config.segments_dir, session.sequence);

        {
            let mut device = self.device.lock().await;
            device.open(tier.capture_preset()).await?;
            if let Err(e) = device.start_target(&first).await {
                let _ = device.close().await;
                return Err(e.into());
            }
        }

        let keep_awake = self.keep_awake.acquire();
        *self.state.write() = RecorderState::Recording;

        let shared = Arc::new(Mutex::new(session.clone()));
        let cancel = CancellationToken::new();
        let rotator = Rotator {
            device: self.device.clone(),
            session: shared.clone(),
            state: self.state.clone(),
            config: self.config.clone(),
            cancel: cancel.clone(),
            segment_tx: self.segment_tx.clone(),
            event_tx: self.event_tx.clone(),
        };
        let rotation = tokio::spawn(rotator.run());

        self.active = Some(ActiveSession {
            session: shared,
            cancel,
            rotation: Some(rotation),
            _keep_awake: keep_awake,
        });

        tracing::info!(
            "Recording started: session {} ({} tier, {}s segments)",
            session.session_id,
            tier,
            session.chunk_duration_secs
        );
        let _ = self.event_tx.send(RecorderEvent::Started {
            session_id: session.session_id.clone(),
        });
        Ok(session)
    }

    /// Stop recording. Returns the finished session, or `None` if idle.
    pub async fn stop(&mut self) -> RecordingResult<Option<RecordingSession>> {
        let Some(mut active) = self.active.take() else {
            return Ok(None);
        };

        active.cancel.cancel();
        if let Some(handle) = active.rotation.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Rotation task ended abnormally: {}", e);
            }
        }

        let session = active.session.lock().clone();
        let mut result = Ok(());
        {
            let mut device = self.device.lock().await;
            if device.is_capturing() {
                match device.stop_target().await {
                    Ok(local_path) => hand_off(
                        &self.segment_tx,
                        &self.event_tx,
                        CompletedSegment {
                            session_id: session.session_id.clone(),
                            tier: session.tier,
                            sequence_number: session.sequence,
                            local_path,
                        },
                    ),
                    Err(e) => {
                        tracing::warn!(
                            "Segment {} of {} lost: {}",
                            session.sequence,
                            session.session_id,
                            e
                        );
                        let _ = self.event_tx.send(RecorderEvent::SegmentLost {
                            session_id: session.session_id.clone(),
                            sequence_number: session.sequence,
                            reason: e.to_string(),
                        });
                        result = Err(RecordingError::from(e));
                    }
                }
            }
            if let Err(e) = device.close().await {
                tracing::warn!("Failed to close capture device: {}", e);
            }
        }

        drop(active);
        *self.state.write() = RecorderState::Idle;

        tracing::info!(
            "Recording stopped: session {} ({} segments)",
            session.session_id,
            session.sequence
        );
        let _ = self.event_tx.send(RecorderEvent::Stopped {
            session_id: session.session_id.clone(),
            segments: session.sequence,
        });

        result.map(|_| Some(session))
    }
}

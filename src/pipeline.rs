//! Capture-side segment pipeline
//!
//! Consumes finished segments from the recorder and runs each one through
//! compression and upload on its own task, so uploading segment N overlaps
//! with recording segment N+1. Failures are recorded in the ledger and
//! broadcast; they never reach the recorder.

use crate::compression::Compressor;
use crate::recorder::{CompletedSegment, Segment, SegmentState};
use crate::upload::{UploadClient, UploadRequest};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};

/// Status change of one segment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEvent {
    pub session_id: String,
    pub sequence_number: u64,
    pub state: SegmentState,
    pub status: String,
}

type SegmentKey = (String, u64);

pub struct SegmentPipeline {
    compressor: Compressor,
    uploader: UploadClient,
    /// Entries live until `take_statuses` collects their session
    ledger: Mutex<HashMap<SegmentKey, Segment>>,
    event_tx: broadcast::Sender<SegmentEvent>,
}

impl SegmentPipeline {
    pub fn new(compressor: Compressor, uploader: UploadClient) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            compressor,
            uploader,
            ledger: Mutex::new(HashMap::new()),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SegmentEvent> {
        self.event_tx.subscribe()
    }

    /// Process segments until the recorder side of the channel is dropped,
    /// then wait for every in-flight segment to settle.
    pub fn spawn(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<CompletedSegment>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(segment) => {
                            let pipeline = self.clone();
                            tasks.spawn(async move {
                                pipeline.process(segment).await;
                            });
                        }
                        None => break,
                    },
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        if let Err(e) = joined {
                            tracing::error!("Segment task panicked: {}", e);
                        }
                    }
                }
            }

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Segment task panicked: {}", e);
                }
            }
            tracing::debug!("Segment pipeline drained");
        })
    }

    /// Compress then upload one segment, returning its final ledger entry
    pub async fn process(&self, completed: CompletedSegment) -> Segment {
        let key = (completed.session_id.clone(), completed.sequence_number);
        self.insert(Segment::captured(&completed));

        self.transition(&key, SegmentState::Compressing);
        let compressed = match self.compressor.compress(&completed.local_path, completed.tier).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(
                    "Compression of segment {} failed: {}",
                    completed.sequence_number,
                    e
                );
                return self.fail(&key, e);
            }
        };
        self.update(&key, |segment| {
            segment.compressed_path = Some(compressed.clone());
            segment.advance(SegmentState::Compressed)
        });

        self.transition(&key, SegmentState::Uploading);
        let request = UploadRequest {
            session_id: completed.session_id.clone(),
            sequence_number: completed.sequence_number,
            tier: completed.tier,
            compressed_path: compressed,
            original_path: completed.local_path.clone(),
        };
        match self.uploader.upload(&request).await {
            Ok(()) => self.transition(&key, SegmentState::Uploaded),
            Err(e) => self.fail(&key, e),
        }
    }

    /// Ledger entries of a session, ordered by sequence number
    pub fn statuses(&self, session_id: &str) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self
            .ledger
            .lock()
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect();
        segments.sort_by_key(|s| s.sequence_number);
        segments
    }

    /// Like `statuses`, but removes the session from the ledger.
    ///
    /// Call once the session's segments have settled.
    pub fn take_statuses(&self, session_id: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        self.ledger.lock().retain(|(session, _), segment| {
            if session == session_id {
                segments.push(segment.clone());
                false
            } else {
                true
            }
        });
        segments.sort_by_key(|s| s.sequence_number);
        segments
    }

    fn insert(&self, segment: Segment) {
        let key = (segment.session_id.clone(), segment.sequence_number);
        self.ledger.lock().insert(key, segment.clone());
        self.emit(&segment);
    }

    fn transition(&self, key: &SegmentKey, next: SegmentState) -> Segment {
        self.update(key, |segment| segment.advance(next))
    }

    fn fail(&self, key: &SegmentKey, reason: impl Display) -> Segment {
        self.update(key, |segment| segment.fail(&reason))
    }

    fn update<E: Display>(
        &self,
        key: &SegmentKey,
        apply: impl FnOnce(&mut Segment) -> Result<(), E>,
    ) -> Segment {
        let snapshot = {
            let mut ledger = self.ledger.lock();
            let Some(segment) = ledger.get_mut(key) else {
                tracing::warn!("Segment {:?} missing from ledger", key);
                return Segment {
                    session_id: key.0.clone(),
                    sequence_number: key.1,
                    local_path: Default::default(),
                    compressed_path: None,
                    state: SegmentState::Failed,
                    status: "failed: untracked".to_string(),
                };
            };
            if let Err(e) = apply(segment) {
                tracing::warn!("Segment {} of {}: {}", key.1, key.0, e);
            }
            segment.clone()
        };
        self.emit(&snapshot);
        snapshot
    }

    fn emit(&self, segment: &Segment) {
        let _ = self.event_tx.send(SegmentEvent {
            session_id: segment.session_id.clone(),
            sequence_number: segment.sequence_number,
            state: segment.state,
            status: segment.status.clone(),
        });
    }
}

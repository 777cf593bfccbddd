//! Service wiring
//!
//! Every long-lived service is built exactly once here and shared by `Arc`.

use crate::account::AccountService;
use crate::capture::{CaptureDevice, FfmpegCaptureDevice, InhibitorKeepAwake, KeepAwake};
use crate::compression::Compressor;
use crate::config::ClientConfig;
use crate::download::{DownloadConfig, DownloadEngine};
use crate::media::{FfmpegToolkit, MediaToolkit};
use crate::pipeline::SegmentPipeline;
use crate::quota::{QuotaSnapshot, QuotaTracker};
use crate::reassembly::ReassemblyEngine;
use crate::recorder::{RecorderConfig, SegmentRecorder};
use crate::remote::{HttpRemoteStore, RemoteResult, RemoteStore};
use crate::retrieval::RetrievalService;
use crate::tier::Tier;
use crate::upload::UploadClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct App {
    pub config: ClientConfig,
    pub account: Arc<dyn AccountService>,
    pub remote: Arc<dyn RemoteStore>,
    pub toolkit: Arc<dyn MediaToolkit>,
    pub quota: Arc<QuotaTracker>,
    pub pipeline: Arc<SegmentPipeline>,
    pub retrieval: Arc<RetrievalService>,
}

/// A recorder and the task draining its segments
pub struct RecordingHandle {
    pub recorder: SegmentRecorder,
    pub pipeline: JoinHandle<()>,
}

impl RecordingHandle {
    /// Drop the recorder and wait for every handed-off segment to settle
    pub async fn finish(self) {
        drop(self.recorder);
        if let Err(e) = self.pipeline.await {
            tracing::error!("Segment pipeline ended abnormally: {}", e);
        }
    }
}

impl App {
    /// Production wiring: HTTP remote store and ffmpeg tooling
    pub fn new(config: ClientConfig, account: Arc<dyn AccountService>) -> RemoteResult<Self> {
        let remote: Arc<dyn RemoteStore> = Arc::new(HttpRemoteStore::new(&config.server_url)?);
        let toolkit: Arc<dyn MediaToolkit> =
            Arc::new(FfmpegToolkit::new(&config.ffmpeg_path, &config.ffprobe_path));
        Ok(Self::with_parts(config, account, remote, toolkit))
    }

    pub fn with_parts(
        config: ClientConfig,
        account: Arc<dyn AccountService>,
        remote: Arc<dyn RemoteStore>,
        toolkit: Arc<dyn MediaToolkit>,
    ) -> Self {
        let quota = Arc::new(QuotaTracker::new(
            remote.clone(),
            account.clone(),
            QuotaSnapshot::for_tier(Tier::Free),
        ));

        let pipeline = Arc::new(SegmentPipeline::new(
            Compressor::new(toolkit.clone()),
            UploadClient::new(remote.clone(), account.clone(), quota.clone()),
        ));

        let downloads = DownloadEngine::new(
            remote.clone(),
            DownloadConfig {
                max_concurrent: config.download_concurrency,
                chunk_timeout: config.chunk_timeout(),
                work_dir: config.downloads_dir(),
            },
        );
        let reassembly =
            ReassemblyEngine::new(toolkit.clone(), config.load_timeout(), config.library_dir());
        let retrieval = Arc::new(RetrievalService::new(
            remote.clone(),
            account.clone(),
            quota.clone(),
            downloads,
            reassembly,
            config.library_dir(),
        ));

        Self {
            config,
            account,
            remote,
            toolkit,
            quota,
            pipeline,
            retrieval,
        }
    }

    /// Recorder wired to the shared pipeline
    pub fn recorder(
        &self,
        device: Box<dyn CaptureDevice>,
        keep_awake: Arc<dyn KeepAwake>,
    ) -> RecordingHandle {
        let (segment_tx, segment_rx) = mpsc::unbounded_channel();
        let pipeline = self.pipeline.clone().spawn(segment_rx);
        let recorder = SegmentRecorder::new(
            device,
            self.quota.clone(),
            keep_awake,
            RecorderConfig {
                chunk_duration: self.config.chunk_duration(),
                rotation_grace: self.config.rotation_grace(),
                segments_dir: self.config.segments_dir(),
            },
            segment_tx,
        );
        RecordingHandle { recorder, pipeline }
    }

    /// Recorder on the configured ffmpeg input, holding off system sleep
    pub fn camera_recorder(&self) -> RecordingHandle {
        let device = FfmpegCaptureDevice::new(&self.config.ffmpeg_path, self.config.capture.clone());
        self.recorder(Box::new(device), Arc::new(InhibitorKeepAwake))
    }
}

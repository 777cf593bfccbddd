//! Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use secure_camera::account::{AccountService, Credentials, FileAccountService};
use secure_camera::capture::{CaptureDevice, CaptureError, CapturePreset, CaptureResult};
use secure_camera::config::{CaptureInput, ClientConfig};
use secure_camera::media::{MediaError, MediaInfo, MediaToolkit};
use secure_camera::remote::{
    RemoteError, RemoteResult, RemoteSession, RemoteStore, SegmentUpload, StorageInfo,
};
use secure_camera::tier::CompressionPreset;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn test_config(data_dir: &Path, server_url: &str) -> ClientConfig {
    ClientConfig {
        server_url: server_url.to_string(),
        data_dir: data_dir.to_path_buf(),
        chunk_seconds: 15,
        rotation_grace_ms: 500,
        download_concurrency: 2,
        chunk_timeout_secs: Some(5),
        load_timeout_secs: 5,
        ffmpeg_path: "ffmpeg".to_string(),
        ffprobe_path: "ffprobe".to_string(),
        capture: CaptureInput::default(),
    }
}

pub fn account() -> Arc<FileAccountService> {
    Arc::new(FileAccountService::new(Credentials {
        account: "cam@example.com".to_string(),
        credential: "424242".to_string(),
    }))
}

pub fn as_account(account: &Arc<FileAccountService>) -> Arc<dyn AccountService> {
    account.clone()
}

/// In-memory remote store
pub struct FakeRemote {
    pub storage: Mutex<StorageInfo>,
    /// Seconds of video one accepted upload adds
    pub seconds_per_upload: f64,
    /// Uploads at or after this sequence number are answered with 413
    pub reject_from: Mutex<Option<u64>>,
    /// Every call answers 401 while set
    pub expired: Mutex<bool>,
    pub uploads: Mutex<Vec<u64>>,
    pub manifest: Mutex<Option<String>>,
    pub chunks: Mutex<HashMap<String, Vec<u8>>>,
    /// Chunk URLs that stall this long before answering
    pub slow_chunks: Mutex<HashMap<String, Duration>>,
    pub chunk_fetches: AtomicUsize,
    pub sessions: Mutex<Vec<RemoteSession>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new(used: f64, limit: f64) -> Self {
        Self {
            storage: Mutex::new(StorageInfo {
                storage_used: used,
                storage_limit: limit,
                video_count: 0,
                storage_percentage: None,
                subscription_tier: Some("free".to_string()),
            }),
            seconds_per_upload: 15.0,
            reject_from: Mutex::new(None),
            expired: Mutex::new(false),
            uploads: Mutex::new(Vec::new()),
            manifest: Mutex::new(None),
            chunks: Mutex::new(HashMap::new()),
            slow_chunks: Mutex::new(HashMap::new()),
            chunk_fetches: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn set_manifest(&self, body: &str) {
        *self.manifest.lock().unwrap() = Some(body.to_string());
    }

    pub fn add_chunk(&self, url: &str, bytes: &[u8]) {
        self.chunks.lock().unwrap().insert(url.to_string(), bytes.to_vec());
    }

    fn check_auth(&self) -> RemoteResult<()> {
        if *self.expired.lock().unwrap() {
            return Err(RemoteError::NotAuthenticated);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn upload_segment(
        &self,
        _credentials: &Credentials,
        upload: &SegmentUpload,
    ) -> RemoteResult<()> {
        self.check_auth()?;
        assert!(upload.file_path.exists(), "uploaded file must exist");
        if let Some(limit_seq) = *self.reject_from.lock().unwrap() {
            if upload.sequence_number >= limit_seq {
                let mut storage = self.storage.lock().unwrap();
                storage.storage_used = storage.storage_limit;
                return Err(RemoteError::QuotaExceeded);
            }
        }
        self.uploads.lock().unwrap().push(upload.sequence_number);
        let mut storage = self.storage.lock().unwrap();
        storage.storage_used += self.seconds_per_upload;
        storage.video_count += 1;
        Ok(())
    }

    async fn fetch_manifest(
        &self,
        _credentials: &Credentials,
        _session_id: &str,
    ) -> RemoteResult<String> {
        self.check_auth()?;
        self.manifest.lock().unwrap().clone().ok_or(RemoteError::Server {
            status: 404,
            message: "Session not found".to_string(),
        })
    }

    async fn fetch_chunk(&self, url: &str, dest: &Path) -> RemoteResult<u64> {
        self.chunk_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.slow_chunks.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let bytes = self.chunks.lock().unwrap().get(url).cloned();
        match bytes {
            Some(bytes) => {
                std::fs::write(dest, &bytes)?;
                Ok(bytes.len() as u64)
            }
            None => Err(RemoteError::Server {
                status: 404,
                message: "File not found".to_string(),
            }),
        }
    }

    async fn fetch_storage_info(&self, _credentials: &Credentials) -> RemoteResult<StorageInfo> {
        self.check_auth()?;
        Ok(self.storage.lock().unwrap().clone())
    }

    async fn delete_session(&self, _credentials: &Credentials, session_id: &str) -> RemoteResult<()> {
        self.check_auth()?;
        self.deleted.lock().unwrap().push(session_id.to_string());
        let mut storage = self.storage.lock().unwrap();
        storage.storage_used = (storage.storage_used - 30.0).max(0.0);
        Ok(())
    }

    async fn list_sessions(&self, _credentials: &Credentials) -> RemoteResult<Vec<RemoteSession>> {
        self.check_auth()?;
        Ok(self.sessions.lock().unwrap().clone())
    }
}

/// Media toolkit working on raw bytes
///
/// Transcode copies, concat appends, probe answers from a table keyed by
/// file name (default: 15s with video).
#[derive(Default)]
pub struct FakeToolkit {
    pub probes: Mutex<HashMap<String, MediaInfo>>,
    pub slow_probes: Mutex<HashMap<String, Duration>>,
    pub fail_transcode: Mutex<bool>,
    pub concat_inputs: Mutex<Vec<PathBuf>>,
}

impl FakeToolkit {
    pub fn set_probe(&self, filename: &str, info: MediaInfo) {
        self.probes.lock().unwrap().insert(filename.to_string(), info);
    }
}

pub fn video(duration_secs: f64) -> MediaInfo {
    MediaInfo {
        has_video: true,
        has_audio: true,
        duration_secs,
        width: Some(1280),
        height: Some(720),
    }
}

pub fn audio_only(duration_secs: f64) -> MediaInfo {
    MediaInfo {
        has_video: false,
        has_audio: true,
        duration_secs,
        width: None,
        height: None,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        let name = file_name(path);
        let delay = self.slow_probes.lock().unwrap().get(&name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let info = self.probes.lock().unwrap().get(&name).cloned();
        Ok(info.unwrap_or_else(|| video(15.0)))
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _preset: CompressionPreset,
    ) -> Result<(), MediaError> {
        if *self.fail_transcode.lock().unwrap() {
            std::fs::write(output, b"half")?;
            return Err(MediaError::Ffmpeg("ffmpeg exited with 1".to_string()));
        }
        std::fs::copy(input, output)?;
        Ok(())
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        let mut joined = Vec::new();
        for input in inputs {
            joined.extend(std::fs::read(input)?);
        }
        std::fs::write(output, joined)?;
        *self.concat_inputs.lock().unwrap() = inputs.to_vec();
        Ok(())
    }
}

/// Capture device that writes a small file per target
#[derive(Clone, Default)]
pub struct FakeDevice {
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub targets: Arc<Mutex<Vec<PathBuf>>>,
    /// Sequence numbers (1-based target index) whose stop fails
    pub fail_stop: Arc<Mutex<Vec<usize>>>,
    active: Arc<Mutex<Option<PathBuf>>>,
    is_open: Arc<Mutex<bool>>,
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    fn id(&self) -> &str {
        "fake"
    }

    async fn open(&mut self, _preset: CapturePreset) -> CaptureResult<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.is_open.lock().unwrap() = true;
        Ok(())
    }

    async fn start_target(&mut self, path: &Path) -> CaptureResult<()> {
        if !*self.is_open.lock().unwrap() {
            return Err(CaptureError::NotOpen);
        }
        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            return Err(CaptureError::AlreadyCapturing);
        }
        std::fs::write(path, format!("frames for {}", file_name(path)))?;
        self.targets.lock().unwrap().push(path.to_path_buf());
        *active = Some(path.to_path_buf());
        Ok(())
    }

    async fn stop_target(&mut self) -> CaptureResult<PathBuf> {
        let path = self
            .active
            .lock()
            .unwrap()
            .take()
            .ok_or(CaptureError::NotCapturing)?;
        let index = self.targets.lock().unwrap().len();
        if self.fail_stop.lock().unwrap().contains(&index) {
            return Err(CaptureError::MissingOutput(path));
        }
        Ok(path)
    }

    fn is_capturing(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    async fn close(&mut self) -> CaptureResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        *self.is_open.lock().unwrap() = false;
        *self.active.lock().unwrap() = None;
        Ok(())
    }
}

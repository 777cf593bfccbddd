//! Reassembly of downloaded chunks into one deliverable
//!
//! A single chunk is copied through untouched. Several chunks are probed,
//! filtered down to the ones carrying video and joined with a passthrough
//! concat. The chunk directory never outlives this stage.

use crate::download::SessionChunks;
use crate::media::{MediaError, MediaInfo, MediaToolkit};
use crate::progress::{ProgressFn, RetrievalProgress};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReassemblyError {
    #[error("Chunk is missing or unreadable: {0:?}")]
    CorruptChunk(PathBuf),

    #[error("Timed out loading chunk: {0:?}")]
    ChunkLoadTimeout(PathBuf),

    #[error("No chunk contains video")]
    NoValidContent,

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Export cancelled")]
    ExportCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediaError> for ReassemblyError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Cancelled => ReassemblyError::ExportCancelled,
            MediaError::Io(e) => ReassemblyError::Io(e),
            other => ReassemblyError::ExportFailed(other.to_string()),
        }
    }
}

/// The finished, playable file for a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub session_id: String,
    pub path: PathBuf,
    /// Sum of the combined chunks' durations, when known
    pub duration_secs: Option<f64>,
    /// Chunks that made it into the file
    pub chunk_count: usize,
}

pub struct ReassemblyEngine {
    toolkit: Arc<dyn MediaToolkit>,
    load_timeout: Duration,
    output_dir: PathBuf,
}

impl ReassemblyEngine {
    pub fn new(toolkit: Arc<dyn MediaToolkit>, load_timeout: Duration, output_dir: PathBuf) -> Self {
        Self {
            toolkit,
            load_timeout,
            output_dir,
        }
    }

    /// Build the deliverable. The chunk directory is removed whatever the outcome.
    pub async fn reassemble(
        &self,
        chunks: SessionChunks,
        progress: &ProgressFn,
    ) -> Result<Deliverable, ReassemblyError> {
        let result = self.build(&chunks, progress).await;
        chunks.cleanup().await;
        match &result {
            Ok(deliverable) => tracing::info!(
                "Session {} reassembled into {:?} ({} chunks)",
                deliverable.session_id,
                deliverable.path,
                deliverable.chunk_count
            ),
            Err(e) => tracing::error!("Reassembly of {} failed: {}", chunks.session_id, e),
        }
        result
    }

    async fn build(
        &self,
        chunks: &SessionChunks,
        progress: &ProgressFn,
    ) -> Result<Deliverable, ReassemblyError> {
        for file in &chunks.files {
            let usable = matches!(tokio::fs::metadata(file).await, Ok(meta) if meta.is_file() && meta.len() > 0);
            if !usable {
                return Err(ReassemblyError::CorruptChunk(file.clone()));
            }
        }
        if chunks.files.is_empty() {
            return Err(ReassemblyError::NoValidContent);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        progress(RetrievalProgress::combining_start());

        if let [only] = chunks.files.as_slice() {
            return self.copy_single(&chunks.session_id, only, progress).await;
        }

        let probes = chunks.files.iter().map(|file| self.load(file));
        let mut valid = Vec::new();
        let mut duration = 0.0;
        for (file, probed) in chunks.files.iter().zip(join_all(probes).await) {
            let info = probed?;
            if !info.has_video {
                tracing::warn!("Skipping chunk without video: {:?}", file);
                continue;
            }
            duration += info.duration_secs;
            valid.push(file.clone());
        }
        if valid.is_empty() {
            return Err(ReassemblyError::NoValidContent);
        }

        let output = self.output_dir.join(format!("{}.mp4", chunks.session_id));
        let partial = partial_path(&output);
        progress(RetrievalProgress::combining());

        if let Err(e) = self.toolkit.concat(&valid, &partial).await {
            remove_partial(&partial).await;
            return Err(e.into());
        }

        progress(RetrievalProgress::optimizing());
        if let Err(e) = tokio::fs::rename(&partial, &output).await {
            remove_partial(&partial).await;
            return Err(e.into());
        }
        progress(RetrievalProgress::complete());

        Ok(Deliverable {
            session_id: chunks.session_id.clone(),
            path: output,
            duration_secs: Some(duration),
            chunk_count: valid.len(),
        })
    }

    /// Probe one chunk within the load timeout
    async fn load(&self, file: &Path) -> Result<MediaInfo, ReassemblyError> {
        match tokio::time::timeout(self.load_timeout, self.toolkit.probe(file)).await {
            Ok(Ok(info)) => Ok(info),
            Ok(Err(e)) => {
                tracing::warn!("Failed to load {:?}: {}", file, e);
                Err(ReassemblyError::CorruptChunk(file.to_path_buf()))
            }
            Err(_) => Err(ReassemblyError::ChunkLoadTimeout(file.to_path_buf())),
        }
    }

    async fn copy_single(
        &self,
        session_id: &str,
        file: &Path,
        progress: &ProgressFn,
    ) -> Result<Deliverable, ReassemblyError> {
        let extension = file
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "mp4".to_string());
        let output = self.output_dir.join(format!("{}.{}", session_id, extension));
        let partial = partial_path(&output);

        progress(RetrievalProgress::combining());
        if let Err(e) = tokio::fs::copy(file, &partial).await {
            remove_partial(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&partial, &output).await {
            remove_partial(&partial).await;
            return Err(e.into());
        }

        // Duration is informational here; the copy never depends on a probe
        let duration_secs = match tokio::time::timeout(self.load_timeout, self.toolkit.probe(&output)).await {
            Ok(Ok(info)) => Some(info.duration_secs),
            _ => None,
        };
        progress(RetrievalProgress::complete());

        Ok(Deliverable {
            session_id: session_id.to_string(),
            path: output,
            duration_secs,
            chunk_count: 1,
        })
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial output {:?}: {}", path, e);
        }
    }
}

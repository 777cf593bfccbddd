//! Parallel chunk download
//!
//! Fans out one fetch per manifest entry, bounded by a semaphore, then waits
//! for all of them. The result is all-or-nothing: one failed chunk fails the
//! whole download and removes the session's chunk directory.

use crate::manifest::Manifest;
use crate::progress::{ProgressFn, RetrievalProgress};
use crate::remote::{RemoteError, RemoteStore};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to download {filename}: {source}")]
    Chunk {
        filename: String,
        #[source]
        source: RemoteError,
    },

    #[error("Timed out downloading {filename}")]
    ChunkTimeout { filename: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub max_concurrent: usize,
    /// `None` leaves stalls to the transport's own timeouts
    pub chunk_timeout: Option<Duration>,
    pub work_dir: PathBuf,
}

/// Downloaded chunk files of one session, in manifest order
#[derive(Debug, Clone)]
pub struct SessionChunks {
    pub session_id: String,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

impl SessionChunks {
    /// Remove the chunk directory
    pub async fn cleanup(&self) {
        remove_dir(&self.dir).await;
    }
}

async fn remove_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove {:?}: {}", dir, e);
        }
    }
}

/// Chunk directory of a session under `work_dir`
pub fn session_dir(work_dir: &Path, session_id: &str) -> PathBuf {
    work_dir.join(format!("{}.chunks", session_id))
}

pub struct DownloadEngine {
    remote: Arc<dyn RemoteStore>,
    config: DownloadConfig,
}

impl DownloadEngine {
    pub fn new(remote: Arc<dyn RemoteStore>, config: DownloadConfig) -> Self {
        Self { remote, config }
    }

    pub async fn download(
        &self,
        manifest: &Manifest,
        progress: &ProgressFn,
    ) -> Result<SessionChunks, DownloadError> {
        let dir = session_dir(&self.config.work_dir, &manifest.session_id);
        remove_dir(&dir).await;
        tokio::fs::create_dir_all(&dir).await?;

        // One slot per manifest index, fixed before any fetch starts
        let destinations: Vec<PathBuf> = manifest
            .chunks
            .iter()
            .map(|c| dir.join(&c.filename))
            .collect();

        let total = manifest.len();
        let completed = AtomicUsize::new(0);
        let semaphore = Semaphore::new(self.config.max_concurrent.max(1));
        progress(RetrievalProgress::downloading(0, total));

        tracing::info!(
            "Downloading {} chunks of {} ({} at a time)",
            total,
            manifest.session_id,
            self.config.max_concurrent
        );

        let fetches = manifest.chunks.iter().zip(&destinations).map(|(chunk, dest)| {
            let semaphore = &semaphore;
            let completed = &completed;
            let dir = &dir;
            async move {
                let _permit = semaphore.acquire().await.map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::Other, "download semaphore closed")
                })?;
                let bytes = self
                    .fetch_one(chunk.remote_location.as_str(), &chunk.filename, dir, dest)
                    .await?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!("Chunk {} done ({} bytes, {}/{})", chunk.filename, bytes, done, total);
                progress(RetrievalProgress::downloading(done, total));
                Ok::<(), DownloadError>(())
            }
        });

        let results = join_all(fetches).await;
        if let Some(err) = results.into_iter().find_map(Result::err) {
            tracing::error!("Download of {} failed: {}", manifest.session_id, err);
            remove_dir(&dir).await;
            return Err(err);
        }

        Ok(SessionChunks {
            session_id: manifest.session_id.clone(),
            dir,
            files: destinations,
        })
    }

    /// Fetch into a temp file in `dir`, then rename onto `dest`
    async fn fetch_one(
        &self,
        url: &str,
        filename: &str,
        dir: &Path,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        let temp = tempfile::Builder::new()
            .prefix(".fetch-")
            .suffix(".part")
            .tempfile_in(dir)?;

        let fetch = self.remote.fetch_chunk(url, temp.path());
        let result = match self.config.chunk_timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(DownloadError::ChunkTimeout {
                        filename: filename.to_string(),
                    })
                }
            },
            None => fetch.await,
        };
        let bytes = result.map_err(|source| DownloadError::Chunk {
            filename: filename.to_string(),
            source,
        })?;

        temp.persist(dest).map_err(|e| DownloadError::Io(e.error))?;
        Ok(bytes)
    }
}

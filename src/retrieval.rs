//! Session retrieval
//!
//! Manifest, parallel download and reassembly chained into one call, plus
//! the remote and local housekeeping around finished sessions.

use crate::account::AccountService;
use crate::download::{DownloadEngine, DownloadError};
use crate::manifest::ManifestClient;
use crate::progress::{ProgressFn, RetrievalProgress};
use crate::quota::QuotaTracker;
use crate::reassembly::{Deliverable, ReassemblyEngine, ReassemblyError};
use crate::remote::{RemoteError, RemoteSession, RemoteStore};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct RetrievalService {
    remote: Arc<dyn RemoteStore>,
    account: Arc<dyn AccountService>,
    quota: Arc<QuotaTracker>,
    manifests: ManifestClient,
    downloads: DownloadEngine,
    reassembly: ReassemblyEngine,
    library_dir: PathBuf,
}

impl RetrievalService {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        account: Arc<dyn AccountService>,
        quota: Arc<QuotaTracker>,
        downloads: DownloadEngine,
        reassembly: ReassemblyEngine,
        library_dir: PathBuf,
    ) -> Self {
        Self {
            manifests: ManifestClient::new(remote.clone(), account.clone()),
            remote,
            account,
            quota,
            downloads,
            reassembly,
            library_dir,
        }
    }

    /// Fetch a session and turn it into one playable file
    pub async fn retrieve(
        &self,
        session_id: &str,
        progress: &ProgressFn,
    ) -> Result<Deliverable, RetrievalError> {
        tracing::info!("Retrieving session {}", session_id);
        let manifest = self.manifests.fetch_manifest(session_id).await?;
        progress(RetrievalProgress::manifest());

        let chunks = self.downloads.download(&manifest, progress).await?;
        Ok(self.reassembly.reassemble(chunks, progress).await?)
    }

    /// Sessions stored on the server for this account
    pub async fn list_remote(&self) -> Result<Vec<RemoteSession>, RetrievalError> {
        let credentials = self.account.credentials().ok_or(RemoteError::NotAuthenticated)?;
        match self.remote.list_sessions(&credentials).await {
            Ok(sessions) => Ok(sessions),
            Err(RemoteError::NotAuthenticated) => {
                self.account.invalidate();
                Err(RemoteError::NotAuthenticated.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a session on the server, then pick up the freed quota
    pub async fn delete_remote(&self, session_id: &str) -> Result<(), RetrievalError> {
        let credentials = self.account.credentials().ok_or(RemoteError::NotAuthenticated)?;
        match self.remote.delete_session(&credentials, session_id).await {
            Ok(()) => {}
            Err(RemoteError::NotAuthenticated) => {
                self.account.invalidate();
                return Err(RemoteError::NotAuthenticated.into());
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!("Deleted remote session {}", session_id);

        if let Err(e) = self.quota.refresh().await {
            tracing::debug!("Quota refresh after delete failed: {}", e);
        }
        Ok(())
    }

    /// Existing local deliverable for a session
    pub async fn deliverable_path(&self, session_id: &str) -> Result<Option<PathBuf>, RetrievalError> {
        let mut entries = match tokio::fs::read_dir(&self.library_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_partial = path.extension().is_some_and(|e| e == "partial");
            if !is_partial && path.file_stem().is_some_and(|s| s == session_id) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Remove a local deliverable. Returns whether anything was deleted.
    pub async fn delete_local(&self, session_id: &str) -> Result<bool, RetrievalError> {
        match self.deliverable_path(session_id).await? {
            Some(path) => {
                tokio::fs::remove_file(&path).await?;
                tracing::info!("Deleted local deliverable {:?}", path);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

//! Segment upload
//!
//! Sends one compressed segment and applies the outcome to local state:
//!
//! | server answer | local files | quota        | result             |
//! |---------------|-------------|--------------|--------------------|
//! | 200           | deleted     | refreshed    | `Ok`               |
//! | 401           | kept        | untouched    | `NotAuthenticated` |
//! | 413           | kept        | refreshed    | `QuotaExceeded`    |
//! | anything else | kept        | untouched    | the error          |
//!
//! Nothing is retried.

use crate::account::AccountService;
use crate::quota::QuotaTracker;
use crate::remote::{RemoteError, RemoteResult, RemoteStore, SegmentUpload};
use crate::tier::Tier;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A compressed segment and the original it was made from
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub session_id: String,
    pub sequence_number: u64,
    pub tier: Tier,
    pub compressed_path: PathBuf,
    pub original_path: PathBuf,
}

pub struct UploadClient {
    remote: Arc<dyn RemoteStore>,
    account: Arc<dyn AccountService>,
    quota: Arc<QuotaTracker>,
}

impl UploadClient {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        account: Arc<dyn AccountService>,
        quota: Arc<QuotaTracker>,
    ) -> Self {
        Self {
            remote,
            account,
            quota,
        }
    }

    pub async fn upload(&self, request: &UploadRequest) -> RemoteResult<()> {
        let credentials = self.account.credentials().ok_or(RemoteError::NotAuthenticated)?;
        let upload = SegmentUpload {
            session_id: request.session_id.clone(),
            sequence_number: request.sequence_number,
            tier: request.tier,
            file_path: request.compressed_path.clone(),
        };

        match self.remote.upload_segment(&credentials, &upload).await {
            Ok(()) => {
                tracing::info!(
                    "Uploaded segment {} of session {}",
                    request.sequence_number,
                    request.session_id
                );
                remove_local(&request.compressed_path).await;
                remove_local(&request.original_path).await;
                self.refresh_quota().await;
                Ok(())
            }
            Err(RemoteError::NotAuthenticated) => {
                tracing::warn!("Upload rejected: session expired");
                self.account.invalidate();
                Err(RemoteError::NotAuthenticated)
            }
            Err(RemoteError::QuotaExceeded) => {
                tracing::warn!(
                    "Upload of segment {} rejected: storage quota exceeded",
                    request.sequence_number
                );
                self.refresh_quota().await;
                Err(RemoteError::QuotaExceeded)
            }
            Err(e) => {
                tracing::error!(
                    "Upload of segment {} failed: {}",
                    request.sequence_number,
                    e
                );
                Err(e)
            }
        }
    }

    async fn refresh_quota(&self) {
        if let Err(e) = self.quota.refresh().await {
            tracing::debug!("Quota refresh after upload failed: {}", e);
        }
    }
}

async fn remove_local(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove {:?}: {}", path, e);
        }
    }
}

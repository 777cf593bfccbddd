//! Remote store access
//!
//! The remote store owns uploaded segments and the authoritative quota. The
//! `RemoteStore` trait is the seam every client component talks through;
//! `HttpRemoteStore` is the production implementation.

pub mod http;
pub mod types;

use crate::account::Credentials;
use async_trait::async_trait;
use std::path::Path;

pub use http::HttpRemoteStore;
pub use types::{RemoteError, RemoteResult, RemoteSession, SegmentUpload, StorageInfo};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Send one compressed segment
    async fn upload_segment(&self, credentials: &Credentials, upload: &SegmentUpload)
        -> RemoteResult<()>;

    /// Raw manifest body for a session; validated by the manifest client
    async fn fetch_manifest(&self, credentials: &Credentials, session_id: &str)
        -> RemoteResult<String>;

    /// Download one chunk body into `dest`, returning the byte count
    async fn fetch_chunk(&self, url: &str, dest: &Path) -> RemoteResult<u64>;

    async fn fetch_storage_info(&self, credentials: &Credentials) -> RemoteResult<StorageInfo>;

    async fn delete_session(&self, credentials: &Credentials, session_id: &str) -> RemoteResult<()>;

    async fn list_sessions(&self, credentials: &Credentials) -> RemoteResult<Vec<RemoteSession>>;
}

//! HTTP implementation of the remote store

use super::types::{
    AuthBody, RemoteError, RemoteResult, RemoteSession, SegmentUpload, SessionList, StorageInfo,
};
use super::RemoteStore;
use crate::account::Credentials;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Remote store reached over HTTP
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str) -> RemoteResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_auth(
        &self,
        path: &str,
        credentials: &Credentials,
        session_id: Option<&str>,
    ) -> RemoteResult<Response> {
        let body = AuthBody {
            email: &credentials.account,
            password: &credentials.credential,
            session_id,
        };
        let response = self.client.post(self.endpoint(path)).json(&body).send().await?;
        check_status(response).await
    }
}

/// Map the status matrix onto `RemoteError`
async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        401 => Err(RemoteError::NotAuthenticated),
        413 => Err(RemoteError::QuotaExceeded),
        code => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(body);
            Err(RemoteError::Server {
                status: code,
                message,
            })
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upload_segment(
        &self,
        credentials: &Credentials,
        upload: &SegmentUpload,
    ) -> RemoteResult<()> {
        let bytes = tokio::fs::read(&upload.file_path).await?;
        let file_name = upload
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("chunk_{:03}.mp4", upload.sequence_number));

        tracing::debug!(
            "Uploading segment {} of session {} ({} bytes)",
            upload.sequence_number,
            upload.session_id,
            bytes.len()
        );

        let video = Part::bytes(bytes).file_name(file_name).mime_str("video/mp4")?;
        let form = Form::new()
            .text("email", credentials.account.clone())
            .text("password", credentials.credential.clone())
            .text("tier", upload.tier.as_str())
            .text("session_id", upload.session_id.clone())
            .text("chunk_number", upload.sequence_number.to_string())
            .part("video", video);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        // Only 200 means stored; the caller deletes local files on Ok
        let response = check_status(response).await?;
        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn fetch_manifest(
        &self,
        credentials: &Credentials,
        session_id: &str,
    ) -> RemoteResult<String> {
        let path = format!("download/{}", urlencoding::encode(session_id));
        let response = self.post_auth(&path, credentials, None).await?;
        Ok(response.text().await?)
    }

    async fn fetch_chunk(&self, url: &str, dest: &Path) -> RemoteResult<u64> {
        let mut response = check_status(self.client.get(url).send().await?).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(bytes) = response.chunk().await? {
            file.write_all(&bytes).await?;
            written += bytes.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }

    async fn fetch_storage_info(&self, credentials: &Credentials) -> RemoteResult<StorageInfo> {
        let response = self.post_auth("storage_info", credentials, None).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| RemoteError::InvalidResponse(format!("storage info: {}", e)))
    }

    async fn delete_session(&self, credentials: &Credentials, session_id: &str) -> RemoteResult<()> {
        self.post_auth("delete", credentials, Some(session_id)).await?;
        Ok(())
    }

    async fn list_sessions(&self, credentials: &Credentials) -> RemoteResult<Vec<RemoteSession>> {
        let response = self.post_auth("videos", credentials, None).await?;
        let body = response.text().await?;
        let list: SessionList = serde_json::from_str(&body)
            .map_err(|e| RemoteError::InvalidResponse(format!("session list: {}", e)))?;
        Ok(list.videos)
    }
}

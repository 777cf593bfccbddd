//! Session manifest
//!
//! The server lists the chunks of a session as `{filename, download_url,
//! order}` entries. Every entry is validated and the list is re-sorted by
//! `order` here; nothing downstream trusts server ordering.

use crate::account::AccountService;
use crate::remote::{RemoteError, RemoteResult, RemoteStore};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;

/// One validated chunk location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
    pub filename: String,
    pub remote_location: Url,
    pub order: i64,
}

/// Validated, order-sorted chunk list of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub session_id: String,
    pub chunks: Vec<ChunkRef>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    chunks: Vec<RawChunk>,
    #[serde(default)]
    total_chunks: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    filename: Option<String>,
    download_url: Option<String>,
    order: Option<serde_json::Value>,
}

fn malformed(message: impl Into<String>) -> RemoteError {
    RemoteError::MalformedManifest(message.into())
}

fn validate_chunk(index: usize, raw: RawChunk) -> RemoteResult<ChunkRef> {
    let filename = raw
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| malformed(format!("entry {} has no filename", index)))?;
    if filename.contains('/') || filename.contains('\\') || filename == "." || filename == ".." {
        return Err(malformed(format!("filename {:?} is not a plain file name", filename)));
    }

    let location = raw
        .download_url
        .ok_or_else(|| malformed(format!("{} has no download_url", filename)))?;
    let remote_location = Url::parse(&location)
        .map_err(|e| malformed(format!("{} has invalid download_url {:?}: {}", filename, location, e)))?;
    if remote_location.cannot_be_a_base() {
        return Err(malformed(format!("{} download_url is not absolute", filename)));
    }

    let order = raw
        .order
        .as_ref()
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| malformed(format!("{} has no integer order", filename)))?;

    Ok(ChunkRef {
        filename,
        remote_location,
        order,
    })
}

/// Parse and validate a manifest body
pub fn parse_manifest(session_id: &str, body: &str) -> RemoteResult<Manifest> {
    let raw: RawManifest =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    if raw.chunks.is_empty() {
        return Err(malformed("manifest lists no chunks"));
    }
    if let Some(total) = raw.total_chunks {
        if total != raw.chunks.len() as u64 {
            tracing::warn!(
                "Manifest for {} claims {} chunks but lists {}",
                session_id,
                total,
                raw.chunks.len()
            );
        }
    }

    let mut chunks = raw
        .chunks
        .into_iter()
        .enumerate()
        .map(|(i, c)| validate_chunk(i, c))
        .collect::<RemoteResult<Vec<_>>>()?;
    chunks.sort_by_key(|c| c.order);

    // 0-based or 1-based, dense from there
    let first = chunks[0].order;
    if first != 0 && first != 1 {
        return Err(malformed(format!("orders must start at 0 or 1, found {}", first)));
    }
    for pair in chunks.windows(2) {
        let (prev, chunk) = (&pair[0], &pair[1]);
        if chunk.order == prev.order {
            return Err(malformed(format!("duplicate order {}", chunk.order)));
        }
        let expected = prev
            .order
            .checked_add(1)
            .ok_or_else(|| malformed(format!("order {} out of range", prev.order)))?;
        if chunk.order != expected {
            return Err(malformed(format!(
                "gap before order {} (expected {})",
                chunk.order, expected
            )));
        }
    }

    let mut names: Vec<&str> = chunks.iter().map(|c| c.filename.as_str()).collect();
    names.sort_unstable();
    if names.windows(2).any(|w| w[0] == w[1]) {
        return Err(malformed("duplicate filename"));
    }

    Ok(Manifest {
        session_id: session_id.to_string(),
        chunks,
    })
}

/// Fetches and validates session manifests
pub struct ManifestClient {
    remote: Arc<dyn RemoteStore>,
    account: Arc<dyn AccountService>,
}

impl ManifestClient {
    pub fn new(remote: Arc<dyn RemoteStore>, account: Arc<dyn AccountService>) -> Self {
        Self { remote, account }
    }

    pub async fn fetch_manifest(&self, session_id: &str) -> RemoteResult<Manifest> {
        let credentials = self.account.credentials().ok_or(RemoteError::NotAuthenticated)?;
        let body = match self.remote.fetch_manifest(&credentials, session_id).await {
            Ok(body) => body,
            Err(RemoteError::NotAuthenticated) => {
                self.account.invalidate();
                return Err(RemoteError::NotAuthenticated);
            }
            Err(e) => return Err(e),
        };

        let manifest = parse_manifest(session_id, &body)?;
        tracing::info!("Manifest for {}: {} chunks", session_id, manifest.len());
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(entries: &str) -> String {
        format!(r#"{{"session_id":"s1","total_chunks":2,"chunks":[{}]}}"#, entries)
    }

    #[test]
    fn test_sorted_by_order() {
        let manifest = parse_manifest(
            "s1",
            &body(
                r#"{"filename":"b.mov","download_url":"http://h/b","order":2},
                   {"filename":"a.mov","download_url":"http://h/a","order":1}"#,
            ),
        )
        .unwrap();
        let names: Vec<_> = manifest.chunks.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["a.mov", "b.mov"]);
        assert_eq!(manifest.chunks[0].remote_location.as_str(), "http://h/a");
    }

    #[test]
    fn test_zero_based_orders_accepted() {
        let manifest = parse_manifest(
            "s1",
            &body(
                r#"{"filename":"c1.mov","download_url":"http://h/1","order":0},
                   {"filename":"c2.mov","download_url":"http://h/2","order":1}"#,
            ),
        )
        .unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_missing_order_rejected() {
        let err = parse_manifest(
            "s1",
            &body(
                r#"{"filename":"c1.mov","download_url":"http://h/1","order":0},
                   {"filename":"c2.mov","download_url":"http://h/2"}"#,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, RemoteError::MalformedManifest(msg) if msg.contains("c2.mov")));
    }

    #[test]
    fn test_non_integer_order_rejected() {
        let result = parse_manifest(
            "s1",
            &body(r#"{"filename":"c1.mov","download_url":"http://h/1","order":"1"}"#),
        );
        assert!(matches!(result, Err(RemoteError::MalformedManifest(_))));
    }

    #[test]
    fn test_duplicate_and_gap_rejected() {
        let dup = parse_manifest(
            "s1",
            &body(
                r#"{"filename":"a.mov","download_url":"http://h/a","order":1},
                   {"filename":"b.mov","download_url":"http://h/b","order":1}"#,
            ),
        );
        assert!(matches!(dup, Err(RemoteError::MalformedManifest(msg)) if msg.contains("duplicate")));

        let gap = parse_manifest(
            "s1",
            &body(
                r#"{"filename":"a.mov","download_url":"http://h/a","order":1},
                   {"filename":"b.mov","download_url":"http://h/b","order":3}"#,
            ),
        );
        assert!(matches!(gap, Err(RemoteError::MalformedManifest(msg)) if msg.contains("gap")));
    }

    #[test]
    fn test_leading_gap_rejected() {
        let late = parse_manifest(
            "s1",
            &body(
                r#"{"filename":"c5.mov","download_url":"http://h/5","order":5},
                   {"filename":"c6.mov","download_url":"http://h/6","order":6}"#,
            ),
        );
        assert!(matches!(late, Err(RemoteError::MalformedManifest(msg)) if msg.contains("start at 0 or 1")));

        let negative = parse_manifest(
            "s1",
            &body(
                r#"{"filename":"a.mov","download_url":"http://h/a","order":-1},
                   {"filename":"b.mov","download_url":"http://h/b","order":0}"#,
            ),
        );
        assert!(matches!(negative, Err(RemoteError::MalformedManifest(_))));
    }

    #[test]
    fn test_extreme_orders_rejected_without_overflow() {
        let max = parse_manifest(
            "s1",
            &format!(
                r#"{{"chunks":[{{"filename":"a.mov","download_url":"http://h/a","order":{max}}},
                              {{"filename":"b.mov","download_url":"http://h/b","order":{max}}}]}}"#,
                max = i64::MAX
            ),
        );
        assert!(matches!(max, Err(RemoteError::MalformedManifest(_))));

        let tail = parse_manifest(
            "s1",
            &format!(
                r#"{{"chunks":[{{"filename":"a.mov","download_url":"http://h/a","order":1}},
                              {{"filename":"b.mov","download_url":"http://h/b","order":{max}}}]}}"#,
                max = i64::MAX
            ),
        );
        assert!(matches!(tail, Err(RemoteError::MalformedManifest(msg)) if msg.contains("gap")));
    }

    #[test]
    fn test_empty_and_unsafe_entries_rejected() {
        assert!(parse_manifest("s1", r#"{"chunks":[]}"#).is_err());
        assert!(parse_manifest(
            "s1",
            &body(r#"{"filename":"../x.mov","download_url":"http://h/x","order":1}"#)
        )
        .is_err());
        assert!(parse_manifest(
            "s1",
            &body(r#"{"filename":"x.mov","download_url":"/relative/x","order":1}"#)
        )
        .is_err());
    }
}

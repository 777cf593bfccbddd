//! Recording commands

use crate::app::{App, RecordingHandle};
use crate::recorder::{RecordingSession, Segment};
use crate::remote::RemoteError;
use crate::tier::Tier;
use crate::utils::AppResult;
use std::time::Duration;

/// Outcome of one recording run
#[derive(Debug, Clone)]
pub struct RecordingReport {
    pub session: RecordingSession,
    pub segments: Vec<Segment>,
}

/// Record from the configured camera until `duration` elapses or Ctrl-C.
///
/// Without an explicit tier the account's tier as reported by the server is used.
pub async fn record(
    app: &App,
    tier: Option<Tier>,
    duration: Option<Duration>,
) -> AppResult<RecordingReport> {
    match app.quota.refresh().await {
        Ok(_) => {}
        Err(RemoteError::NotAuthenticated) => return Err(RemoteError::NotAuthenticated.into()),
        Err(e) => tracing::warn!("Using cached quota: {}", e),
    }
    let tier = tier.unwrap_or_else(|| app.quota.tier());
    tracing::info!("Recording with {} tier", tier);

    let handle = app.camera_recorder();
    record_with(app, handle, tier, wait_for_stop(duration)).await
}

async fn wait_for_stop(duration: Option<Duration>) {
    match duration {
        Some(limit) => {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

/// Run one session on `handle`, stopping when `stop` resolves
pub async fn record_with(
    app: &App,
    mut handle: RecordingHandle,
    tier: Tier,
    stop: impl std::future::Future<Output = ()>,
) -> AppResult<RecordingReport> {
    let session = handle.recorder.start(tier).await?;
    stop.await;

    let stopped = handle.recorder.stop().await;
    handle.finish().await;
    let session = stopped?.unwrap_or(session);

    // The pipeline has drained, nothing else will touch this session
    let segments = app.pipeline.take_statuses(&session.session_id);
    Ok(RecordingReport { session, segments })
}

//! Retrieval commands

use crate::app::App;
use crate::progress::RetrievalProgress;
use crate::reassembly::Deliverable;
use crate::remote::RemoteSession;
use crate::utils::AppResult;

/// Download and reassemble a session, logging progress
pub async fn download(app: &App, session_id: &str) -> AppResult<Deliverable> {
    let report = |progress: RetrievalProgress| {
        tracing::info!("{:>3.0}% {:?}", progress.fraction * 100.0, progress.stage);
    };
    Ok(app.retrieval.retrieve(session_id, &report).await?)
}

pub async fn list(app: &App) -> AppResult<Vec<RemoteSession>> {
    Ok(app.retrieval.list_remote().await?)
}

/// Delete a session remotely and, when asked, its local deliverable too
pub async fn delete(app: &App, session_id: &str, local: bool) -> AppResult<()> {
    app.retrieval.delete_remote(session_id).await?;
    if local && !app.retrieval.delete_local(session_id).await? {
        tracing::debug!("No local deliverable for {}", session_id);
    }
    Ok(())
}

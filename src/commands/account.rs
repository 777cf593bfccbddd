//! Account commands

use crate::app::App;
use crate::quota::QuotaSnapshot;
use crate::utils::AppResult;

/// Current storage usage, straight from the server
pub async fn quota(app: &App) -> AppResult<QuotaSnapshot> {
    Ok(app.quota.refresh().await?)
}

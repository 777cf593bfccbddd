//! Storage quota tracking
//!
//! The remote store is authoritative for how many seconds of video an account
//! holds. The tracker caches the last snapshot it saw so recording can be gated
//! without a round trip, and re-fetches after anything that changes usage.

use crate::account::AccountService;
use crate::remote::{RemoteError, RemoteResult, RemoteStore, StorageInfo};
use crate::tier::Tier;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Cached (used, limit) storage pair, in seconds of video
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    pub used_seconds: f64,
    pub limit_seconds: f64,
    pub video_count: u64,
}

impl QuotaSnapshot {
    /// Starting point before the server has been asked
    pub fn for_tier(tier: Tier) -> Self {
        Self {
            used_seconds: 0.0,
            limit_seconds: tier.storage_limit_seconds(),
            video_count: 0,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.used_seconds < self.limit_seconds
    }

    pub fn remaining_seconds(&self) -> f64 {
        (self.limit_seconds - self.used_seconds).max(0.0)
    }

    /// Usage percentage, capped at 100
    pub fn percentage(&self) -> f64 {
        if self.limit_seconds > 0.0 {
            (self.used_seconds / self.limit_seconds * 100.0).min(100.0)
        } else {
            0.0
        }
    }
}

impl From<StorageInfo> for QuotaSnapshot {
    fn from(info: StorageInfo) -> Self {
        Self {
            used_seconds: info.storage_used,
            limit_seconds: info.storage_limit,
            video_count: info.video_count,
        }
    }
}

/// Holds the account's quota snapshot and refreshes it from the remote store
pub struct QuotaTracker {
    remote: Arc<dyn RemoteStore>,
    account: Arc<dyn AccountService>,
    snapshot: RwLock<QuotaSnapshot>,
    /// Tier the server reports for the account, `Free` until it answers
    tier: RwLock<Tier>,
    /// Serializes refreshes so overlapping calls never lose an update
    refresh_lock: Mutex<()>,
    watch_tx: watch::Sender<QuotaSnapshot>,
}

impl QuotaTracker {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        account: Arc<dyn AccountService>,
        initial: QuotaSnapshot,
    ) -> Self {
        let (watch_tx, _) = watch::channel(initial);
        Self {
            remote,
            account,
            snapshot: RwLock::new(initial),
            tier: RwLock::new(Tier::Free),
            refresh_lock: Mutex::new(()),
            watch_tx,
        }
    }

    /// Last known snapshot
    pub fn snapshot(&self) -> QuotaSnapshot {
        *self.snapshot.read()
    }

    /// Account tier from the last successful refresh
    pub fn tier(&self) -> Tier {
        *self.tier.read()
    }

    /// True iff used < limit in the cached snapshot
    pub fn check_capacity(&self) -> bool {
        self.snapshot.read().has_capacity()
    }

    /// Observe snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<QuotaSnapshot> {
        self.watch_tx.subscribe()
    }

    /// Re-fetch the snapshot from the remote store.
    ///
    /// On failure the cached snapshot is left untouched.
    pub async fn refresh(&self) -> RemoteResult<QuotaSnapshot> {
        let _guard = self.refresh_lock.lock().await;

        let credentials = self.account.credentials().ok_or(RemoteError::NotAuthenticated)?;
        let info = match self.remote.fetch_storage_info(&credentials).await {
            Ok(info) => info,
            Err(RemoteError::NotAuthenticated) => {
                self.account.invalidate();
                return Err(RemoteError::NotAuthenticated);
            }
            Err(e) => {
                tracing::warn!("Quota refresh failed, keeping last snapshot: {}", e);
                return Err(e);
            }
        };

        if let Some(name) = info.subscription_tier.as_deref() {
            *self.tier.write() = Tier::from_wire(name);
        }
        let snapshot = QuotaSnapshot::from(info);
        *self.snapshot.write() = snapshot;
        self.watch_tx.send_replace(snapshot);

        tracing::debug!(
            "Quota refreshed: {:.0}s / {:.0}s ({:.1}%)",
            snapshot.used_seconds,
            snapshot.limit_seconds,
            snapshot.percentage()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_boundary() {
        let mut snapshot = QuotaSnapshot::for_tier(Tier::Free);
        assert!(snapshot.has_capacity());

        snapshot.used_seconds = 1185.0;
        assert!(snapshot.has_capacity());

        snapshot.used_seconds = 1200.0;
        assert!(!snapshot.has_capacity());

        snapshot.used_seconds = 1215.0;
        assert!(!snapshot.has_capacity());
        assert_eq!(snapshot.remaining_seconds(), 0.0);
        assert_eq!(snapshot.percentage(), 100.0);
    }

    #[test]
    fn test_percentage() {
        let snapshot = QuotaSnapshot {
            used_seconds: 300.0,
            limit_seconds: 1200.0,
            video_count: 2,
        };
        assert_eq!(snapshot.percentage(), 25.0);
        assert_eq!(snapshot.remaining_seconds(), 900.0);
    }

    #[test]
    fn test_zero_limit_has_no_capacity() {
        let snapshot = QuotaSnapshot {
            used_seconds: 0.0,
            limit_seconds: 0.0,
            video_count: 0,
        };
        assert!(!snapshot.has_capacity());
        assert_eq!(snapshot.percentage(), 0.0);
    }
}

//! Retrieval progress reporting
//!
//! Progress is advisory: callbacks observe it, nothing branches on it.

use serde::{Deserialize, Serialize};

/// Retrieval stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RetrievalStage {
    /// Manifest fetched and validated
    Manifest,
    /// Fetching chunks
    Downloading { completed: usize, total: usize },
    /// Starting to combine chunks
    CombiningStart,
    /// Combining chunks into one file
    Combining,
    /// Rewriting for progressive playback
    Optimizing,
    Complete,
}

/// Retrieval progress information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalProgress {
    /// Overall fraction done (0.0 to 1.0)
    pub fraction: f64,
    pub stage: RetrievalStage,
}

impl RetrievalProgress {
    pub fn manifest() -> Self {
        Self {
            fraction: 0.1,
            stage: RetrievalStage::Manifest,
        }
    }

    pub fn downloading(completed: usize, total: usize) -> Self {
        let fraction = if total > 0 {
            0.2 + 0.6 * completed as f64 / total as f64
        } else {
            0.2
        };
        Self {
            fraction,
            stage: RetrievalStage::Downloading { completed, total },
        }
    }

    pub fn combining_start() -> Self {
        Self {
            fraction: 0.8,
            stage: RetrievalStage::CombiningStart,
        }
    }

    pub fn combining() -> Self {
        Self {
            fraction: 0.9,
            stage: RetrievalStage::Combining,
        }
    }

    pub fn optimizing() -> Self {
        Self {
            fraction: 0.95,
            stage: RetrievalStage::Optimizing,
        }
    }

    pub fn complete() -> Self {
        Self {
            fraction: 1.0,
            stage: RetrievalStage::Complete,
        }
    }
}

/// Progress sink shared by the download and reassembly stages
pub type ProgressFn = dyn Fn(RetrievalProgress) + Send + Sync;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_fraction_range() {
        assert!((RetrievalProgress::downloading(0, 4).fraction - 0.2).abs() < 1e-9);
        assert!((RetrievalProgress::downloading(2, 4).fraction - 0.5).abs() < 1e-9);
        assert!((RetrievalProgress::downloading(4, 4).fraction - 0.8).abs() < 1e-9);
    }
}

//! Secure Camera - segmented camera recording backed by a remote vault.
//!
//! Recording splits the camera stream into fixed-length segments that are
//! compressed and uploaded while the next one records. Retrieval pulls a
//! session's chunks back in parallel and reassembles them into one file.

pub mod account;
pub mod app;
pub mod capture;
pub mod commands;
pub mod compression;
pub mod config;
pub mod download;
pub mod manifest;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod quota;
pub mod reassembly;
pub mod recorder;
pub mod remote;
pub mod retrieval;
pub mod tier;
pub mod upload;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secure_camera=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

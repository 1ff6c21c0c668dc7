//! DualCam - dual-camera capture core.
//!
//! Opens two device cameras side by side and produces combined still
//! photos and combined recordings, retained in a bounded media registry
//! with metadata-only persistence. This crate is the backend a capture
//! UI binds to; layout, overlays, gallery browsing and permission-prompt
//! UX belong to the embedding shell.

pub mod app;
pub mod capture;
pub mod media;
pub mod recorder;
pub mod registry;
pub mod utils;

pub use app::{CameraSlot, DualCamApp};
pub use utils::error::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for an embedding shell.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dualcam=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("dualcam v{}", env!("CARGO_PKG_VERSION"));
}

//! Download engine abstraction.
//!
//! This module provides the `TorrentEngine` and `TorrentHandle` traits that
//! sit between the orchestration layer and a BitTorrent implementation. The
//! wire protocol, piece selection and disk I/O all live behind this boundary.

mod descriptor;
mod rqbit;
mod types;

use std::sync::Arc;

use tracing::info;

pub use descriptor::{parse_descriptor, parse_magnet, DescriptorFile, MagnetLink, TorrentDescriptor};
pub use rqbit::{LibrqbitEngine, LibrqbitHandle};
pub use types::*;

use crate::config::{EngineBackend, EngineConfig};
use crate::testing::MockEngine;

/// Build the engine selected in configuration.
pub async fn create_engine(config: &EngineConfig) -> Result<Arc<dyn TorrentEngine>, EngineError> {
    let engine: Arc<dyn TorrentEngine> = match config.backend {
        EngineBackend::Librqbit => Arc::new(LibrqbitEngine::new(config).await?),
        EngineBackend::Mock => Arc::new(MockEngine::with_save_path(
            config.resolved_download_path().display().to_string(),
        )),
    };
    info!(backend = engine.name(), "Download engine ready");
    Ok(engine)
}

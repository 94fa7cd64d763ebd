use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use tamer_core::{
    create_engine, load_config, load_config_or_default, registry::RegistryError,
    validate_config, AddOptions, BackupManager, Config, StatsTracker, TorrentRegistry,
};

const DEFAULT_CONFIG: &str = "tamer.toml";

/// Everything a command needs: configuration and a populated registry.
pub struct App {
    pub config: Config,
    pub registry: Arc<TorrentRegistry>,
}

impl App {
    /// Load configuration, build the engine and add the configured torrents.
    pub async fn build(config_path: Option<PathBuf>) -> Result<Self> {
        let config = read_config(config_path)?;
        validate_config(&config).context("Configuration validation failed")?;

        let engine = create_engine(&config.engine)
            .await
            .context("Failed to start download engine")?;
        let registry = Arc::new(TorrentRegistry::new(
            engine,
            config.engine.resolved_download_path(),
            config.engine.auto_start,
        ));

        let app = Self { config, registry };
        app.add_configured_torrents().await;
        Ok(app)
    }

    /// Configured torrents are added in order on every start so their ids
    /// stay stable between invocations.
    async fn add_configured_torrents(&self) {
        for entry in &self.config.torrents {
            let options = AddOptions::default()
                .with_priority(entry.priority)
                .with_sequential(entry.sequential);
            match self.registry.add_with(&entry.source, options).await {
                Ok(id) => debug!(torrent_id = id, source = %entry.source, "Configured torrent added"),
                Err(RegistryError::Duplicate(id)) => {
                    debug!(torrent_id = id, source = %entry.source, "Configured torrent listed twice")
                }
                Err(e) => warn!(source = %entry.source, error = %e, "Failed to add configured torrent"),
            }
        }
    }

    pub fn stats(&self) -> StatsTracker {
        StatsTracker::new(self.registry.clone(), &self.config.stats.path)
    }

    pub fn backups(&self) -> BackupManager {
        BackupManager::new(self.registry.clone(), &self.config.backup.dir)
    }
}

fn read_config(explicit: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = explicit.or_else(|| std::env::var_os("TAMER_CONFIG").map(PathBuf::from)) {
        info!("Loading configuration from {:?}", path);
        return load_config(&path).with_context(|| format!("Failed to load config from {:?}", path));
    }

    let path = Path::new(DEFAULT_CONFIG);
    load_config_or_default(path).with_context(|| format!("Failed to load config from {:?}", path))
}

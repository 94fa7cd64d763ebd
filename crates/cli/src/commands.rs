use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use tamer_core::{
    automation::{rule_from_config, stats_rule},
    metrics, AddOptions, AutomationEngine, HttpFeedFetcher, MonitorOptions, MonitorSnapshot,
    RssMonitor, ScheduleEntry, Scheduler,
};

use crate::app::App;
use crate::cli::{BackupCommand, Command, MonitorArgs};
use crate::render;

pub async fn execute(app: &App, command: Command) -> Result<()> {
    let registry = &app.registry;
    match command {
        Command::Add {
            source,
            priority,
            sequential,
        } => {
            let options = AddOptions::default()
                .with_priority(priority)
                .with_sequential(sequential);
            let id = registry.add_with(&source, options).await?;
            let name = registry.get(id).await?.name();
            println!("Added torrent {id}: {name}");
        }
        Command::List { state, json } => {
            let listings = registry.list(state.map(Into::into)).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&listings)?);
            } else {
                println!("{}", render::listing_table(&listings));
            }
        }
        Command::Pause { id } => {
            registry.pause(id).await?;
            println!("Paused torrent {id}");
        }
        Command::Resume { id } => {
            registry.resume(id).await?;
            println!("Resumed torrent {id}");
        }
        Command::Remove { id, delete_data } => {
            registry.remove(id, delete_data).await?;
            println!("Removed torrent {id}");
        }
        Command::Monitor(args) => monitor(app, args).await?,
        Command::Info { id, json } => {
            let handle = registry.get(id).await?;
            let status = registry.status(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                // Backends without these details still get the status view.
                let priority = registry.priority(id).await.ok();
                let files = registry.files(id).await.unwrap_or_default();
                let trackers = registry.trackers(id).await.unwrap_or_default();
                println!(
                    "{}",
                    render::info_block(id, &handle.name(), &status, priority, &files, &trackers)
                );
            }
        }
        Command::Priority { id, priority } => {
            registry.set_priority(id, priority).await?;
            println!("Torrent {id} priority set to {priority}");
        }
        Command::FilePriority {
            id,
            index,
            priority,
        } => {
            registry.set_file_priority(id, index, priority).await?;
            println!("Torrent {id} file {index} priority set to {priority}");
        }
        Command::AddTrackers { id, urls } => {
            registry.add_trackers(id, &urls).await?;
            println!("Added {} tracker(s) to torrent {id}", urls.len());
        }
        Command::RemoveTrackers { id, urls } => {
            registry.remove_trackers(id, &urls).await?;
            println!("Removed tracker(s) from torrent {id}");
        }
        Command::ForceRecheck { id } => {
            registry.force_recheck(id).await?;
            println!("Recheck started for torrent {id}");
        }
        Command::Sequential { id, mode } => {
            registry.set_sequential(id, mode.enabled()).await?;
            println!("Sequential download {} for torrent {id}", on_off(mode.enabled()));
        }
        Command::SuperSeeding { id, mode } => {
            registry.set_super_seeding(id, mode.enabled()).await?;
            println!("Super seeding {} for torrent {id}", on_off(mode.enabled()));
        }
        Command::Limit {
            id,
            download,
            upload,
        } => {
            if download.is_none() && upload.is_none() {
                anyhow::bail!("nothing to set: pass --download and/or --upload");
            }
            if let Some(kib) = download {
                registry.set_download_limit(id, kib).await?;
                println!("Torrent {id} download limit set to {kib} KiB/s");
            }
            if let Some(kib) = upload {
                registry.set_upload_limit(id, kib).await?;
                println!("Torrent {id} upload limit set to {kib} KiB/s");
            }
        }
        Command::Move { id, path } => {
            registry.move_storage(id, &path).await?;
            println!("Moving torrent {id} to {}", path.display());
        }
        Command::Export { id, path } => {
            registry.export(id, &path).await?;
            println!("Exported torrent {id} to {}", path.display());
        }
        Command::Stats { json, metrics: show_metrics } => {
            let stats = app.stats();
            let snapshot = stats.update_stats().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let daily = stats.daily_stats().await;
                let weekly = stats.weekly_stats().await;
                println!("{}", render::stats_block(&snapshot, &daily, &weekly));
                println!();
                println!("{}", render::session_block(&registry.session_stats().await));
            }
            if show_metrics {
                println!();
                print!("{}", metrics::gather_text());
            }
        }
        Command::Search { query } => {
            let found = registry.search(&query).await;
            if found.is_empty() {
                println!("No torrents match '{query}'");
            }
            for (id, handle) in found {
                println!("{id:<4} {}", handle.name());
            }
        }
        Command::Backup(command) => backup(app, command).await?,
        Command::Run => run(app).await?,
    }
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

async fn monitor(app: &App, args: MonitorArgs) -> Result<()> {
    let options = MonitorOptions {
        show_pieces: args.pieces,
        show_peers: args.peers,
        max_peers: app.config.monitor.max_peers,
    };
    let refresh = Duration::from_millis(app.config.monitor.refresh_ms);

    loop {
        let snapshot = MonitorSnapshot::capture(&app.registry, options).await;
        if args.once {
            println!("{}", render::monitor_frame(&snapshot));
            return Ok(());
        }
        // Clear screen, cursor home.
        print!("\x1B[2J\x1B[H");
        println!("{}", render::monitor_frame(&snapshot));
        println!("\nPress Ctrl+C to stop");

        tokio::select! {
            _ = signal::ctrl_c() => break,
            _ = tokio::time::sleep(refresh) => {}
        }
    }
    Ok(())
}

async fn backup(app: &App, command: BackupCommand) -> Result<()> {
    let backups = app.backups();
    match command {
        BackupCommand::Create { name } => {
            let path = backups.create_backup(name.as_deref()).await?;
            println!("Backup written to {}", path.display());
        }
        BackupCommand::List => {
            let names = backups.list_backups().await?;
            if names.is_empty() {
                println!("No backups in {}", backups.dir().display());
            }
            for name in names {
                println!("{name}");
            }
        }
        BackupCommand::Restore { backup } => {
            let report = backups.restore_backup(&backup).await?;
            println!("{}", render::restore_block(&backup, &report));
        }
    }
    Ok(())
}

/// Start every background component and block until shutdown.
async fn run(app: &App) -> Result<()> {
    let config = &app.config;
    let registry = &app.registry;

    let scheduler = Scheduler::new(registry.clone(), Duration::from_secs(config.scheduler.tick_secs));
    for schedule in &config.schedules {
        let entry = ScheduleEntry::from_config(schedule)
            .with_context(|| format!("Invalid schedule '{}'", schedule.id))?;
        scheduler.add_schedule(entry).await;
    }

    let fetcher = HttpFeedFetcher::new(Duration::from_secs(config.rss.fetch_timeout_secs))
        .context("Failed to create feed fetcher")?;
    let rss = RssMonitor::new(
        registry.clone(),
        Arc::new(fetcher),
        Duration::from_secs(config.rss.tick_secs),
        config.rss.state_path.clone(),
    );
    for feed in &config.feeds {
        rss.add_feed(&feed.id, &feed.url, Duration::from_secs(feed.poll_interval_secs))
            .await;
        for filter in &feed.filters {
            rss.add_filter(&feed.id, &filter.pattern, filter.priority)
                .await
                .with_context(|| format!("Invalid filter on feed '{}'", feed.id))?;
        }
    }

    let stats = Arc::new(app.stats());
    let automation = AutomationEngine::new(Duration::from_secs(config.automation.tick_secs));
    automation.add_rule(stats_rule(stats.clone())).await;
    for rule in &config.rules {
        automation
            .add_rule(rule_from_config(rule, registry.clone()))
            .await;
    }

    scheduler.start_scheduler().await;
    rss.start_rss_monitor().await;
    automation.start_automation().await;
    info!(
        torrents = registry.len().await,
        schedules = config.schedules.len(),
        feeds = config.feeds.len(),
        rules = config.rules.len(),
        "tamer running, press Ctrl+C to stop"
    );

    shutdown_signal().await;
    info!("Shutting down...");

    scheduler.stop_scheduler().await;
    rss.stop_rss_monitor().await;
    automation.stop_automation().await;
    info!("Background loops stopped");

    // Persists the final snapshot.
    stats.update_stats().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tamer_core::testing::{fixtures, MockEngine};
    use tamer_core::{Config, TorrentRegistry};

    fn app(engine: Arc<MockEngine>) -> App {
        App {
            config: Config::default(),
            registry: Arc::new(TorrentRegistry::new(engine, "/downloads", false)),
        }
    }

    #[tokio::test]
    async fn test_info_without_engine_details_still_succeeds() {
        let engine = Arc::new(MockEngine::new());
        let app = app(engine.clone());
        let id = app
            .registry
            .add(&fixtures::magnet("aaa", "Alpha"))
            .await
            .unwrap();
        engine.set_details_unsupported("aaa", true).await;

        execute(&app, Command::Info { id, json: false }).await.unwrap();
        assert!(execute(&app, Command::Info { id: 99, json: false })
            .await
            .is_err());
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tamer_core::TorrentState;

/// Terminal torrent orchestration.
#[derive(Debug, Parser)]
#[command(name = "tamer", version, about)]
pub struct Cli {
    /// Configuration file (defaults to $TAMER_CONFIG, then ./tamer.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a magnet URI or a .torrent file.
    Add {
        source: String,
        /// Initial priority (0-7).
        #[arg(short, long, default_value_t = 5)]
        priority: u8,
        /// Download pieces in order.
        #[arg(long)]
        sequential: bool,
    },
    /// List torrents.
    List {
        #[arg(long, value_enum)]
        state: Option<StateFilter>,
        #[arg(long)]
        json: bool,
    },
    Pause {
        id: u64,
    },
    Resume {
        id: u64,
    },
    Remove {
        id: u64,
        /// Also delete downloaded data.
        #[arg(long)]
        delete_data: bool,
    },
    /// Live view of every torrent until Ctrl+C.
    Monitor(MonitorArgs),
    /// Status, files and trackers of one torrent.
    Info {
        id: u64,
        #[arg(long)]
        json: bool,
    },
    /// Set torrent priority (0-7).
    Priority {
        id: u64,
        priority: u8,
    },
    /// Set the priority of one file (0-7).
    FilePriority {
        id: u64,
        index: usize,
        priority: u8,
    },
    AddTrackers {
        id: u64,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    RemoveTrackers {
        id: u64,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    ForceRecheck {
        id: u64,
    },
    Sequential {
        id: u64,
        #[arg(value_enum)]
        mode: Toggle,
    },
    SuperSeeding {
        id: u64,
        #[arg(value_enum)]
        mode: Toggle,
    },
    /// Per-torrent rate limits in KiB/s.
    Limit {
        id: u64,
        #[arg(long)]
        download: Option<u64>,
        #[arg(long)]
        upload: Option<u64>,
    },
    /// Move downloaded data to another directory.
    Move {
        id: u64,
        path: PathBuf,
    },
    /// Write the torrent descriptor to a file.
    Export {
        id: u64,
        path: PathBuf,
    },
    /// Transfer statistics and completion history.
    Stats {
        #[arg(long)]
        json: bool,
        /// Also print Prometheus metrics.
        #[arg(long)]
        metrics: bool,
    },
    /// Find torrents by name.
    Search {
        query: String,
    },
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Run schedules, feeds and rules until Ctrl+C.
    Run,
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Show the piece map of the first torrent.
    #[arg(long)]
    pub pieces: bool,
    /// Show peers of the first torrent.
    #[arg(long)]
    pub peers: bool,
    /// Print one frame and exit.
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Snapshot every torrent.
    Create { name: Option<String> },
    List,
    /// Show what a backup contains. Nothing is re-added.
    Restore { backup: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateFilter {
    Queued,
    Checking,
    DownloadingMetadata,
    Downloading,
    Finished,
    Seeding,
    Paused,
    Error,
}

impl From<StateFilter> for TorrentState {
    fn from(filter: StateFilter) -> Self {
        match filter {
            StateFilter::Queued => TorrentState::Queued,
            StateFilter::Checking => TorrentState::Checking,
            StateFilter::DownloadingMetadata => TorrentState::DownloadingMetadata,
            StateFilter::Downloading => TorrentState::Downloading,
            StateFilter::Finished => TorrentState::Finished,
            StateFilter::Seeding => TorrentState::Seeding,
            StateFilter::Paused => TorrentState::Paused,
            StateFilter::Error => TorrentState::Error,
        }
    }
}

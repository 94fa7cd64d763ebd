//! Torrent registry.
//!
//! The single owner of torrent records. Background loops and the CLI hold an
//! `Arc<TorrentRegistry>` and go through it for every lookup and mutation.

mod manager;
mod types;

pub use manager::TorrentRegistry;
pub use types::{
    AddOptions, RegistryError, SessionStats, TorrentId, TorrentListing, TorrentRecord,
};

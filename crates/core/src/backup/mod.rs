//! JSON backups of the registered torrent set.

mod manager;
mod types;

pub use manager::BackupManager;
pub use types::{
    BackupError, BackupFile, BackupSnapshot, BackupTorrent, RestoreEntry, RestoreReport,
};

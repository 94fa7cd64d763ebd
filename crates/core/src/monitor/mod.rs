//! Live monitor frames and the formatting helpers used to print them.

pub mod format;
mod snapshot;

pub use snapshot::{MonitorOptions, MonitorRow, MonitorSnapshot, PeerSection};

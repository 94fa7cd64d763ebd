//! Plain-text tables for command output.

use std::time::Duration;

use tamer_core::backup::RestoreReport;
use tamer_core::engine::{FileEntry, TorrentStatus};
use tamer_core::monitor::format::{
    estimate_eta, format_duration, format_peer_flags, format_size, format_speed, piece_map,
    priority_name, progress_bar, truncate,
};
use tamer_core::monitor::MonitorSnapshot;
use tamer_core::registry::{SessionStats, TorrentListing};
use tamer_core::stats::{PeriodStats, StatsSnapshot};

const NAME_WIDTH: usize = 35;
const PIECE_MAP_WIDTH: usize = 50;

pub fn listing_table(listings: &[TorrentListing]) -> String {
    if listings.is_empty() {
        return "No torrents.".to_string();
    }
    let mut out = format!(
        "{:<4} {:<35} {:<10} {:<12} {:<12} {:<6} {:<20}\n",
        "ID", "Name", "Progress", "Down", "Up", "Peers", "State"
    );
    out.push_str(&"-".repeat(105));
    for l in listings {
        out.push('\n');
        out.push_str(&format!(
            "{:<4} {:<35} {:<10} {:<12} {:<12} {:<6} {:<20}",
            l.id,
            truncate(&l.name, NAME_WIDTH),
            format!("{:.1}%", l.status.progress * 100.0),
            format_speed(l.status.download_rate),
            format_speed(l.status.upload_rate),
            l.status.num_peers,
            l.status.state.label()
        ));
    }
    out
}

pub fn info_block(
    id: u64,
    name: &str,
    status: &TorrentStatus,
    priority: Option<u8>,
    files: &[FileEntry],
    trackers: &[String],
) -> String {
    let remaining = status.total_wanted.saturating_sub(status.total_done);
    let eta = estimate_eta(remaining, status.download_rate)
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());

    let mut out = format!("Torrent {id}: {name}\n");
    out.push_str(&format!("  Info hash:  {}\n", status.info_hash.as_deref().unwrap_or("-")));
    out.push_str(&format!("  State:      {}\n", status.state.label()));
    out.push_str(&format!("  Progress:   {}\n", progress_bar(status.progress, 20)));
    out.push_str(&format!(
        "  Size:       {} of {}\n",
        format_size(status.total_done),
        format_size(status.total_wanted)
    ));
    out.push_str(&format!(
        "  Rates:      {} down, {} up\n",
        format_speed(status.download_rate),
        format_speed(status.upload_rate)
    ));
    out.push_str(&format!("  ETA:        {eta}\n"));
    out.push_str(&format!(
        "  Peers:      {} ({} seeds)\n",
        status.num_peers, status.num_seeds
    ));
    match priority {
        Some(p) => out.push_str(&format!("  Priority:   {} ({})\n", p, priority_name(p))),
        None => out.push_str("  Priority:   -\n"),
    }
    out.push_str(&format!("  Save path:  {}\n", status.save_path));

    if !files.is_empty() {
        out.push_str("\nFiles:\n");
        for f in files {
            out.push_str(&format!(
                "  [{}] {} ({}, {})\n",
                f.index,
                f.path,
                format_size(f.size_bytes),
                priority_name(f.priority)
            ));
        }
    }
    if !trackers.is_empty() {
        out.push_str("\nTrackers:\n");
        for t in trackers {
            out.push_str(&format!("  {t}\n"));
        }
    }
    out.trim_end().to_string()
}

pub fn session_block(stats: &SessionStats) -> String {
    format!(
        "SESSION STATISTICS:\n{}\n\
         Total Download:  {}\n\
         Total Upload:    {}\n\
         Download Rate:   {}\n\
         Upload Rate:     {}\n\
         Active Peers:    {}\n\
         Active Torrents: {}",
        "-".repeat(40),
        format_size(stats.total_download),
        format_size(stats.total_upload),
        format_speed(stats.download_rate),
        format_speed(stats.upload_rate),
        stats.num_peers,
        stats.num_torrents
    )
}

pub fn monitor_frame(snapshot: &MonitorSnapshot) -> String {
    let mut out = format!(
        "tamer monitor - {}\n{}\n",
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
        "=".repeat(105)
    );
    out.push_str(&format!(
        "{:<4} {:<35} {:<10} {:<12} {:<12} {:<6} {:<12} {:<8}\n",
        "ID", "Name", "Progress", "Down", "Up", "Peers", "State", "Priority"
    ));
    for row in &snapshot.rows {
        out.push_str(&format!(
            "{:<4} {:<35} {:<10} {:<12} {:<12} {:<6} {:<12} {:<8}\n",
            row.id,
            truncate(&row.name, NAME_WIDTH),
            format!("{:.1}%", row.progress * 100.0),
            format_speed(row.download_rate),
            format_speed(row.upload_rate),
            row.num_peers,
            row.state.label(),
            row.priority
        ));
    }
    if snapshot.rows.is_empty() {
        out.push_str("No torrents.\n");
    }

    if let Some(pieces) = &snapshot.pieces {
        out.push_str(&format!(
            "\nPIECE AVAILABILITY:\n{}\n{}\n",
            "-".repeat(PIECE_MAP_WIDTH),
            piece_map(pieces, PIECE_MAP_WIDTH)
        ));
    }

    if let Some(section) = &snapshot.peers {
        out.push_str(&format!(
            "\nPEER INFORMATION:\n{:<15} {:<6} {:<20} {:<10} {:<12} {:<12} {}\n",
            "IP", "Port", "Client", "Progress", "Down", "Up", "Flags"
        ));
        for p in &section.peers {
            out.push_str(&format!(
                "{:<15} {:<6} {:<20} {:<10} {:<12} {:<12} {}\n",
                p.ip,
                p.port,
                truncate(&p.client, 20),
                format!("{:.1}%", p.progress * 100.0),
                format_speed(p.download_rate),
                format_speed(p.upload_rate),
                format_peer_flags(p.flags)
            ));
        }
        if section.total > section.peers.len() {
            out.push_str(&format!(
                "... and {} more peers\n",
                section.total - section.peers.len()
            ));
        }
    }

    out.push('\n');
    out.push_str(&session_block(&snapshot.session));
    out
}

fn period_line(label: &str, period: &PeriodStats) -> String {
    format!(
        "{label:<8} {} completed, {}",
        period.completed,
        format_size(period.total_bytes)
    )
}

pub fn stats_block(snapshot: &StatsSnapshot, daily: &PeriodStats, weekly: &PeriodStats) -> String {
    let uptime = (chrono::Utc::now() - snapshot.session_start)
        .to_std()
        .unwrap_or(Duration::ZERO);

    let mut out = format!(
        "Downloaded:  {}\nUploaded:    {}\nCompleted:   {}\nTracking:    {} (since {})\n\n{}\n{}",
        format_size(snapshot.total_downloaded),
        format_size(snapshot.total_uploaded),
        snapshot.torrents_completed,
        format_duration(uptime),
        snapshot.session_start.format("%Y-%m-%d %H:%M"),
        period_line("Today", daily),
        period_line("7 days", weekly),
    );
    if !snapshot.history.is_empty() {
        out.push_str("\n\nRecent completions:");
        for record in snapshot.history.iter().rev().take(10) {
            out.push_str(&format!(
                "\n  {} {} ({})",
                record.completed_at.format("%Y-%m-%d %H:%M"),
                truncate(&record.name, NAME_WIDTH),
                format_size(record.size_bytes)
            ));
        }
    }
    out
}

pub fn restore_block(name: &str, report: &RestoreReport) -> String {
    let mut out = format!(
        "Backup {name} ({}) lists {} torrents:\n",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        report.entries.len()
    );
    for entry in &report.entries {
        let t = &entry.torrent;
        out.push_str(&format!(
            "  [{}] {} {} -> {} ({} files, priority {}){}\n",
            t.torrent_id,
            t.info_hash,
            truncate(&t.name, NAME_WIDTH),
            t.save_path,
            t.files.len(),
            t.priority,
            if entry.currently_registered {
                ""
            } else {
                " [not registered]"
            }
        ));
    }
    out.trim_end().to_string()
}

//! Human-readable formatting for sizes, rates, durations and progress.

use std::time::Duration;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Bytes with a binary unit: `0 B`, `512 B`, `1.5 KB`, `2.0 GB`.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

/// `45s`, `3m 20s`, `2h 5m 0s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// `[██████░░░░] 60.0%`. Progress is clamped to 0..=1.
pub fn progress_bar(progress: f64, width: usize) -> String {
    let progress = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };
    let filled = ((progress * width as f64) as usize).min(width);
    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        progress * 100.0
    )
}

pub fn priority_name(priority: u8) -> &'static str {
    match priority {
        0 => "Do Not Download",
        1 => "Low",
        2 => "Normal Low",
        3 => "Normal",
        4 => "Normal High",
        5 => "High",
        6 => "Very High",
        7 => "Maximum",
        _ => "Unknown",
    }
}

const PEER_FLAGS: [(u32, &str); 9] = [
    (1, "interesting"),
    (2, "choked"),
    (4, "remote_interested"),
    (8, "remote_choked"),
    (16, "supports_extensions"),
    (32, "local_connection"),
    (64, "handshake"),
    (128, "connecting"),
    (256, "queued"),
];

/// Comma-separated names of the set peer flags, or `none`.
pub fn format_peer_flags(flags: u32) -> String {
    let names: Vec<&str> = PEER_FLAGS
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Shorten to at most `max` characters plus an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}...")
}

/// Time left to fetch `remaining` bytes at `rate` bytes/second.
pub fn estimate_eta(remaining: u64, rate: u64) -> Option<Duration> {
    if rate == 0 {
        return None;
    }
    Some(Duration::from_secs(remaining / rate))
}

/// One glyph per piece, wrapped every `width` pieces.
pub fn piece_map(pieces: &[u32], width: usize) -> String {
    let width = width.max(1);
    pieces
        .chunks(width)
        .map(|row| {
            row.iter()
                .map(|&a| if a > 0 { '█' } else { '░' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 * 1024 * 1024), "3072.0 TB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(0), "0 B/s");
        assert_eq!(format_speed(2048), "2.0 KB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(200)), "3m 20s");
        assert_eq!(format_duration(Duration::from_secs(7500)), "2h 5m 0s");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.5, 4), "[██░░] 50.0%");
        assert_eq!(progress_bar(1.7, 2), "[██] 100.0%");
        assert_eq!(progress_bar(-1.0, 2), "[░░] 0.0%");
    }

    #[test]
    fn test_priority_name() {
        assert_eq!(priority_name(0), "Do Not Download");
        assert_eq!(priority_name(5), "High");
        assert_eq!(priority_name(9), "Unknown");
    }

    #[test]
    fn test_format_peer_flags() {
        assert_eq!(format_peer_flags(0), "none");
        assert_eq!(format_peer_flags(1 | 8), "interesting, remote_choked");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd...");
        assert_eq!(truncate("ünïcödé", 3), "ün...");
    }

    #[test]
    fn test_estimate_eta() {
        assert_eq!(estimate_eta(1000, 0), None);
        assert_eq!(estimate_eta(1000, 100), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_piece_map_wraps() {
        assert_eq!(piece_map(&[1, 0, 2, 0, 0], 2), "█░\n█░\n░");
        assert_eq!(piece_map(&[], 50), "");
    }
}

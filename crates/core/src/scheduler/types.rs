use chrono::{NaiveTime, Weekday};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::ScheduleConfig;
use crate::registry::TorrentId;

/// Errors from scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Schedule not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// What a schedule does to its torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleOperation {
    Start,
    Stop,
    Pause,
    Resume,
}

impl ScheduleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleOperation::Start => "start",
            ScheduleOperation::Stop => "stop",
            ScheduleOperation::Pause => "pause",
            ScheduleOperation::Resume => "resume",
        }
    }

    /// True when the operation resumes the torrent.
    pub fn resumes(&self) -> bool {
        matches!(self, ScheduleOperation::Start | ScheduleOperation::Resume)
    }
}

impl fmt::Display for ScheduleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleOperation {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(ScheduleOperation::Start),
            "stop" => Ok(ScheduleOperation::Stop),
            "pause" => Ok(ScheduleOperation::Pause),
            "resume" => Ok(ScheduleOperation::Resume),
            _ => Err(SchedulerError::InvalidArgument(format!(
                "invalid operation '{}' (expected start, stop, pause or resume)",
                s
            ))),
        }
    }
}

const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A recurring operation on one torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub schedule_id: String,
    pub torrent_id: TorrentId,
    pub operation: ScheduleOperation,
    /// Minute of the day the entry fires (seconds are always zero).
    pub time_of_day: NaiveTime,
    pub days: HashSet<Weekday>,
}

impl ScheduleEntry {
    /// Build an entry; an empty `days` list means every day.
    pub fn new<S: AsRef<str>>(
        schedule_id: impl Into<String>,
        torrent_id: TorrentId,
        operation: &str,
        time: &str,
        days: &[S],
    ) -> Result<Self, SchedulerError> {
        Ok(Self {
            schedule_id: schedule_id.into(),
            torrent_id,
            operation: operation.parse()?,
            time_of_day: parse_time_of_day(time)?,
            days: parse_days(days)?,
        })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, SchedulerError> {
        Self::new(
            config.id.clone(),
            config.torrent_id,
            &config.operation,
            &config.time,
            &config.days,
        )
    }

    /// `HH:MM` rendering of the fire time.
    pub fn time_label(&self) -> String {
        self.time_of_day.format("%H:%M").to_string()
    }

    /// Fire days in Monday-first order.
    pub fn sorted_days(&self) -> Vec<Weekday> {
        ALL_DAYS
            .iter()
            .copied()
            .filter(|d| self.days.contains(d))
            .collect()
    }
}

/// Parse `HH:MM` (24-hour).
pub fn parse_time_of_day(time: &str) -> Result<NaiveTime, SchedulerError> {
    NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| {
        SchedulerError::InvalidArgument(format!("invalid time '{}' (expected HH:MM)", time))
    })
}

/// Parse weekday names ("monday", "Mon"); empty input means all seven days.
pub fn parse_days<S: AsRef<str>>(days: &[S]) -> Result<HashSet<Weekday>, SchedulerError> {
    if days.is_empty() {
        return Ok(ALL_DAYS.into_iter().collect());
    }
    days.iter()
        .map(|d| {
            let d = d.as_ref();
            d.trim()
                .parse::<Weekday>()
                .map_err(|_| SchedulerError::InvalidArgument(format!("invalid day '{}'", d)))
        })
        .collect()
}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Ids of schedules that ran successfully.
    pub fired: Vec<String>,
    /// Ids and error messages of schedules that failed.
    pub failed: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse() {
        assert_eq!("start".parse::<ScheduleOperation>().unwrap(), ScheduleOperation::Start);
        assert_eq!("PAUSE".parse::<ScheduleOperation>().unwrap(), ScheduleOperation::Pause);
        assert!(matches!(
            "delete".parse::<ScheduleOperation>(),
            Err(SchedulerError::InvalidArgument(_))
        ));
        assert!(ScheduleOperation::Resume.resumes());
        assert!(!ScheduleOperation::Stop.resumes());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time_of_day("09:00").unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("9am").is_err());
        assert!(parse_time_of_day("09:00:30").is_err());
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days::<&str>(&[]).unwrap().len(), 7);
        let days = parse_days(&["monday", "Fri"]).unwrap();
        assert!(days.contains(&Weekday::Mon));
        assert!(days.contains(&Weekday::Fri));
        assert_eq!(days.len(), 2);
        assert!(parse_days(&["someday"]).is_err());
    }

    #[test]
    fn test_entry_new() {
        let entry = ScheduleEntry::new("night", 3, "stop", "23:30", &["saturday", "sunday"]).unwrap();
        assert_eq!(entry.operation, ScheduleOperation::Stop);
        assert_eq!(entry.time_label(), "23:30");
        assert_eq!(entry.sorted_days(), vec![Weekday::Sat, Weekday::Sun]);

        assert!(ScheduleEntry::new("bad", 1, "explode", "10:00", &["monday"]).is_err());
    }
}

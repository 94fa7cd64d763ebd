use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{ScheduleEntry, ScheduleReport, SchedulerError};
use crate::metrics;
use crate::registry::TorrentRegistry;
use crate::worker::LoopWorker;

struct ScheduleSlot {
    entry: ScheduleEntry,
    /// Minute this entry last fired, so short ticks never fire it twice.
    last_fired: Option<NaiveDateTime>,
}

struct SchedulerShared {
    registry: Arc<TorrentRegistry>,
    schedules: RwLock<BTreeMap<String, ScheduleSlot>>,
}

impl SchedulerShared {
    async fn run_due(&self, now: NaiveDateTime) -> ScheduleReport {
        let minute = truncate_to_minute(now);
        let weekday = now.weekday();

        let due: Vec<ScheduleEntry> = {
            let mut schedules = self.schedules.write().await;
            schedules
                .values_mut()
                .filter(|slot| {
                    slot.entry.days.contains(&weekday)
                        && slot.entry.time_of_day.hour() == now.hour()
                        && slot.entry.time_of_day.minute() == now.minute()
                        && slot.last_fired != Some(minute)
                })
                .map(|slot| {
                    slot.last_fired = Some(minute);
                    slot.entry.clone()
                })
                .collect()
        };

        let mut report = ScheduleReport::default();
        for entry in due {
            let result = if entry.operation.resumes() {
                self.registry.resume(entry.torrent_id).await
            } else {
                self.registry.pause(entry.torrent_id).await
            };

            match result {
                Ok(()) => {
                    metrics::SCHEDULE_RUNS.with_label_values(&["fired"]).inc();
                    info!(
                        schedule_id = %entry.schedule_id,
                        torrent_id = entry.torrent_id,
                        operation = %entry.operation,
                        "Executed scheduled operation"
                    );
                    report.fired.push(entry.schedule_id);
                }
                Err(e) => {
                    metrics::SCHEDULE_RUNS.with_label_values(&["failed"]).inc();
                    warn!(
                        schedule_id = %entry.schedule_id,
                        torrent_id = entry.torrent_id,
                        error = %e,
                        "Scheduled operation failed"
                    );
                    report.failed.push((entry.schedule_id, e.to_string()));
                }
            }
        }
        report
    }
}

fn truncate_to_minute(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// Fires start/stop/pause/resume operations at configured times.
///
/// Matching is on the exact minute: a tick that lands outside the entry's
/// minute misses it until the next matching day.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
    worker: LoopWorker,
    tick: Duration,
}

impl Scheduler {
    pub fn new(registry: Arc<TorrentRegistry>, tick: Duration) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                registry,
                schedules: RwLock::new(BTreeMap::new()),
            }),
            worker: LoopWorker::new("Scheduler"),
            tick,
        }
    }

    /// Insert an entry, replacing any entry with the same id.
    pub async fn add_schedule(&self, entry: ScheduleEntry) {
        info!(
            schedule_id = %entry.schedule_id,
            torrent_id = entry.torrent_id,
            operation = %entry.operation,
            time = %entry.time_label(),
            "Schedule added"
        );
        self.shared.schedules.write().await.insert(
            entry.schedule_id.clone(),
            ScheduleSlot {
                entry,
                last_fired: None,
            },
        );
    }

    pub async fn remove_schedule(&self, schedule_id: &str) -> Result<(), SchedulerError> {
        self.shared
            .schedules
            .write()
            .await
            .remove(schedule_id)
            .map(|_| debug!(schedule_id, "Schedule removed"))
            .ok_or_else(|| SchedulerError::NotFound(schedule_id.to_string()))
    }

    /// Every entry, ordered by id.
    pub async fn schedules(&self) -> Vec<ScheduleEntry> {
        self.shared
            .schedules
            .read()
            .await
            .values()
            .map(|slot| slot.entry.clone())
            .collect()
    }

    /// Run every entry due at `now`. Failures are logged and reported, never
    /// propagated.
    pub async fn run_due(&self, now: NaiveDateTime) -> ScheduleReport {
        self.shared.run_due(now).await
    }

    /// Start the background loop. Calling it twice is harmless.
    pub async fn start_scheduler(&self) {
        let shared = Arc::clone(&self.shared);
        self.worker
            .start(self.tick, move || {
                let shared = Arc::clone(&shared);
                async move {
                    shared.run_due(Local::now().naive_local()).await;
                }
            })
            .await;
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop_scheduler(&self) {
        self.worker.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.worker.is_running().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TorrentState;
    use crate::testing::{fixtures, MockEngine};
    use chrono::NaiveDate;

    // 2024-01-01 was a Monday.
    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    async fn setup() -> (Arc<TorrentRegistry>, Scheduler, u64) {
        let engine = Arc::new(MockEngine::new());
        let registry = Arc::new(TorrentRegistry::new(engine, "/downloads", false));
        let id = registry.add(&fixtures::magnet("abc", "A")).await.unwrap();
        let scheduler = Scheduler::new(registry.clone(), Duration::from_secs(60));
        (registry, scheduler, id)
    }

    #[tokio::test]
    async fn test_monday_morning_start_fires_once() {
        let (registry, scheduler, id) = setup().await;
        registry.pause(id).await.unwrap();
        scheduler
            .add_schedule(ScheduleEntry::new("morning", id, "start", "09:00", &["monday"]).unwrap())
            .await;

        assert!(scheduler.run_due(at(1, 8, 59, 0)).await.fired.is_empty());

        let report = scheduler.run_due(at(1, 9, 0, 5)).await;
        assert_eq!(report.fired, vec!["morning"]);
        assert_eq!(registry.status(id).await.unwrap().state, TorrentState::Downloading);

        assert!(scheduler.run_due(at(1, 9, 0, 40)).await.fired.is_empty());
        assert!(scheduler.run_due(at(1, 9, 1, 0)).await.fired.is_empty());
        // Tuesday
        assert!(scheduler.run_due(at(2, 9, 0, 0)).await.fired.is_empty());
        // Next Monday
        assert_eq!(scheduler.run_due(at(8, 9, 0, 0)).await.fired.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_and_pause_pause_the_torrent() {
        let (registry, scheduler, id) = setup().await;
        scheduler
            .add_schedule(ScheduleEntry::new("night", id, "stop", "23:00", &[] as &[&str]).unwrap())
            .await;

        scheduler.run_due(at(3, 23, 0, 0)).await;
        assert_eq!(registry.status(id).await.unwrap().state, TorrentState::Paused);
    }

    #[tokio::test]
    async fn test_failing_entry_does_not_block_others() {
        let (registry, scheduler, id) = setup().await;
        scheduler
            .add_schedule(ScheduleEntry::new("a_ghost", 999, "pause", "12:00", &["monday"]).unwrap())
            .await;
        scheduler
            .add_schedule(ScheduleEntry::new("b_real", id, "pause", "12:00", &["monday"]).unwrap())
            .await;

        let report = scheduler.run_due(at(1, 12, 0, 0)).await;
        assert_eq!(report.fired, vec!["b_real"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a_ghost");
        assert_eq!(registry.status(id).await.unwrap().state, TorrentState::Paused);
    }

    #[tokio::test]
    async fn test_add_replaces_and_remove_reports_missing() {
        let (_, scheduler, id) = setup().await;
        scheduler
            .add_schedule(ScheduleEntry::new("s", id, "pause", "10:00", &["monday"]).unwrap())
            .await;
        scheduler
            .add_schedule(ScheduleEntry::new("s", id, "resume", "11:00", &["monday"]).unwrap())
            .await;

        let all = scheduler.schedules().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].time_label(), "11:00");

        scheduler.remove_schedule("s").await.unwrap();
        assert!(matches!(
            scheduler.remove_schedule("s").await,
            Err(SchedulerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let (_, scheduler, _) = setup().await;
        scheduler.start_scheduler().await;
        scheduler.start_scheduler().await;
        assert!(scheduler.is_running().await);

        scheduler.stop_scheduler().await;
        assert!(!scheduler.is_running().await);
        scheduler.stop_scheduler().await;
    }
}

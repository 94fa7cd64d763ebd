//! Conditions and actions that can be declared in configuration.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{Action, AutomationError, AutomationRule, Condition};
use crate::config::{ActionConfig, ConditionConfig, RuleConfig};
use crate::engine::TorrentStatus;
use crate::registry::{TorrentId, TorrentRegistry};
use crate::stats::StatsTracker;

/// Build a rule from its configuration entry.
pub fn rule_from_config(config: &RuleConfig, registry: Arc<TorrentRegistry>) -> AutomationRule {
    let condition: Arc<dyn Condition> = match config.condition {
        ConditionConfig::AllComplete => Arc::new(AllComplete(registry.clone())),
        ConditionConfig::AnyComplete => Arc::new(AnyComplete(registry.clone())),
        ConditionConfig::ActiveCountAbove { count } => Arc::new(ActiveCountAbove {
            registry: registry.clone(),
            count,
        }),
    };
    let action: Arc<dyn Action> = match config.action {
        ActionConfig::PauseAll => Arc::new(PauseAll(registry)),
        ActionConfig::ResumeAll => Arc::new(ResumeAll(registry)),
        ActionConfig::RemoveCompleted { delete_data } => Arc::new(RemoveCompleted {
            registry,
            delete_data,
        }),
    };

    AutomationRule {
        rule_id: config.id.clone(),
        condition,
        action,
        enabled: config.enabled,
    }
}

/// Rule that refreshes persisted statistics on every pass.
pub fn stats_rule(stats: Arc<StatsTracker>) -> AutomationRule {
    AutomationRule::new("update_stats", Always, UpdateStats(stats))
}

async fn statuses(
    registry: &TorrentRegistry,
) -> Result<Vec<(TorrentId, TorrentStatus)>, AutomationError> {
    let mut out = Vec::new();
    for (id, handle) in registry.get_all().await {
        let status = handle
            .status()
            .await
            .map_err(|e| AutomationError::Condition(format!("torrent {id}: {e}")))?;
        out.push((id, status));
    }
    Ok(out)
}

/// Every registered torrent is complete. False when nothing is registered.
pub struct AllComplete(pub Arc<TorrentRegistry>);

#[async_trait]
impl Condition for AllComplete {
    async fn evaluate(&self) -> Result<bool, AutomationError> {
        let statuses = statuses(&self.0).await?;
        Ok(!statuses.is_empty() && statuses.iter().all(|(_, s)| s.is_complete()))
    }
}

pub struct AnyComplete(pub Arc<TorrentRegistry>);

#[async_trait]
impl Condition for AnyComplete {
    async fn evaluate(&self) -> Result<bool, AutomationError> {
        Ok(statuses(&self.0).await?.iter().any(|(_, s)| s.is_complete()))
    }
}

/// More than `count` torrents are transferring.
pub struct ActiveCountAbove {
    pub registry: Arc<TorrentRegistry>,
    pub count: usize,
}

#[async_trait]
impl Condition for ActiveCountAbove {
    async fn evaluate(&self) -> Result<bool, AutomationError> {
        let active = statuses(&self.registry)
            .await?
            .iter()
            .filter(|(_, s)| s.is_active())
            .count();
        Ok(active > self.count)
    }
}

pub struct Always;

#[async_trait]
impl Condition for Always {
    async fn evaluate(&self) -> Result<bool, AutomationError> {
        Ok(true)
    }
}

/// Collapse per-torrent failures into one action error after trying them all.
fn summarize(verb: &str, failures: Vec<String>) -> Result<(), AutomationError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(AutomationError::Action(format!(
            "{verb} failed for {}",
            failures.join("; ")
        )))
    }
}

pub struct PauseAll(pub Arc<TorrentRegistry>);

#[async_trait]
impl Action for PauseAll {
    async fn execute(&self) -> Result<(), AutomationError> {
        let mut failures = Vec::new();
        for (id, _) in self.0.get_all().await {
            if let Err(e) = self.0.pause(id).await {
                warn!(torrent_id = id, error = %e, "Rule could not pause torrent");
                failures.push(format!("{id}: {e}"));
            }
        }
        summarize("pause", failures)
    }
}

pub struct ResumeAll(pub Arc<TorrentRegistry>);

#[async_trait]
impl Action for ResumeAll {
    async fn execute(&self) -> Result<(), AutomationError> {
        let mut failures = Vec::new();
        for (id, _) in self.0.get_all().await {
            if let Err(e) = self.0.resume(id).await {
                warn!(torrent_id = id, error = %e, "Rule could not resume torrent");
                failures.push(format!("{id}: {e}"));
            }
        }
        summarize("resume", failures)
    }
}

/// Remove every complete torrent, optionally deleting its data.
pub struct RemoveCompleted {
    pub registry: Arc<TorrentRegistry>,
    pub delete_data: bool,
}

#[async_trait]
impl Action for RemoveCompleted {
    async fn execute(&self) -> Result<(), AutomationError> {
        let mut failures = Vec::new();
        for (id, handle) in self.registry.get_all().await {
            let complete = match handle.status().await {
                Ok(status) => status.is_complete(),
                Err(e) => {
                    failures.push(format!("{id}: {e}"));
                    continue;
                }
            };
            if !complete {
                continue;
            }
            match self.registry.remove(id, self.delete_data).await {
                Ok(()) => info!(torrent_id = id, "Rule removed completed torrent"),
                // Removed concurrently since the snapshot.
                Err(e) if e.is_not_found() => {}
                Err(e) => failures.push(format!("{id}: {e}")),
            }
        }
        summarize("remove", failures)
    }
}

pub struct UpdateStats(pub Arc<StatsTracker>);

#[async_trait]
impl Action for UpdateStats {
    async fn execute(&self) -> Result<(), AutomationError> {
        self.0.update_stats().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TorrentState;
    use crate::testing::{fixtures, MockEngine};

    async fn setup(hashes: &[&str]) -> (Arc<MockEngine>, Arc<TorrentRegistry>) {
        let engine = Arc::new(MockEngine::new());
        let registry = Arc::new(TorrentRegistry::new(engine.clone(), "/downloads", false));
        for hash in hashes {
            registry
                .add(&fixtures::magnet(hash, &format!("Torrent {hash}")))
                .await
                .unwrap();
        }
        (engine, registry)
    }

    fn rule(condition: ConditionConfig, action: ActionConfig) -> RuleConfig {
        RuleConfig {
            id: "test".to_string(),
            condition,
            action,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_all_complete_is_false_when_empty() {
        let (_, registry) = setup(&[]).await;
        assert!(!AllComplete(registry).evaluate().await.unwrap());
    }

    #[tokio::test]
    async fn test_all_and_any_complete() {
        let (engine, registry) = setup(&["aaa", "bbb"]).await;
        let all = AllComplete(registry.clone());
        let any = AnyComplete(registry.clone());
        assert!(!all.evaluate().await.unwrap());
        assert!(!any.evaluate().await.unwrap());

        engine.set_progress("aaa", 1.0).await;
        assert!(!all.evaluate().await.unwrap());
        assert!(any.evaluate().await.unwrap());

        engine.set_progress("bbb", 1.0).await;
        assert!(all.evaluate().await.unwrap());
    }

    #[tokio::test]
    async fn test_active_count_above() {
        let (engine, registry) = setup(&["aaa", "bbb", "ccc"]).await;
        engine.set_state("ccc", TorrentState::Paused).await;

        let above_one = ActiveCountAbove {
            registry: registry.clone(),
            count: 1,
        };
        let above_two = ActiveCountAbove { registry, count: 2 };
        assert!(above_one.evaluate().await.unwrap());
        assert!(!above_two.evaluate().await.unwrap());
    }

    #[tokio::test]
    async fn test_condition_fails_on_unreadable_status() {
        let (engine, registry) = setup(&["aaa"]).await;
        engine.set_failing("aaa", true).await;
        assert!(matches!(
            AnyComplete(registry).evaluate().await,
            Err(AutomationError::Condition(_))
        ));
    }

    #[tokio::test]
    async fn test_pause_all_then_resume_all() {
        let (engine, registry) = setup(&["aaa", "bbb"]).await;

        PauseAll(registry.clone()).execute().await.unwrap();
        for hash in ["aaa", "bbb"] {
            assert!(engine.handle(hash).await.unwrap().snapshot().await.paused);
        }

        ResumeAll(registry).execute().await.unwrap();
        for hash in ["aaa", "bbb"] {
            assert!(!engine.handle(hash).await.unwrap().snapshot().await.paused);
        }
    }

    #[tokio::test]
    async fn test_pause_all_continues_past_failures() {
        let (engine, registry) = setup(&["aaa", "bbb"]).await;
        engine.set_failing("aaa", true).await;

        let result = PauseAll(registry).execute().await;
        assert!(matches!(result, Err(AutomationError::Action(_))));
        assert!(engine.handle("bbb").await.unwrap().snapshot().await.paused);
    }

    #[tokio::test]
    async fn test_remove_completed() {
        let (engine, registry) = setup(&["aaa", "bbb"]).await;
        engine.set_progress("aaa", 1.0).await;

        RemoveCompleted {
            registry: registry.clone(),
            delete_data: true,
        }
        .execute()
        .await
        .unwrap();

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get_all().await.keys().copied().collect::<Vec<_>>(), vec![2]);
        let removed = engine.removed().await;
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].info_hash, "aaa");
        assert!(removed[0].delete_data);
    }

    #[tokio::test]
    async fn test_rule_from_config() {
        let (engine, registry) = setup(&["aaa"]).await;
        engine.set_progress("aaa", 1.0).await;

        let rule = rule_from_config(
            &rule(ConditionConfig::AnyComplete, ActionConfig::PauseAll),
            registry,
        );
        assert_eq!(rule.rule_id, "test");
        assert!(rule.enabled);
        assert!(rule.condition.evaluate().await.unwrap());
        rule.action.execute().await.unwrap();
        assert!(engine.handle("aaa").await.unwrap().snapshot().await.paused);
    }
}

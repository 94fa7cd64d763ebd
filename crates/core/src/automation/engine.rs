use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{AutomationError, AutomationRule, RuleReport};
use crate::metrics;
use crate::worker::LoopWorker;

/// Evaluates automation rules in insertion order.
///
/// Each rule is isolated: an error or panic in one condition or action is
/// reported and the pass moves on to the next rule.
pub struct AutomationEngine {
    rules: Arc<RwLock<Vec<AutomationRule>>>,
    worker: LoopWorker,
    tick: Duration,
}

impl AutomationEngine {
    pub fn new(tick: Duration) -> Self {
        Self {
            rules: Arc::new(RwLock::new(Vec::new())),
            worker: LoopWorker::new("Automation"),
            tick,
        }
    }

    /// Add a rule. A rule with the same id is replaced in place, keeping its
    /// position.
    pub async fn add_rule(&self, rule: AutomationRule) {
        let mut rules = self.rules.write().await;
        info!(rule_id = %rule.rule_id, enabled = rule.enabled, "Automation rule added");
        match rules.iter_mut().find(|r| r.rule_id == rule.rule_id) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
    }

    pub async fn remove_rule(&self, rule_id: &str) -> Result<(), AutomationError> {
        let mut rules = self.rules.write().await;
        let index = rules
            .iter()
            .position(|r| r.rule_id == rule_id)
            .ok_or_else(|| AutomationError::NotFound(rule_id.to_string()))?;
        rules.remove(index);
        debug!(rule_id, "Automation rule removed");
        Ok(())
    }

    pub async fn enable_rule(&self, rule_id: &str) -> Result<(), AutomationError> {
        self.set_enabled(rule_id, true).await
    }

    pub async fn disable_rule(&self, rule_id: &str) -> Result<(), AutomationError> {
        self.set_enabled(rule_id, false).await
    }

    async fn set_enabled(&self, rule_id: &str, enabled: bool) -> Result<(), AutomationError> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .iter_mut()
            .find(|r| r.rule_id == rule_id)
            .ok_or_else(|| AutomationError::NotFound(rule_id.to_string()))?;
        rule.enabled = enabled;
        debug!(rule_id, enabled, "Automation rule toggled");
        Ok(())
    }

    /// Rule ids with their enabled flag, in evaluation order.
    pub async fn rules(&self) -> Vec<(String, bool)> {
        self.rules
            .read()
            .await
            .iter()
            .map(|r| (r.rule_id.clone(), r.enabled))
            .collect()
    }

    /// Run one pass over every enabled rule.
    pub async fn check_rules(&self) -> RuleReport {
        check_rules(&self.rules).await
    }

    /// Run `check_rules` on the configured cadence in the background.
    pub async fn start_automation(&self) {
        let rules = Arc::clone(&self.rules);
        self.worker
            .start(self.tick, move || {
                let rules = Arc::clone(&rules);
                async move {
                    check_rules(&rules).await;
                }
            })
            .await;
    }

    pub async fn stop_automation(&self) {
        self.worker.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.worker.is_running().await
    }
}

async fn check_rules(rules: &RwLock<Vec<AutomationRule>>) -> RuleReport {
    // Snapshot so conditions and actions may call back into the engine.
    let snapshot: Vec<AutomationRule> = rules
        .read()
        .await
        .iter()
        .filter(|r| r.enabled)
        .cloned()
        .collect();

    let mut report = RuleReport::default();
    for rule in snapshot {
        match run_rule(&rule).await {
            Ok(true) => {
                metrics::RULE_EVALUATIONS.with_label_values(&["fired"]).inc();
                info!(rule_id = %rule.rule_id, "Automation rule fired");
                report.fired.push(rule.rule_id);
            }
            Ok(false) => {
                metrics::RULE_EVALUATIONS.with_label_values(&["skipped"]).inc();
                report.skipped.push(rule.rule_id);
            }
            Err(e) => {
                metrics::RULE_EVALUATIONS.with_label_values(&["failed"]).inc();
                warn!(rule_id = %rule.rule_id, error = %e, "Automation rule failed");
                report.failed.push((rule.rule_id, e.to_string()));
            }
        }
    }
    report
}

/// Ok(true) when the action ran, Ok(false) when the condition was false.
async fn run_rule(rule: &AutomationRule) -> Result<bool, AutomationError> {
    let holds = AssertUnwindSafe(rule.condition.evaluate())
        .catch_unwind()
        .await
        .map_err(panic_error)??;
    if !holds {
        return Ok(false);
    }

    AssertUnwindSafe(rule.action.execute())
        .catch_unwind()
        .await
        .map_err(panic_error)??;
    Ok(true)
}

fn panic_error(payload: Box<dyn Any + Send>) -> AutomationError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    AutomationError::Panicked(message)
}

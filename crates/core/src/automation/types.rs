use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::registry::RegistryError;

/// Errors raised by rule conditions, actions and rule management.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Rule not found: {0}")]
    NotFound(String),

    #[error("Condition failed: {0}")]
    Condition(String),

    #[error("Action failed: {0}")]
    Action(String),

    #[error("Rule panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The predicate half of a rule.
#[async_trait]
pub trait Condition: Send + Sync {
    async fn evaluate(&self) -> Result<bool, AutomationError>;
}

/// The effect half of a rule.
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(&self) -> Result<(), AutomationError>;
}

/// Condition backed by a closure.
pub struct FnCondition<F>(pub F);

#[async_trait]
impl<F> Condition for FnCondition<F>
where
    F: Fn() -> Result<bool, AutomationError> + Send + Sync,
{
    async fn evaluate(&self) -> Result<bool, AutomationError> {
        (self.0)()
    }
}

/// Action backed by a closure.
pub struct FnAction<F>(pub F);

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn() -> Result<(), AutomationError> + Send + Sync,
{
    async fn execute(&self) -> Result<(), AutomationError> {
        (self.0)()
    }
}

/// A condition/action pair. The engine never looks inside either half.
#[derive(Clone)]
pub struct AutomationRule {
    pub rule_id: String,
    pub condition: Arc<dyn Condition>,
    pub action: Arc<dyn Action>,
    pub enabled: bool,
}

impl AutomationRule {
    /// New enabled rule.
    pub fn new(
        rule_id: impl Into<String>,
        condition: impl Condition + 'static,
        action: impl Action + 'static,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            condition: Arc::new(condition),
            action: Arc::new(action),
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl std::fmt::Debug for AutomationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationRule")
            .field("rule_id", &self.rule_id)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Outcome of one `check_rules` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleReport {
    /// Rules whose condition held and whose action succeeded.
    pub fired: Vec<String>,
    /// Rules whose condition was false.
    pub skipped: Vec<String>,
    /// Rules whose condition or action failed, with the error message.
    pub failed: Vec<(String, String)>,
}

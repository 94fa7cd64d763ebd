//! Condition/action automation rules.

pub mod builtin;
mod engine;
mod types;

pub use builtin::{rule_from_config, stats_rule};
pub use engine::AutomationEngine;
pub use types::{
    Action, AutomationError, AutomationRule, Condition, FnAction, FnCondition, RuleReport,
};

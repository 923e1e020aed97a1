//! Condition types
//!
//! Conditions are state-based tests evaluated at trigger time.
//! All conditions of a record must evaluate to true for actions to execute.

use serde::Serialize;

use crate::trigger::StateValue;

/// Condition definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// Check entity state
    State(StateCondition),

    /// Evaluate a template
    Template(TemplateCondition),

    /// All conditions must be true (AND)
    And(AndCondition),
}

impl Condition {
    /// Create a template condition
    pub fn template(value_template: impl Into<String>) -> Self {
        Condition::Template(TemplateCondition {
            value_template: value_template.into(),
        })
    }

    /// Create a state condition
    pub fn state(entity_id: impl Into<String>, state: StateValue) -> Self {
        Condition::State(StateCondition {
            entity_id: entity_id.into(),
            state,
        })
    }

    /// Create an AND condition
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(AndCondition { conditions })
    }

    /// Get the condition type name
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::State(_) => "state",
            Condition::Template(_) => "template",
            Condition::And(_) => "and",
        }
    }
}

/// State condition - check entity state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateCondition {
    /// Entity ID (or comma-joined list) to check
    pub entity_id: String,

    /// State to match
    pub state: StateValue,
}

/// Template condition - evaluate template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateCondition {
    /// Template that must evaluate to true
    pub value_template: String,
}

/// AND condition - all must be true
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AndCondition {
    /// Conditions to evaluate
    pub conditions: Vec<Condition>,
}

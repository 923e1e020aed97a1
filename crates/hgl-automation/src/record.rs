//! Automation records
//!
//! An automation record ties together triggers, conditions, and actions
//! under a unique name. It is the unit handed to the rule emitter.

use serde::Serialize;

use crate::action::ActionStep;
use crate::condition::Condition;
use crate::trigger::Trigger;

/// A single entry or a list, serialized as the bare entry when there is one
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Wrap a list, collapsing a single entry; `None` when empty
    pub fn from_vec(mut items: Vec<T>) -> Option<Self> {
        match items.len() {
            0 => None,
            1 => items.pop().map(OneOrMany::One),
            _ => Some(OneOrMany::Many(items)),
        }
    }

    /// View the entries as a slice
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// A finished automation record
///
/// Serializes with keys in the order `alias`, `initial_state`, `trigger`,
/// `condition`, `action`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationRecord {
    /// Unique human-readable name
    pub alias: String,

    /// Whether Home Assistant enables the automation on start
    pub initial_state: bool,

    /// Triggers that start the automation
    pub trigger: OneOrMany<Trigger>,

    /// Conditions that must be met
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<OneOrMany<Condition>>,

    /// Actions to execute
    pub action: OneOrMany<ActionStep>,
}

impl AutomationRecord {
    /// Assemble a record; returns `None` when triggers or actions are empty
    pub fn new(
        alias: impl Into<String>,
        triggers: Vec<Trigger>,
        conditions: Vec<Condition>,
        actions: Vec<ActionStep>,
    ) -> Option<Self> {
        Some(Self {
            alias: alias.into(),
            initial_state: true,
            trigger: OneOrMany::from_vec(triggers)?,
            condition: OneOrMany::from_vec(conditions),
            action: OneOrMany::from_vec(actions)?,
        })
    }

    /// All triggers
    pub fn triggers(&self) -> &[Trigger] {
        self.trigger.as_slice()
    }

    /// All conditions (empty when none)
    pub fn conditions(&self) -> &[Condition] {
        match &self.condition {
            Some(conditions) => conditions.as_slice(),
            None => &[],
        }
    }

    /// All action steps
    pub fn actions(&self) -> &[ActionStep] {
        self.action.as_slice()
    }
}

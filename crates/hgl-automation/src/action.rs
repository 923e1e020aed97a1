//! Action types
//!
//! Actions are the steps a record executes once triggered: service calls
//! and delays. Service parameter blocks are ordered nested maps that merge
//! recursively.

use indexmap::IndexMap;
use serde::Serialize;

use crate::trigger::StateValue;

/// One step of a record's action sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionStep {
    /// Call a service
    Service(ServiceAction),

    /// Wait
    Delay(DelayAction),
}

impl ActionStep {
    /// The service call of this step, if it is one
    pub fn as_service(&self) -> Option<&ServiceAction> {
        match self {
            ActionStep::Service(s) => Some(s),
            ActionStep::Delay(_) => None,
        }
    }

    /// Mutable access to the service call of this step
    pub fn as_service_mut(&mut self) -> Option<&mut ServiceAction> {
        match self {
            ActionStep::Service(s) => Some(s),
            ActionStep::Delay(_) => None,
        }
    }
}

/// Service call action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceAction {
    /// Service to call (e.g., "light.turn_on")
    pub service: String,

    /// Target entity ID (or comma-joined list)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Service data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ServiceData>,

    /// Service data rendered as templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_template: Option<ServiceData>,
}

impl ServiceAction {
    /// Create a call to `service` with no target or data
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entity_id: None,
            data: None,
            data_template: None,
        }
    }

    /// Set the target entity list
    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Delay action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayAction {
    /// Delay duration (HH:MM:SS)
    pub delay: String,
}

/// A service data value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataValue {
    Number(i64),
    Text(String),
    Map(ServiceData),
}

impl From<StateValue> for DataValue {
    fn from(v: StateValue) -> Self {
        match v {
            StateValue::Number(n) => DataValue::Number(n),
            StateValue::Text(s) => DataValue::Text(s),
        }
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::Text(s.to_string())
    }
}

/// Ordered service data block
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ServiceData(IndexMap<String, DataValue>);

impl ServiceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.0.get(key)
    }

    /// Insert a value, replacing any previous value for `key` in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Build a block from a dotted path (`"color.r"` -> `{color: {r: value}}`)
    pub fn from_path(path: &str, value: DataValue) -> Self {
        let mut segments = path.rsplit('.');
        let mut data = ServiceData::new();
        let leaf = segments.next().unwrap_or(path);
        data.insert(leaf, value);
        for segment in segments {
            let mut outer = ServiceData::new();
            outer.insert(segment, DataValue::Map(data));
            data = outer;
        }
        data
    }

    /// Deep merge `other` into `self`
    ///
    /// Matching nested maps merge recursively; on any other conflict the
    /// value from `other` wins. Existing keys keep their position.
    pub fn merge(mut self, other: ServiceData) -> ServiceData {
        for (key, value) in other.0 {
            match (self.0.shift_remove_full(&key), value) {
                (Some((index, _, DataValue::Map(left))), DataValue::Map(right)) => {
                    self.0
                        .shift_insert(index, key, DataValue::Map(left.merge(right)));
                }
                (Some((index, _, _)), right) => {
                    self.0.shift_insert(index, key, right);
                }
                (None, right) => {
                    self.0.insert(key, right);
                }
            }
        }
        self
    }

    /// Apply `f` to every text leaf, recursively
    pub fn map_text(&mut self, f: &mut dyn FnMut(&str) -> String) {
        for value in self.0.values_mut() {
            match value {
                DataValue::Text(s) => *s = f(s),
                DataValue::Map(inner) => inner.map_text(f),
                DataValue::Number(_) => {}
            }
        }
    }

    /// Whether any text leaf satisfies `pred`, recursively
    pub fn any_text(&self, pred: &dyn Fn(&str) -> bool) -> bool {
        self.0.values().any(|value| match value {
            DataValue::Text(s) => pred(s),
            DataValue::Map(inner) => inner.any_text(pred),
            DataValue::Number(_) => false,
        })
    }
}

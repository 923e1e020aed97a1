//! Trigger types
//!
//! Triggers are event detectors that initiate automations. Each variant
//! serializes with a leading `platform` key.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Trigger definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when an entity's state changes
    State(StateTrigger),

    /// Fires when a template evaluates to true
    Template(TemplateTrigger),

    /// Fires at a specific time
    Time(TimeTrigger),

    /// Fires on an MQTT message
    Mqtt(MqttTrigger),

    /// Fires on any event of a type
    Event(EventTrigger),
}

impl Trigger {
    /// Get the trigger platform name
    pub fn platform(&self) -> &'static str {
        match self {
            Trigger::State(_) => "state",
            Trigger::Template(_) => "template",
            Trigger::Time(_) => "time",
            Trigger::Mqtt(_) => "mqtt",
            Trigger::Event(_) => "event",
        }
    }
}

/// State change trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTrigger {
    /// Entity ID (or comma-joined list) to monitor
    pub entity_id: String,

    /// Previous state to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<StateValue>,

    /// New state to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<StateValue>,

    /// Duration the state must be held before triggering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#for: Option<HoldDuration>,
}

impl StateTrigger {
    /// Trigger on `entity_id` changing to `to`
    pub fn to(entity_id: impl Into<String>, to: StateValue) -> Self {
        Self {
            entity_id: entity_id.into(),
            from: None,
            to: Some(to),
            r#for: None,
        }
    }
}

/// Template trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateTrigger {
    /// Template that evaluates to true/false
    pub value_template: String,

    /// Duration the template must be true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#for: Option<HoldDuration>,
}

/// Time trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeTrigger {
    /// Clock time as written in the source (e.g. "7:30pm")
    pub at: String,
}

/// MQTT trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MqttTrigger {
    /// Topic to subscribe to
    pub topic: String,
}

/// Event trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTrigger {
    /// Event type to match
    pub event_type: String,
}

// --- Supporting types ---

/// A state value: integer when the source lexeme is all digits, text otherwise
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Number(i64),
    Text(String),
}

impl StateValue {
    /// Build from a raw lexeme, keeping digit-only lexemes numeric
    ///
    /// Digit runs too long for an `i64` stay text and are emitted as a
    /// quoted YAML string, so no digits are lost to float rounding.
    pub fn from_lexeme(lexeme: &str) -> Self {
        if !lexeme.is_empty() && lexeme.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = lexeme.parse() {
                return StateValue::Number(n);
            }
        }
        StateValue::Text(lexeme.to_string())
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Text(s.to_string())
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Number(n) => write!(f, "{}", n),
            StateValue::Text(s) => f.write_str(s),
        }
    }
}

/// A numeric amount that prints without a fraction when whole
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Amount {
    Whole(u64),
    Fraction(f64),
}

impl Amount {
    pub fn as_f64(&self) -> f64 {
        match self {
            Amount::Whole(n) => *n as f64,
            Amount::Fraction(x) => *x,
        }
    }
}

impl From<f64> for Amount {
    fn from(x: f64) -> Self {
        if x.is_finite() && x >= 0.0 && x.fract() == 0.0 {
            Amount::Whole(x as u64)
        } else {
            Amount::Fraction(x)
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Whole(n) => write!(f, "{}", n),
            Amount::Fraction(x) => write!(f, "{}", x),
        }
    }
}

/// Hold duration attached to a trigger (`for:`)
///
/// Clock durations serialize as the `H:MM:SS` string; unit durations as a
/// single-entry mapping such as `{minutes: 5}`.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldDuration {
    Clock(String),
    Hours(Amount),
    Minutes(Amount),
    Seconds(Amount),
}

impl HoldDuration {
    /// Convert to minutes: hours×60, seconds/60, passthrough for minutes
    pub fn to_minutes(&self) -> f64 {
        match self {
            HoldDuration::Hours(n) => n.as_f64() * 60.0,
            HoldDuration::Minutes(n) => n.as_f64(),
            HoldDuration::Seconds(n) => n.as_f64() / 60.0,
            HoldDuration::Clock(text) => {
                let parts: Vec<f64> = text
                    .split(':')
                    .map(|p| p.parse::<f64>().unwrap_or(0.0))
                    .collect();
                match parts.as_slice() {
                    [h, m, s] => h * 60.0 + m + s / 60.0,
                    [m, s] => m + s / 60.0,
                    [s] => s / 60.0,
                    _ => 0.0,
                }
            }
        }
    }
}

impl Serialize for HoldDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (unit, amount) = match self {
            HoldDuration::Clock(text) => return serializer.serialize_str(text),
            HoldDuration::Hours(n) => ("hours", n),
            HoldDuration::Minutes(n) => ("minutes", n),
            HoldDuration::Seconds(n) => ("seconds", n),
        };
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(unit, amount)?;
        map.end()
    }
}

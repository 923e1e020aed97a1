//! Leaf conversions
//!
//! Each terminal token class converts independently into a typed value:
//! state values, durations, clock times, solar words, global states and
//! brace-templated names.

use chrono::NaiveTime;
use hgl_automation::{Amount, HoldDuration, StateValue};
use hgl_core::{EntityRef, WILDCARD};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{DurationExpr, Lexeme, ValueExpr};
use crate::braces;
use crate::error::{CompileError, CompileResult};
use crate::fragment::ExpansionSet;

/// Raw values are numeric when all digits; quoted values stay text
pub fn state_value(value: &ValueExpr) -> StateValue {
    match value {
        ValueExpr::Raw(text) => StateValue::from_lexeme(text),
        ValueExpr::Quoted(text) => StateValue::Text(text.clone()),
    }
}

/// Convert a written duration into a hold duration
///
/// `MM:SS` gains an implicit zero hour field; clock fields are padded to
/// two digits (`5:00` is `00:05:00`).
pub fn duration(expr: &DurationExpr) -> CompileResult<HoldDuration> {
    match expr {
        DurationExpr::Clock(text) => Ok(HoldDuration::Clock(pad_clock(&text.text))),
        DurationExpr::Short(text) => {
            Ok(HoldDuration::Clock(pad_clock(&format!("0:{}", text.text))))
        }
        DurationExpr::Units { amount, unit } => {
            let value: f64 = amount
                .text
                .parse()
                .map_err(|_| CompileError::InvalidDuration {
                    span: amount.span,
                    text: amount.text.clone(),
                })?;
            let amount = Amount::from(value);
            Ok(if unit.starts_with("hour") {
                HoldDuration::Hours(amount)
            } else if unit.starts_with("second") {
                HoldDuration::Seconds(amount)
            } else {
                HoldDuration::Minutes(amount)
            })
        }
    }
}

fn pad_clock(text: &str) -> String {
    text.split(':')
        .map(|field| format!("{:0>2}", field))
        .collect::<Vec<_>>()
        .join(":")
}

/// Check a clock literal (`7:30`, `19:30`, `7:30pm`) and keep it as written
pub fn time_literal(literal: &Lexeme) -> CompileResult<String> {
    let text = literal.text.as_str();
    let parsed = if text.ends_with("am") || text.ends_with("pm") {
        NaiveTime::parse_from_str(text, "%I:%M%p")
    } else {
        NaiveTime::parse_from_str(text, "%H:%M")
    };
    parsed
        .map(|_| text.to_string())
        .map_err(|_| CompileError::InvalidTime {
            span: literal.span,
            literal: text.to_string(),
        })
}

/// Fold solar synonyms onto the sun entity's attribute vocabulary
pub fn fold_solar(word: &str) -> &str {
    match word {
        "solar_noon" => "noon",
        "sunrise" => "rising",
        "sunset" => "setting",
        other => other,
    }
}

/// Named boolean conditions usable in a condition clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalState {
    Sunny,
    Cloudy,
    NighttimeDarkMode,
    ToekicksOnMode,
    OnVacation,
    /// Any other word, looked up as a numeric flag
    Other(String),
}

const WEATHER_SENSOR: &str = "sensor.weather_conditions";

impl GlobalState {
    pub fn from_word(word: &str) -> Self {
        match word {
            "sunny" => GlobalState::Sunny,
            "cloudy" => GlobalState::Cloudy,
            "nighttime_dark_mode" => GlobalState::NighttimeDarkMode,
            "toekicks_on_mode" => GlobalState::ToekicksOnMode,
            "on_vacation" => GlobalState::OnVacation,
            other => GlobalState::Other(other.to_string()),
        }
    }

    /// Condition template for this state
    pub fn template(&self) -> String {
        match self {
            GlobalState::Sunny => weather_template("Clear", "Partly Cloudy"),
            GlobalState::Cloudy => weather_template("Cloudy", "Rainy"),
            GlobalState::NighttimeDarkMode => mode_template("nighttime_dark_mode"),
            GlobalState::ToekicksOnMode => mode_template("toekicks_on_mode"),
            GlobalState::OnVacation => mode_template("on_vacation"),
            GlobalState::Other(word) => format!("{{{{ states(\"{}\") == \"1.0\" }}}}", word),
        }
    }
}

fn weather_template(first: &str, second: &str) -> String {
    format!(
        "{{{{ is_state(\"{sensor}\", \"{}\") or is_state(\"{sensor}\", \"{}\") }}}}",
        first,
        second,
        sensor = WEATHER_SENSOR
    )
}

fn mode_template(flag: &str) -> String {
    format!("{{{{ states(\"input_boolean.{}\") == \"on\" }}}}", flag)
}

/// A name that may carry a brace template
#[derive(Debug, Clone, PartialEq)]
pub struct BraceToken {
    /// The name with its brace region replaced by `*`
    pub pattern: String,

    /// Alternatives of the brace region, when there is one
    pub expansion: Option<ExpansionSet>,

    /// The name expanded in place, comma-joined
    pub inline: String,
}

/// Outermost brace region of a name; the pattern is a constant
static BRACE_REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{.*\}").expect("brace region pattern is valid"));

/// Scan a name for a brace template
///
/// A region whose expansion is just itself (`{a}`) is not a template.
pub fn brace_token(name: &Lexeme) -> CompileResult<BraceToken> {
    let invalid = |source| CompileError::InvalidBraceTemplate {
        span: name.span,
        text: name.text.clone(),
        source,
    };

    let inline = braces::expand(&name.text).map_err(invalid)?.join(",");
    let region = match BRACE_REGION.find(&name.text) {
        Some(region) => region,
        None => {
            return Ok(BraceToken {
                pattern: name.text.clone(),
                expansion: None,
                inline,
            })
        }
    };

    let alternatives = braces::expand(region.as_str()).map_err(invalid)?;
    let expansion = match alternatives.as_slice() {
        [only] if only == region.as_str() => None,
        _ => ExpansionSet::new(alternatives),
    };
    let pattern = match expansion {
        Some(_) => format!(
            "{}{}{}",
            &name.text[..region.start()],
            WILDCARD,
            &name.text[region.end()..]
        ),
        None => name.text.clone(),
    };

    Ok(BraceToken {
        pattern,
        expansion,
        inline,
    })
}

/// Check a single entity reference written in the source
pub fn entity(name: &Lexeme) -> CompileResult<EntityRef> {
    name.text
        .parse::<EntityRef>()
        .map_err(|source| CompileError::InvalidEntity {
            span: name.span,
            text: name.text.clone(),
            source,
        })
}

//! Automation record model
//!
//! This crate provides the records produced by the HGL compiler and the
//! emitter that serializes them for Home Assistant.
//!
//! # Architecture
//!
//! ```text
//! AUTOMATION RECORD = TRIGGER → CONDITIONS → ACTIONS
//! ```
//!
//! - **Triggers**: Event detectors that initiate the automation
//! - **Conditions**: State-based tests evaluated at trigger time
//! - **Actions**: Service calls and delays executed in order
//!
//! # Key Types
//!
//! - [`Trigger`] - Event that starts an automation
//! - [`Condition`] - State check that must pass
//! - [`ActionStep`] - One step of the action sequence
//! - [`AutomationRecord`] - Complete compiled automation
//! - [`RuleSink`] - Receiver of finished records, in emission order

pub mod action;
pub mod condition;
pub mod emitter;
pub mod record;
pub mod trigger;

pub use action::{ActionStep, DataValue, DelayAction, ServiceAction, ServiceData};
pub use condition::{Condition, StateCondition, TemplateCondition};
pub use emitter::{EmitError, EmitResult, RuleSink, YamlEmitter};
pub use record::{AutomationRecord, OneOrMany};
pub use trigger::{
    Amount, EventTrigger, HoldDuration, MqttTrigger, StateTrigger, StateValue, TemplateTrigger,
    TimeTrigger, Trigger,
};

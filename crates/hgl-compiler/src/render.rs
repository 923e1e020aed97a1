//! Draft to record projection
//!
//! Domain defaulting happens here, exactly once per name, after every other
//! transform. Nothing compiler-internal survives past this point.

use hgl_automation::{
    ActionStep, AutomationRecord, Condition, DelayAction, EventTrigger, MqttTrigger,
    ServiceAction, StateTrigger, TemplateTrigger, TimeTrigger, Trigger,
};
use hgl_config::CompilerConfig;
use hgl_core::domains;

use crate::error::{CompileError, CompileResult};
use crate::fragment::{
    attribute_template, ActionSpec, ConditionSpec, Draft, ServiceCall, StateExpr, TimeSpec,
    TriggerSpec,
};

/// Build the final record for a fully substituted draft
pub fn record(draft: &Draft, name: &str, config: &CompilerConfig) -> CompileResult<AutomationRecord> {
    let domain = config.trigger_fallback_domain.as_str();
    let triggers = draft
        .triggers
        .iter()
        .map(|spec| trigger(spec, domain))
        .collect();
    let conditions = draft
        .trigger_conditions
        .iter()
        .chain(draft.conditions.iter())
        .map(|spec| condition(spec, domain))
        .collect();
    let actions = draft
        .actions
        .iter()
        .map(|spec| action(spec, &config.service_fallback_domain))
        .collect();

    AutomationRecord::new(name, triggers, conditions, actions)
        .ok_or(CompileError::EmptyRecord { span: draft.span })
}

/// Trigger for a state spec; bare entities take `domain`
pub fn trigger(spec: &TriggerSpec, domain: &str) -> Trigger {
    match spec {
        TriggerSpec::State { entity, to, hold } => Trigger::State(StateTrigger {
            r#for: hold.clone(),
            ..StateTrigger::to(domains::qualify_list(entity, domain), to.clone())
        }),
        TriggerSpec::Expression { expr, hold } => Trigger::Template(TemplateTrigger {
            value_template: expr.template(domain),
            r#for: hold.clone(),
        }),
        TriggerSpec::Template(text) => Trigger::Template(TemplateTrigger {
            value_template: format!("{{{{{}}}}}", text),
            r#for: None,
        }),
        TriggerSpec::Time(time) => time_trigger(time),
        TriggerSpec::Mqtt { topic } => Trigger::Mqtt(MqttTrigger {
            topic: topic.clone(),
        }),
        TriggerSpec::Event { event_type } => Trigger::Event(EventTrigger {
            event_type: event_type.clone(),
        }),
    }
}

/// Clock times use the time platform; sun events compare minute-of-day
/// against the sun entity's next event
pub fn time_trigger(time: &TimeSpec) -> Trigger {
    match time {
        TimeSpec::At(at) => Trigger::Time(TimeTrigger { at: at.clone() }),
        TimeSpec::Solar { event, offset } => {
            let offset = match offset {
                Some((sign, minutes)) => format!(" {} {}", sign.as_str(), minutes),
                None => String::new(),
            };
            Trigger::Template(TemplateTrigger {
                value_template: format!(
                    "{{{{ (as_timestamp(states.sensor.time.last_changed)/60)|round == (as_timestamp(states.sun.sun.attributes.next_{})/60)|round{} }}}}",
                    event, offset
                ),
                r#for: None,
            })
        }
    }
}

fn condition(spec: &ConditionSpec, domain: &str) -> Condition {
    match spec {
        ConditionSpec::State(StateExpr::Is {
            entity,
            value,
            attributes,
        }) => {
            let entity = domains::qualify_list(entity, domain);
            let state = Condition::state(entity.as_str(), value.clone());
            if attributes.is_empty() {
                state
            } else {
                Condition::and(vec![state, Condition::template(attribute_template(&entity, attributes))])
            }
        }
        ConditionSpec::State(expr) => Condition::template(expr.template(domain)),
        ConditionSpec::Attributes { entity, checks } => Condition::template(attribute_template(
            &domains::qualify(entity, domain),
            checks,
        )),
        ConditionSpec::Global(state) => Condition::template(state.template()),
        ConditionSpec::Payload { message } => Condition::template(format!(
            "{{{{ trigger.payload | trim == \"{}\" }}}}",
            message
        )),
    }
}

fn action(spec: &ActionSpec, fallback: &str) -> ActionStep {
    match spec {
        ActionSpec::Call(call) => ActionStep::Service(service_action(&call.resolved(fallback))),
        ActionSpec::Delay(delay) => ActionStep::Delay(DelayAction {
            delay: delay.clone(),
        }),
    }
}

fn service_action(call: &ServiceCall) -> ServiceAction {
    ServiceAction {
        service: call.service.clone(),
        entity_id: call.entities.clone(),
        data: (!call.data.is_empty()).then(|| call.data.clone()),
        data_template: (!call.data_template.is_empty()).then(|| call.data_template.clone()),
    }
}

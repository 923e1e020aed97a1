//! Rule fragments and drafts
//!
//! Every grammar subtree compiles into a [`Fragment`]. The fragments of one
//! rule merge into a [`Draft`], which still carries `*` placeholders and
//! bare names. A draft is specialized per expansion element with
//! [`Draft::expanded`] and projected onto an automation record by
//! [`crate::render`].

use hgl_automation::{Amount, HoldDuration, ServiceData, StateValue};
use hgl_core::{domains, expand_wildcard, has_wildcard, Span, WILDCARD};

use crate::ast::{Connective, Scope, Sign};
use crate::error::{CompileError, CompileResult};
use crate::leaf::GlobalState;

/// Ordered, non-empty substitution elements for the `*` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionSet(Vec<String>);

impl ExpansionSet {
    /// `None` when `elements` is empty
    pub fn new(elements: Vec<String>) -> Option<Self> {
        if elements.is_empty() {
            None
        } else {
            Some(Self(elements))
        }
    }

    pub fn elements(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Boolean state expression over entities
#[derive(Debug, Clone, PartialEq)]
pub enum StateExpr {
    Is {
        entity: String,
        value: StateValue,
        attributes: Vec<(String, StateValue)>,
    },
    Group {
        connective: Connective,
        items: Vec<StateExpr>,
    },
}

impl StateExpr {
    pub fn is(entity: impl Into<String>, value: StateValue) -> Self {
        StateExpr::Is {
            entity: entity.into(),
            value,
            attributes: Vec::new(),
        }
    }

    /// Template body joining `is_state` checks; bare entities get `domain`
    pub fn clause(&self, domain: &str) -> String {
        match self {
            StateExpr::Is {
                entity,
                value,
                attributes,
            } => {
                let entity = domains::qualify(entity, domain);
                let mut parts = vec![format!("is_state(\"{}\", \"{}\")", entity, value)];
                parts.extend(
                    attributes
                        .iter()
                        .map(|(attribute, value)| attribute_check(&entity, attribute, value)),
                );
                parts.join(" and ")
            }
            StateExpr::Group { connective, items } => items
                .iter()
                .map(|item| item.nested_clause(domain))
                .collect::<Vec<_>>()
                .join(&format!(" {} ", connective.as_str())),
        }
    }

    fn nested_clause(&self, domain: &str) -> String {
        match self {
            StateExpr::Is { attributes, .. } if attributes.is_empty() => self.clause(domain),
            _ => format!("({})", self.clause(domain)),
        }
    }

    /// Full `{{...}}` template
    pub fn template(&self, domain: &str) -> String {
        format!("{{{{{}}}}}", self.clause(domain))
    }

    fn substitute(&mut self, element: &str) {
        match self {
            StateExpr::Is { entity, .. } => *entity = expand_wildcard(entity, element),
            StateExpr::Group { items, .. } => {
                items.iter_mut().for_each(|item| item.substitute(element))
            }
        }
    }

    fn has_wildcard(&self) -> bool {
        match self {
            StateExpr::Is { entity, .. } => has_wildcard(entity),
            StateExpr::Group { items, .. } => items.iter().any(StateExpr::has_wildcard),
        }
    }
}

/// `states.<entity>.attributes["<attr>"] == "<value>"`
pub fn attribute_check(entity: &str, attribute: &str, value: &StateValue) -> String {
    format!(
        "states.{}.attributes[\"{}\"] == \"{}\"",
        entity, attribute, value
    )
}

/// Template joining attribute checks on one entity
pub fn attribute_template(entity: &str, checks: &[(String, StateValue)]) -> String {
    let body = checks
        .iter()
        .map(|(attribute, value)| attribute_check(entity, attribute, value))
        .collect::<Vec<_>>()
        .join(" and ");
    format!("{{{{ {} }}}}", body)
}

/// When a time trigger fires
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    /// Clock time as written
    At(String),
    /// Sun event with an optional signed offset in minutes
    Solar {
        event: String,
        offset: Option<(Sign, Amount)>,
    },
}

/// Trigger before rendering
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerSpec {
    State {
        entity: String,
        to: StateValue,
        hold: Option<HoldDuration>,
    },
    Expression {
        expr: StateExpr,
        hold: Option<HoldDuration>,
    },
    /// User template text, between `{{` and `}}`
    Template(String),
    Time(TimeSpec),
    Mqtt {
        topic: String,
    },
    Event {
        event_type: String,
    },
}

impl TriggerSpec {
    fn substitute(&mut self, element: &str) {
        match self {
            TriggerSpec::State { entity, .. } => *entity = expand_wildcard(entity, element),
            TriggerSpec::Expression { expr, .. } => expr.substitute(element),
            TriggerSpec::Event { event_type } => {
                *event_type = expand_wildcard(event_type, element)
            }
            TriggerSpec::Template(_) | TriggerSpec::Time(_) | TriggerSpec::Mqtt { .. } => {}
        }
    }

    fn unresolved(&self) -> Option<&'static str> {
        match self {
            TriggerSpec::State { entity, .. } if has_wildcard(entity) => Some("trigger entity"),
            TriggerSpec::Expression { expr, .. } if expr.has_wildcard() => Some("trigger entity"),
            TriggerSpec::Event { event_type } if has_wildcard(event_type) => {
                Some("trigger event")
            }
            _ => None,
        }
    }

    fn set_hold(&mut self, duration: HoldDuration) {
        match self {
            TriggerSpec::State { hold, .. } | TriggerSpec::Expression { hold, .. } => {
                *hold = Some(duration)
            }
            _ => {}
        }
    }
}

/// Condition before rendering
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionSpec {
    State(StateExpr),
    /// Attribute checks on a trigger entity
    Attributes {
        entity: String,
        checks: Vec<(String, StateValue)>,
    },
    Global(GlobalState),
    /// MQTT payload match
    Payload {
        message: String,
    },
}

impl ConditionSpec {
    fn substitute(&mut self, element: &str) {
        match self {
            ConditionSpec::State(expr) => expr.substitute(element),
            ConditionSpec::Attributes { entity, .. } => *entity = expand_wildcard(entity, element),
            ConditionSpec::Payload { message } => *message = expand_wildcard(message, element),
            ConditionSpec::Global(_) => {}
        }
    }

    fn unresolved(&self) -> Option<&'static str> {
        match self {
            ConditionSpec::State(expr) if expr.has_wildcard() => Some("condition entity"),
            ConditionSpec::Attributes { entity, .. } if has_wildcard(entity) => {
                Some("trigger entity")
            }
            ConditionSpec::Payload { message } if has_wildcard(message) => Some("trigger message"),
            _ => None,
        }
    }
}

/// Service call before domain defaulting
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceCall {
    pub service: String,
    /// Comma-joined entity list
    pub entities: Option<String>,
    pub data: ServiceData,
    pub data_template: ServiceData,
}

impl ServiceCall {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn with_entities(mut self, entities: impl Into<String>) -> Self {
        self.entities = Some(entities.into());
        self
    }

    /// Domain the service resolves to: its own, else the first explicit
    /// entity domain, else `fallback`
    pub fn domain<'a>(&'a self, fallback: &'a str) -> &'a str {
        if let Some(domain) = domains::domain_of(&self.service) {
            return domain;
        }
        self.entities
            .as_deref()
            .and_then(|list| {
                list.split(domains::LIST_SEPARATOR)
                    .filter(|name| !has_wildcard(name))
                    .find_map(domains::domain_of)
            })
            .unwrap_or(fallback)
    }

    /// Apply domain defaulting to the service and its bare entities
    ///
    /// Bare entities take the service domain unless it is the fallback.
    pub fn resolved(&self, fallback: &str) -> ServiceCall {
        let domain = self.domain(fallback).to_string();
        let entities = self.entities.as_ref().map(|list| {
            if domain == fallback {
                list.clone()
            } else {
                domains::qualify_list(list, &domain)
            }
        });
        ServiceCall {
            service: domains::qualify(&self.service, &domain),
            entities,
            data: self.data.clone(),
            data_template: self.data_template.clone(),
        }
    }

    fn substitute(&mut self, element: &str) {
        self.service = expand_wildcard(&self.service, element);
        if let Some(entities) = self.entities.as_mut() {
            *entities = expand_wildcard(entities, element);
        }
        self.data.map_text(&mut |text| expand_wildcard(text, element));
        self.data_template
            .map_text(&mut |text| expand_wildcard(text, element));
    }

    fn unresolved(&self) -> Option<&'static str> {
        if has_wildcard(&self.service) {
            Some("action service")
        } else if self.entities.as_deref().map_or(false, has_wildcard) {
            Some("action entity")
        } else if self.data.any_text(&has_wildcard) || self.data_template.any_text(&has_wildcard) {
            Some("action data")
        } else {
            None
        }
    }

    /// Resolve else-branch placeholders against the primary call
    ///
    /// `*` takes the primary service, `*.<svc>` the primary domain, and an
    /// entity list of `*` the primary entities.
    fn back_substitute(&mut self, primary: &ServiceCall, fallback: &str) {
        let wildcard = WILDCARD.to_string();
        if self.service == wildcard {
            self.service = primary.service.clone();
        } else if let Some(rest) = self
            .service
            .strip_prefix(WILDCARD)
            .and_then(|s| s.strip_prefix(domains::SEPARATOR))
        {
            self.service = format!(
                "{}{}{}",
                primary.domain(fallback),
                domains::SEPARATOR,
                rest
            );
        }
        if self.entities.as_deref() == Some(wildcard.as_str()) {
            self.entities = primary.entities.clone();
        }
    }
}

/// Action step before rendering
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpec {
    Call(ServiceCall),
    Delay(String),
}

impl ActionSpec {
    pub fn as_call(&self) -> Option<&ServiceCall> {
        match self {
            ActionSpec::Call(call) => Some(call),
            ActionSpec::Delay(_) => None,
        }
    }

    pub fn as_call_mut(&mut self) -> Option<&mut ServiceCall> {
        match self {
            ActionSpec::Call(call) => Some(call),
            ActionSpec::Delay(_) => None,
        }
    }
}

/// Entities and connective of an else branch's inverted trigger
#[derive(Debug, Clone, PartialEq)]
pub struct Inversion {
    pub connective: Connective,
    pub entities: Vec<String>,
}

impl Inversion {
    /// Compare every entity against `value`, joined with the dual connective
    pub fn invert(&self, value: &StateValue) -> StateExpr {
        StateExpr::Group {
            connective: self.connective,
            items: self
                .entities
                .iter()
                .map(|entity| StateExpr::is(entity.clone(), value.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerFragment {
    pub spec: TriggerSpec,
    /// Conditions owned by the trigger (attribute checks, payload match)
    pub conditions: Vec<ConditionSpec>,
    pub expansion: Option<ExpansionSet>,
    pub inversion: Option<Inversion>,
    /// Human-readable trigger text used in synthesized names
    pub summary: String,
}

impl TriggerFragment {
    pub fn new(spec: TriggerSpec, summary: impl Into<String>) -> Self {
        Self {
            spec,
            conditions: Vec::new(),
            expansion: None,
            inversion: None,
            summary: summary.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionFragment {
    pub spec: ConditionSpec,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionFragment {
    pub steps: Vec<ActionSpec>,
    pub expansion: Option<ExpansionSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseFragment {
    pub value: StateValue,
    pub hold: Option<HoldDuration>,
    pub action: ActionFragment,
}

/// Partial record produced by one subtree
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Trigger(TriggerFragment),
    Hold(HoldDuration),
    Condition(ConditionFragment),
    Action(ActionFragment),
    Else(ElseFragment),
}

/// A rule's merged fragments
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub span: Span,
    pub summary: String,
    pub triggers: Vec<TriggerSpec>,
    pub trigger_conditions: Vec<ConditionSpec>,
    pub conditions: Vec<ConditionSpec>,
    pub scope: Option<Scope>,
    pub actions: Vec<ActionSpec>,
    pub hold: Option<HoldDuration>,
    pub expansion: Option<ExpansionSet>,
    pub inversion: Option<Inversion>,
    pub else_branch: Option<ElseFragment>,
}

impl Draft {
    pub fn new(span: Span) -> Self {
        Self {
            span,
            summary: String::new(),
            triggers: Vec::new(),
            trigger_conditions: Vec::new(),
            conditions: Vec::new(),
            scope: None,
            actions: Vec::new(),
            hold: None,
            expansion: None,
            inversion: None,
            else_branch: None,
        }
    }

    /// Merge one fragment
    ///
    /// Triggers, actions and holds replace what was there; conditions
    /// accumulate. Two different expansion sets cannot both apply.
    pub fn merge(mut self, fragment: Fragment) -> CompileResult<Self> {
        match fragment {
            Fragment::Trigger(trigger) => {
                self.triggers = vec![trigger.spec];
                self.trigger_conditions = trigger.conditions;
                self.inversion = trigger.inversion;
                self.summary = trigger.summary;
                self.adopt_expansion(trigger.expansion)?;
            }
            Fragment::Hold(hold) => self.hold = Some(hold),
            Fragment::Condition(condition) => {
                self.conditions.push(condition.spec);
                self.scope = Some(condition.scope);
            }
            Fragment::Action(action) => {
                self.actions = action.steps;
                self.adopt_expansion(action.expansion)?;
            }
            Fragment::Else(branch) => self.else_branch = Some(branch),
        }
        Ok(self)
    }

    pub fn merge_all(self, fragments: impl IntoIterator<Item = Fragment>) -> CompileResult<Self> {
        fragments
            .into_iter()
            .try_fold(self, |draft, fragment| draft.merge(fragment))
    }

    fn adopt_expansion(&mut self, expansion: Option<ExpansionSet>) -> CompileResult<()> {
        match (&self.expansion, expansion) {
            (_, None) => Ok(()),
            (None, Some(set)) => {
                self.expansion = Some(set);
                Ok(())
            }
            (Some(current), Some(set)) if *current == set => Ok(()),
            (Some(_), Some(_)) => Err(CompileError::ConflictingExpansions { span: self.span }),
        }
    }

    /// Move a rule-level `for` under the trigger
    pub fn relocate_hold(&mut self) {
        if let Some(hold) = self.hold.take() {
            if let Some(trigger) = self.triggers.first_mut() {
                trigger.set_hold(hold);
            }
        }
    }

    /// First service call of the action sequence
    pub fn primary_call(&self) -> Option<&ServiceCall> {
        self.actions.iter().find_map(ActionSpec::as_call)
    }

    /// Take the else branch and build its draft
    ///
    /// The trigger compares the same entity against the else value, or the
    /// dual expression for entity groups. The condition carries over only
    /// for `while`. The else branch keeps only its own hold and shares the
    /// rule's expansion set; a brace template of its own is an error.
    pub fn split_else(&mut self, service_fallback: &str) -> CompileResult<Option<Draft>> {
        let Some(branch) = self.else_branch.take() else {
            return Ok(None);
        };
        if branch.action.expansion.is_some() {
            return Err(CompileError::ElseExpansion { span: self.span });
        }

        let trigger = match (&self.inversion, self.triggers.first()) {
            (Some(inversion), _) => TriggerSpec::Expression {
                expr: inversion.invert(&branch.value),
                hold: branch.hold.clone(),
            },
            (None, Some(TriggerSpec::State { entity, .. })) => TriggerSpec::State {
                entity: entity.clone(),
                to: branch.value.clone(),
                hold: branch.hold.clone(),
            },
            _ => return Ok(None),
        };

        let mut actions = branch.action.steps;
        if let Some(primary) = self.primary_call() {
            for call in actions.iter_mut().filter_map(ActionSpec::as_call_mut) {
                call.back_substitute(primary, service_fallback);
            }
        }

        let conditions = match self.scope {
            Some(Scope::While) => self.conditions.clone(),
            _ => Vec::new(),
        };

        Ok(Some(Draft {
            span: self.span,
            summary: self.summary.clone(),
            triggers: vec![trigger],
            trigger_conditions: Vec::new(),
            conditions,
            scope: self.scope,
            actions,
            hold: None,
            expansion: self.expansion.clone(),
            inversion: None,
            else_branch: None,
        }))
    }

    /// Independent copy with every `*` replaced by `element`
    pub fn expanded(&self, element: &str) -> Draft {
        let mut draft = self.clone();
        draft.summary = expand_wildcard(&draft.summary, element);
        draft
            .triggers
            .iter_mut()
            .for_each(|t| t.substitute(element));
        draft
            .trigger_conditions
            .iter_mut()
            .chain(draft.conditions.iter_mut())
            .for_each(|c| c.substitute(element));
        draft
            .actions
            .iter_mut()
            .filter_map(ActionSpec::as_call_mut)
            .for_each(|call| call.substitute(element));
        draft
    }

    /// Name of the first field still holding a `*`
    pub fn unresolved(&self) -> Option<&'static str> {
        self.triggers
            .iter()
            .find_map(TriggerSpec::unresolved)
            .or_else(|| {
                self.trigger_conditions
                    .iter()
                    .chain(self.conditions.iter())
                    .find_map(ConditionSpec::unresolved)
            })
            .or_else(|| {
                self.actions
                    .iter()
                    .filter_map(ActionSpec::as_call)
                    .find_map(ServiceCall::unresolved)
            })
    }
}

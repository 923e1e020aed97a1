//! Top-level rule compiler
//!
//! Each top-level statement merges its fragments into a [`Draft`], splits
//! off the else branch, fans out over the rule's expansion set and hands
//! every finished record to the sink as soon as it is built.

use hgl_automation::{
    ActionStep, Amount, AutomationRecord, HoldDuration, RuleSink, ServiceAction, StateTrigger,
    StateValue, Trigger,
};
use hgl_config::CompilerConfig;
use hgl_core::{domains, has_wildcard, Span};
use tracing::{debug, warn};

use crate::ast::{
    ActionExpr, ConditionClause, Lexeme, MessageRule, Rule, Scope, StateChangeRule, Statement,
    TemplateRule, TimeExpr, TimeRangeRule,
};
use crate::context::CompilerContext;
use crate::error::{CompileError, CompileResult};
use crate::fragment::{ActionFragment, ActionSpec, Draft, Fragment, TriggerFragment, TriggerSpec};
use crate::naming::{self, RuleKind};
use crate::{leaf, render, structural};

/// Remote-key service names and what they fold to on MQTT rules
const REMOTE_KEY_FOLDS: &[(&str, &str)] =
    &[("media_volume", "volume"), ("channel_down", "next_track")];

/// Media states that switch a paired power switch on
const POWER_ON_FROM: &[&str] = &["idle", "off", "paused"];

/// Media states that, once held, switch a paired power switch off
const POWER_OFF_TO: &[&str] = &["idle", "off"];

const PLAYING: &str = "playing";

/// Compiles statements in source order into a sink
pub struct RuleCompiler<'a> {
    config: &'a CompilerConfig,
    sink: &'a mut dyn RuleSink,
    emitted: usize,
}

impl<'a> RuleCompiler<'a> {
    pub fn new(config: &'a CompilerConfig, sink: &'a mut dyn RuleSink) -> Self {
        Self {
            config,
            sink,
            emitted: 0,
        }
    }

    /// Records handed to the sink so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Compile one statement and return the updated context
    pub fn compile_statement(
        &mut self,
        mut ctx: CompilerContext,
        statement: &Statement,
    ) -> CompileResult<CompilerContext> {
        match statement {
            Statement::Alias(alias) => {
                if let Some(previous) = ctx.pending_alias.replace(alias.clone()) {
                    warn!(
                        "Alias '{}' at {} replaced by '{}' before any rule",
                        previous.text, previous.span, alias.text
                    );
                }
            }
            Statement::Rule { rule, span } => self.compile_rule(&mut ctx, rule, *span)?,
        }
        Ok(ctx)
    }

    /// Check the context left at the end of input
    pub fn finish(&self, ctx: CompilerContext) -> CompileResult<()> {
        match ctx.pending_alias {
            Some(alias) => Err(CompileError::DanglingAlias {
                span: alias.span,
                alias: alias.text,
            }),
            None => Ok(()),
        }
    }

    fn compile_rule(
        &mut self,
        ctx: &mut CompilerContext,
        rule: &Rule,
        span: Span,
    ) -> CompileResult<()> {
        debug!("Compiling {} rule {}", rule.kind(), span.lines_label());
        match rule {
            Rule::Topic(topic) => {
                if let Some(alias) = ctx.take_alias() {
                    warn!(
                        "Alias '{}' discarded by topic declaration {}",
                        alias,
                        span.lines_label()
                    );
                }
                ctx.mqtt_topic = topic.clone();
                Ok(())
            }
            Rule::StateChange(rule) => self.state_change(ctx, rule, span),
            Rule::Mqtt(rule) => self.mqtt(ctx, rule, span),
            Rule::Event(rule) => self.event(ctx, rule, span),
            Rule::Template(rule) => self.template(ctx, rule, span),
            Rule::PowerPair { media, switch } => self.power_pair(ctx, media, switch, span),
            Rule::PowerOffAt(time) => self.power_off_at(ctx, time, span),
            Rule::TimeRange(rule) => self.time_range(ctx, rule, span),
        }
    }

    /// Trigger, optional condition and action fragments of a `when` rule
    fn fragments(
        &self,
        trigger: TriggerFragment,
        condition: Option<&ConditionClause>,
        action: &ActionExpr,
    ) -> CompileResult<Vec<Fragment>> {
        let mut fragments = vec![Fragment::Trigger(trigger)];
        if let Some(clause) = condition {
            fragments.push(Fragment::Condition(structural::condition(clause)?));
        }
        fragments.push(Fragment::Action(structural::action(action, self.config)?));
        Ok(fragments)
    }

    fn state_change(
        &mut self,
        ctx: &mut CompilerContext,
        rule: &StateChangeRule,
        span: Span,
    ) -> CompileResult<()> {
        let mut fragments = self.fragments(
            structural::state_trigger(&rule.state)?,
            rule.condition.as_ref(),
            &rule.action,
        )?;
        if let Some(hold) = &rule.hold {
            fragments.push(Fragment::Hold(leaf::duration(hold)?));
        }
        if let Some(clause) = &rule.else_clause {
            fragments.push(Fragment::Else(structural::else_branch(clause, self.config)?));
        }

        let mut draft = Draft::new(span).merge_all(fragments)?;
        draft.relocate_hold();
        let else_draft = draft.split_else(&self.config.service_fallback_domain)?;

        let alias = ctx.take_alias();
        let name_of = |d: &Draft| {
            alias
                .clone()
                .unwrap_or_else(|| RuleKind::State.synthesize(&d.summary, d.span))
        };
        self.fan_out(ctx, &draft, else_draft.as_ref(), &name_of, |_| {})
    }

    fn mqtt(
        &mut self,
        ctx: &mut CompilerContext,
        rule: &MessageRule,
        span: Span,
    ) -> CompileResult<()> {
        let trigger = structural::message_trigger(&rule.word, &ctx.mqtt_topic)?;
        let draft = Draft::new(span).merge_all(self.fragments(
            trigger,
            rule.condition.as_ref(),
            &rule.action,
        )?)?;

        let alias = ctx.take_alias();
        let name_of = |d: &Draft| {
            alias
                .clone()
                .unwrap_or_else(|| RuleKind::Mqtt.synthesize(&d.summary, d.span))
        };
        self.fan_out(ctx, &draft, None, &name_of, fold_remote_keys)
    }

    fn event(
        &mut self,
        ctx: &mut CompilerContext,
        rule: &MessageRule,
        span: Span,
    ) -> CompileResult<()> {
        let trigger = structural::event_trigger(&rule.word)?;
        let draft = Draft::new(span).merge_all(self.fragments(
            trigger,
            rule.condition.as_ref(),
            &rule.action,
        )?)?;

        let alias = ctx.take_alias();
        let name_of = |d: &Draft| {
            alias
                .clone()
                .unwrap_or_else(|| RuleKind::Event.synthesize(&d.summary, d.span))
        };
        self.fan_out(ctx, &draft, None, &name_of, |_| {})
    }

    fn template(
        &mut self,
        ctx: &mut CompilerContext,
        rule: &TemplateRule,
        span: Span,
    ) -> CompileResult<()> {
        let trigger = TriggerFragment::new(TriggerSpec::Template(rule.template.clone()), "");
        let draft = Draft::new(span).merge_all(self.fragments(
            trigger,
            rule.condition.as_ref(),
            &rule.action,
        )?)?;

        let alias = ctx.take_alias();
        let name_of = |d: &Draft| {
            alias
                .clone()
                .unwrap_or_else(|| RuleKind::Template.synthesize(&d.summary, d.span))
        };
        self.fan_out(ctx, &draft, None, &name_of, |_| {})
    }

    /// Emit `primary` and its else sibling, once per expansion element
    ///
    /// Siblings of one element are emitted next to each other, in element
    /// order, named `<base> #<index>` and `ELSE <base> #<index>`.
    fn fan_out(
        &mut self,
        ctx: &mut CompilerContext,
        primary: &Draft,
        else_draft: Option<&Draft>,
        name_of: &dyn Fn(&Draft) -> String,
        adjust: fn(&mut Draft),
    ) -> CompileResult<()> {
        let Some(expansion) = primary.expansion.as_ref() else {
            let mut draft = primary.clone();
            adjust(&mut draft);
            let base = name_of(&draft);
            self.emit(ctx, &draft, base.clone())?;
            if let Some(else_draft) = else_draft {
                let mut draft = else_draft.clone();
                adjust(&mut draft);
                self.emit(ctx, &draft, naming::else_name(&base))?;
            }
            return Ok(());
        };

        debug!(
            "Fanning out {} over {} elements",
            primary.span.lines_label(),
            expansion.len()
        );
        for (index, element) in expansion.elements().iter().enumerate() {
            let mut draft = primary.expanded(element);
            adjust(&mut draft);
            let base = name_of(&draft);
            self.emit(ctx, &draft, naming::sibling(&base, index))?;

            if let Some(else_draft) = else_draft {
                let mut draft = else_draft.expanded(element);
                adjust(&mut draft);
                self.emit(ctx, &draft, naming::sibling(&naming::else_name(&base), index))?;
            }
        }
        Ok(())
    }

    /// Render a resolved draft and emit it
    fn emit(
        &mut self,
        ctx: &mut CompilerContext,
        draft: &Draft,
        name: String,
    ) -> CompileResult<()> {
        if let Some(field) = draft.unresolved() {
            return Err(CompileError::UnresolvedWildcard {
                span: draft.span,
                field,
            });
        }
        let record = render::record(draft, &name, self.config)?;
        self.deliver(ctx, record)
    }

    fn deliver(
        &mut self,
        ctx: &mut CompilerContext,
        mut record: AutomationRecord,
    ) -> CompileResult<()> {
        record.alias = ctx.namer.unique(record.alias);
        debug!("Emitting record '{}'", record.alias);
        self.sink.emit(record)?;
        self.emitted += 1;
        Ok(())
    }

    /// `<media> powered_by <switch>`: one record to power on, one to power off
    fn power_pair(
        &mut self,
        ctx: &mut CompilerContext,
        media: &Lexeme,
        switch: &Lexeme,
        span: Span,
    ) -> CompileResult<()> {
        let media = leaf::entity(media)?
            .qualified(domains::MEDIA_PLAYER)
            .to_string();
        let switch = domains::qualify_list(&leaf::brace_token(switch)?.inline, domains::SWITCH);
        wildcard_free(span, "trigger entity", &media)?;
        wildcard_free(span, "action entity", &switch)?;
        let base = ctx.take_alias().unwrap_or_else(|| media.clone());

        let on_triggers = POWER_ON_FROM
            .iter()
            .map(|from| {
                Trigger::State(StateTrigger {
                    from: Some(StateValue::from(*from)),
                    ..StateTrigger::to(media.as_str(), StateValue::from(PLAYING))
                })
            })
            .collect();
        let hold = HoldDuration::Minutes(Amount::Whole(self.config.power_off_delay_minutes));
        let off_triggers = POWER_OFF_TO
            .iter()
            .map(|to| {
                Trigger::State(StateTrigger {
                    from: Some(StateValue::from(PLAYING)),
                    r#for: Some(hold.clone()),
                    ..StateTrigger::to(media.as_str(), StateValue::from(*to))
                })
            })
            .collect();

        let on = AutomationRecord::new(
            format!("{} turn power on", base),
            on_triggers,
            Vec::new(),
            vec![power_action("turn_on", &switch)],
        );
        let off = AutomationRecord::new(
            format!("{} turn power off", base),
            off_triggers,
            Vec::new(),
            vec![power_action("turn_off", &switch)],
        );
        for record in [on, off] {
            let record = record.ok_or(CompileError::EmptyRecord { span })?;
            self.deliver(ctx, record)?;
        }

        ctx.power_switches.push(switch);
        Ok(())
    }

    /// `* off_at <time>`: turn off every power switch recorded so far
    fn power_off_at(
        &mut self,
        ctx: &mut CompilerContext,
        time: &TimeExpr,
        span: Span,
    ) -> CompileResult<()> {
        let trigger = render::time_trigger(&structural::time(time)?);
        if ctx.power_switches.is_empty() {
            warn!(
                "off_at rule {} has no power switches to turn off",
                span.lines_label()
            );
        }
        let switches = ctx.power_switches.join(",");
        wildcard_free(span, "action entity", &switches)?;
        let name = ctx
            .take_alias()
            .unwrap_or_else(|| format!("{} media_power all_off", self.config.source_name));

        let record = AutomationRecord::new(
            name,
            vec![trigger],
            Vec::new(),
            vec![power_action("turn_off", &switches)],
        )
        .ok_or(CompileError::EmptyRecord { span })?;
        self.deliver(ctx, record)
    }

    /// `from T1 to T2 with E start: .. end: ..`: a start and an end record
    fn time_range(
        &mut self,
        ctx: &mut CompilerContext,
        rule: &TimeRangeRule,
        span: Span,
    ) -> CompileResult<()> {
        let with = leaf::brace_token(&rule.with)?.inline;
        let condition = rule
            .condition
            .as_ref()
            .map(structural::condition)
            .transpose()?;

        let start_action = structural::action(&rule.start_action, self.config)?;
        let end_action = structural::action(&rule.end_action, self.config)?;

        let mut start = vec![
            Fragment::Trigger(TriggerFragment::new(
                TriggerSpec::Time(structural::time(&rule.start)?),
                "",
            )),
            Fragment::Action(retarget(start_action, &with)),
        ];
        let mut end = vec![
            Fragment::Trigger(TriggerFragment::new(
                TriggerSpec::Time(structural::time(&rule.end)?),
                "",
            )),
            Fragment::Action(retarget(end_action, &with)),
        ];
        if let Some(condition) = condition {
            if condition.scope == Scope::While {
                end.push(Fragment::Condition(condition.clone()));
            }
            start.push(Fragment::Condition(condition));
        }

        let base = ctx.take_alias().unwrap_or_else(|| rule.text.clone());
        let start_base = format!("start {}", base);
        let end_base = format!("end {}", base);
        let start = Draft::new(span).merge_all(start)?;
        let end = Draft::new(span).merge_all(end)?;
        self.fan_out(ctx, &start, None, &|_: &Draft| start_base.clone(), |_| {})?;
        self.fan_out(ctx, &end, None, &|_: &Draft| end_base.clone(), |_| {})
    }
}

/// Records built outside a draft get the same check as [`Draft::unresolved`]
fn wildcard_free(span: Span, field: &'static str, text: &str) -> CompileResult<()> {
    if has_wildcard(text) {
        Err(CompileError::UnresolvedWildcard { span, field })
    } else {
        Ok(())
    }
}

/// Point every service call at the time range's `with` entities
fn retarget(mut action: ActionFragment, entities: &str) -> ActionFragment {
    for call in action.steps.iter_mut().filter_map(ActionSpec::as_call_mut) {
        call.entities = Some(entities.to_string());
    }
    action
}

fn fold_remote_keys(draft: &mut Draft) {
    for call in draft.actions.iter_mut().filter_map(ActionSpec::as_call_mut) {
        for (from, to) in REMOTE_KEY_FOLDS {
            call.service = call.service.replace(from, to);
        }
    }
}

fn power_action(service: &str, switches: &str) -> ActionStep {
    let action = ServiceAction::new(format!(
        "{}{}{}",
        domains::HOMEASSISTANT,
        domains::SEPARATOR,
        service
    ));
    if switches.is_empty() {
        ActionStep::Service(action)
    } else {
        ActionStep::Service(action.with_entity(switches))
    }
}

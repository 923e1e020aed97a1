//! HGL parser
//!
//! Parses source text with the pest grammar in `hgl.pest` and builds the
//! typed tree in [`crate::ast`]. Keyword tokens are matched but never
//! stored.

use hgl_core::Span;
use pest::Parser;
use pest_derive::Parser;
use tracing::debug;

use crate::ast::{
    self, ActionExpr, AttributeCheck, ConditionBody, ConditionClause, Connective, DurationExpr,
    ElseClause, EntityState, Lexeme, MessageRule, Param, Scope, Sign, SourceFile, Statement,
    StateChangeRule, TemplateRule, TimeExpr, TimeRangeRule, ValueExpr,
};
use crate::error::{CompileError, CompileResult};

#[derive(Parser)]
#[grammar = "hgl.pest"]
pub struct HglParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse a whole source file
pub fn parse(source: &str) -> CompileResult<SourceFile> {
    let pairs = HglParser::parse(Rule::file, source)?;
    let mut statements = Vec::new();

    for pair in pairs {
        if pair.as_rule() != Rule::file {
            continue;
        }
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::alias_decl => statements.push(Statement::Alias(parse_alias(inner)?)),
                Rule::automation_rule => {
                    let span = rule_span(&inner);
                    for shape in inner.into_inner() {
                        let rule = parse_rule(shape)?;
                        debug!("Parsed {} rule {}", rule.kind(), span.lines_label());
                        statements.push(Statement::Rule { rule, span });
                    }
                }
                _ => {}
            }
        }
    }

    Ok(SourceFile { statements })
}

fn span_of(pair: &Pair) -> Span {
    let span = pair.as_span();
    Span::new(span.start_pos().line_col(), span.end_pos().line_col())
}

/// Span of a whole rule, ending at its last significant line
///
/// Optional trailing elements make pest consume the blank lines and
/// comments after a rule; those are not part of it.
fn rule_span(pair: &Pair) -> Span {
    let span = pair.as_span();
    let text = span.as_str();
    let mut kept = text.trim_end();
    while let Some(newline) = kept.rfind('\n') {
        if !kept[newline + 1..].trim_start().starts_with('#') {
            break;
        }
        kept = kept[..newline].trim_end();
    }

    let (start_line, start_column) = span.start_pos().line_col();
    let end_line = start_line + kept.matches('\n').count();
    let end_column = match kept.rfind('\n') {
        Some(newline) => kept[newline + 1..].chars().count() + 1,
        None => start_column + kept.chars().count(),
    };
    Span::new((start_line, start_column), (end_line, end_column))
}

fn lexeme(pair: &Pair) -> Lexeme {
    Lexeme::new(pair.as_str(), span_of(pair))
}

fn missing(span: Span, what: &str) -> CompileError {
    CompileError::Parse {
        line: span.start_line,
        column: span.start_column,
        message: format!("expected {}", what),
    }
}

fn parse_alias(pair: Pair) -> CompileResult<Lexeme> {
    let span = span_of(&pair);
    pair.into_inner()
        .flat_map(|name| name.into_inner())
        .find(|p| matches!(p.as_rule(), Rule::alias_text | Rule::alias_word))
        .map(|p| Lexeme::new(p.as_str(), span))
        .ok_or_else(|| missing(span, "alias name"))
}

fn parse_rule(pair: Pair) -> CompileResult<ast::Rule> {
    let span = span_of(&pair);
    match pair.as_rule() {
        Rule::topic_decl => pair
            .into_inner()
            .find(|p| p.as_rule() == Rule::mqtt_topic)
            .map(|p| ast::Rule::Topic(p.as_str().to_string()))
            .ok_or_else(|| missing(span, "topic")),
        Rule::when_state => parse_state_change(pair).map(ast::Rule::StateChange),
        Rule::when_fires => parse_message_rule(pair).map(ast::Rule::Event),
        Rule::when_mqtt => parse_message_rule(pair).map(ast::Rule::Mqtt),
        Rule::when_template => parse_template_rule(pair).map(ast::Rule::Template),
        Rule::time_range => parse_time_range(pair).map(ast::Rule::TimeRange),
        Rule::power_off_at => pair
            .into_inner()
            .find(|p| p.as_rule() == Rule::time)
            .map(parse_time)
            .ok_or_else(|| missing(span, "time"))?
            .map(ast::Rule::PowerOffAt),
        Rule::power_pair => {
            let mut media = None;
            let mut switch = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::entity => media = Some(lexeme(&inner)),
                    Rule::brace_entity => switch = Some(lexeme(&inner)),
                    _ => {}
                }
            }
            Ok(ast::Rule::PowerPair {
                media: media.ok_or_else(|| missing(span, "media entity"))?,
                switch: switch.ok_or_else(|| missing(span, "power switch entity"))?,
            })
        }
        other => Err(missing(span, &format!("rule, found {:?}", other))),
    }
}

fn parse_state_change(pair: Pair) -> CompileResult<StateChangeRule> {
    let span = span_of(&pair);
    let mut state = None;
    let mut hold = None;
    let mut condition = None;
    let mut action = None;
    let mut else_clause = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::entity_state => state = Some(parse_entity_state(inner)?),
            Rule::for_clause => hold = Some(parse_for_clause(inner)?),
            Rule::condition_clause => condition = Some(parse_condition(inner)?),
            Rule::action => action = Some(parse_action(inner)?),
            Rule::else_clause => else_clause = Some(parse_else(inner)?),
            _ => {}
        }
    }

    Ok(StateChangeRule {
        state: state.ok_or_else(|| missing(span, "entity state"))?,
        hold,
        condition,
        action: action.ok_or_else(|| missing(span, "action"))?,
        else_clause,
    })
}

fn parse_else(pair: Pair) -> CompileResult<ElseClause> {
    let span = span_of(&pair);
    let mut value = None;
    let mut hold = None;
    let mut action = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::raw_value | Rule::quoted => value = parse_value(inner),
            Rule::for_clause => hold = Some(parse_for_clause(inner)?),
            Rule::action => action = Some(parse_action(inner)?),
            _ => {}
        }
    }

    Ok(ElseClause {
        value: value.ok_or_else(|| missing(span, "else value"))?,
        hold,
        action: action.ok_or_else(|| missing(span, "else action"))?,
    })
}

fn parse_message_rule(pair: Pair) -> CompileResult<MessageRule> {
    let span = span_of(&pair);
    let mut word = None;
    let mut condition = None;
    let mut action = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::brace_word => word = Some(lexeme(&inner)),
            Rule::condition_clause => condition = Some(parse_condition(inner)?),
            Rule::action => action = Some(parse_action(inner)?),
            _ => {}
        }
    }

    Ok(MessageRule {
        word: word.ok_or_else(|| missing(span, "message"))?,
        condition,
        action: action.ok_or_else(|| missing(span, "action"))?,
    })
}

fn parse_template_rule(pair: Pair) -> CompileResult<TemplateRule> {
    let span = span_of(&pair);
    let mut template = None;
    let mut condition = None;
    let mut action = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::template_block => {
                template = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::template_text)
                    .map(|p| p.as_str().to_string());
            }
            Rule::condition_clause => condition = Some(parse_condition(inner)?),
            Rule::action => action = Some(parse_action(inner)?),
            _ => {}
        }
    }

    Ok(TemplateRule {
        template: template.ok_or_else(|| missing(span, "template"))?,
        condition,
        action: action.ok_or_else(|| missing(span, "action"))?,
    })
}

fn parse_time_range(pair: Pair) -> CompileResult<TimeRangeRule> {
    let span = span_of(&pair);
    let text = pair.as_str().lines().next().unwrap_or("").trim().to_string();
    let mut times = Vec::new();
    let mut with = None;
    let mut condition = None;
    let mut start_action = None;
    let mut end_action = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::time => times.push(parse_time(inner)?),
            Rule::with_clause => with = Some(parse_with(inner)?),
            Rule::start_clause => {
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::condition_clause => condition = Some(parse_condition(part)?),
                        Rule::action => start_action = Some(parse_action(part)?),
                        _ => {}
                    }
                }
            }
            Rule::end_clause => {
                end_action = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::action)
                    .map(parse_action)
                    .transpose()?;
            }
            _ => {}
        }
    }

    let mut times = times.into_iter();
    Ok(TimeRangeRule {
        text,
        start: times.next().ok_or_else(|| missing(span, "start time"))?,
        end: times.next().ok_or_else(|| missing(span, "end time"))?,
        with: with.ok_or_else(|| missing(span, "with entity"))?,
        condition,
        start_action: start_action.ok_or_else(|| missing(span, "start action"))?,
        end_action: end_action.ok_or_else(|| missing(span, "end action"))?,
    })
}

/// `with <entity>` or `with <entity-state>`; a state contributes its entities
fn parse_with(pair: Pair) -> CompileResult<Lexeme> {
    let span = span_of(&pair);
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::brace_entity => return Ok(lexeme(&inner)),
            Rule::entity_state => {
                let inner_span = span_of(&inner);
                let state = parse_entity_state(inner)?;
                let names: Vec<&str> = state.entities().iter().map(|l| l.text.as_str()).collect();
                return Ok(Lexeme::new(names.join(","), inner_span));
            }
            _ => {}
        }
    }
    Err(missing(span, "with entity"))
}

fn parse_entity_state(pair: Pair) -> CompileResult<EntityState> {
    let span = span_of(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing(span, "entity state"))?;

    match inner.as_rule() {
        Rule::simple_state => parse_simple_state(inner),
        Rule::multiple_state => {
            let chain = inner
                .into_inner()
                .next()
                .ok_or_else(|| missing(span, "state chain"))?;
            parse_multiple_state(chain)
        }
        Rule::condis_state => parse_condis_state(inner),
        other => Err(missing(span, &format!("entity state, found {:?}", other))),
    }
}

fn parse_simple_state(pair: Pair) -> CompileResult<EntityState> {
    let span = span_of(&pair);
    let mut entity = None;
    let mut value = None;
    let mut attributes = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::brace_entity => entity = Some(lexeme(&inner)),
            Rule::raw_value | Rule::quoted => value = parse_value(inner),
            Rule::attr_clause => attributes.push(parse_attribute(inner)?),
            _ => {}
        }
    }

    Ok(EntityState::Simple {
        entity: entity.ok_or_else(|| missing(span, "entity"))?,
        value: value.ok_or_else(|| missing(span, "state value"))?,
        attributes,
    })
}

fn parse_attribute(pair: Pair) -> CompileResult<AttributeCheck> {
    let span = span_of(&pair);
    let mut attribute = None;
    let mut value = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::attribute => attribute = Some(inner.as_str().to_string()),
            Rule::raw_value | Rule::quoted => value = parse_value(inner),
            _ => {}
        }
    }

    Ok(AttributeCheck {
        attribute: attribute.ok_or_else(|| missing(span, "attribute"))?,
        value: value.ok_or_else(|| missing(span, "attribute value"))?,
    })
}

/// `a is 1 and b is 2 ...`; nested chains with the same connective are
/// flattened, a different connective has no single grouping
fn parse_multiple_state(pair: Pair) -> CompileResult<EntityState> {
    let span = span_of(&pair);
    let connective = match pair.as_rule() {
        Rule::state_conjunction => Connective::And,
        _ => Connective::Or,
    };
    let mut first_entity = None;
    let mut first_value = None;
    let mut states = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::entity => first_entity = Some(lexeme(&inner)),
            Rule::raw_value | Rule::quoted => first_value = parse_value(inner),
            Rule::entity_state => match parse_entity_state(inner)? {
                EntityState::Multiple {
                    connective: nested,
                    states: nested_states,
                } if nested == connective => states.extend(nested_states),
                EntityState::Multiple {
                    connective: nested, ..
                } => {
                    return Err(CompileError::Ambiguous {
                        span,
                        message: format!(
                            "'{}' and '{}' mixed in one state chain",
                            connective.as_str(),
                            nested.as_str()
                        ),
                    })
                }
                state => states.push(state),
            },
            _ => {}
        }
    }

    let first = EntityState::Simple {
        entity: first_entity.ok_or_else(|| missing(span, "entity"))?,
        value: first_value.ok_or_else(|| missing(span, "state value"))?,
        attributes: Vec::new(),
    };
    states.insert(0, first);
    Ok(EntityState::Multiple { connective, states })
}

fn parse_condis_state(pair: Pair) -> CompileResult<EntityState> {
    let span = span_of(&pair);
    let mut connective = Connective::Or;
    let mut entities = Vec::new();
    let mut value = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::entity_disjunction | Rule::entity_conjunction => {
                if inner.as_rule() == Rule::entity_conjunction {
                    connective = Connective::And;
                }
                entities.extend(
                    inner
                        .into_inner()
                        .filter(|p| p.as_rule() == Rule::entity)
                        .map(|p| lexeme(&p)),
                );
            }
            Rule::raw_value | Rule::quoted => value = parse_value(inner),
            _ => {}
        }
    }

    Ok(EntityState::Condis {
        connective,
        entities,
        value: value.ok_or_else(|| missing(span, "state value"))?,
    })
}

fn parse_value(pair: Pair) -> Option<ValueExpr> {
    match pair.as_rule() {
        Rule::raw_value => Some(ValueExpr::Raw(pair.as_str().to_string())),
        Rule::quoted => pair
            .into_inner()
            .find(|p| p.as_rule() == Rule::quoted_value)
            .map(|p| ValueExpr::Quoted(p.as_str().to_string())),
        _ => None,
    }
}

fn parse_condition(pair: Pair) -> CompileResult<ConditionClause> {
    let span = span_of(&pair);
    let mut scope = None;
    let mut body = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::scope_kw => {
                scope = Some(if inner.as_str() == "while" {
                    Scope::While
                } else {
                    Scope::When
                });
            }
            Rule::entity_state_condition => {
                body = Some(ConditionBody::State(parse_entity_state(inner)?));
            }
            Rule::global_state => body = Some(ConditionBody::Global(inner.as_str().to_string())),
            _ => {}
        }
    }

    Ok(ConditionClause {
        scope: scope.ok_or_else(|| missing(span, "'when' or 'while'"))?,
        body: body.ok_or_else(|| missing(span, "condition"))?,
    })
}

fn parse_action(pair: Pair) -> CompileResult<ActionExpr> {
    let span = span_of(&pair);
    let mut service = None;
    let mut params = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::service_name => service = Some(lexeme(&inner)),
            Rule::param => {
                let param_span = span_of(&inner);
                let mut name = None;
                let mut value = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::param_name => name = Some(lexeme(&part)),
                        Rule::raw_value | Rule::quoted => value = parse_value(part),
                        _ => {}
                    }
                }
                params.push(Param {
                    name: name.ok_or_else(|| missing(param_span, "parameter name"))?,
                    value,
                });
            }
            _ => {}
        }
    }

    Ok(ActionExpr {
        service: service.ok_or_else(|| missing(span, "service name"))?,
        params,
    })
}

fn parse_for_clause(pair: Pair) -> CompileResult<DurationExpr> {
    let span = span_of(&pair);
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::duration)
        .map(parse_duration)
        .ok_or_else(|| missing(span, "duration"))?
}

fn parse_duration(pair: Pair) -> CompileResult<DurationExpr> {
    let span = span_of(&pair);
    let mut amount = None;
    let mut unit = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::hh_mm_ss => return Ok(DurationExpr::Clock(lexeme(&inner))),
            Rule::mm_ss => return Ok(DurationExpr::Short(lexeme(&inner))),
            Rule::number => amount = Some(lexeme(&inner)),
            Rule::time_unit => unit = Some(inner.as_str().to_string()),
            _ => {}
        }
    }

    Ok(DurationExpr::Units {
        amount: amount.ok_or_else(|| missing(span, "duration amount"))?,
        unit: unit.ok_or_else(|| missing(span, "duration unit"))?,
    })
}

fn parse_time(pair: Pair) -> CompileResult<TimeExpr> {
    let span = span_of(&pair);
    let mut word = None;
    let mut sign = None;
    let mut offset = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::time_literal => return Ok(TimeExpr::Literal(lexeme(&inner))),
            Rule::time_logical => word = Some(inner.as_str().to_string()),
            Rule::plus_minus => {
                sign = Some(if inner.as_str() == "-" {
                    Sign::Minus
                } else {
                    Sign::Plus
                });
            }
            Rule::duration => offset = Some(parse_duration(inner)?),
            _ => {}
        }
    }

    Ok(TimeExpr::Logical {
        word: word.ok_or_else(|| missing(span, "time"))?,
        offset: sign.zip(offset),
    })
}

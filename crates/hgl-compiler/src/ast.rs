//! Typed syntax tree for HGL sources
//!
//! The parser builds these nodes once; the compiler only reads them.

use hgl_core::Span;

/// A lexeme with its source position
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub text: String,
    pub span: Span,
}

impl Lexeme {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

/// A parsed source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub statements: Vec<Statement>,
}

/// Top-level statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `<alias> :` naming the next rule
    Alias(Lexeme),

    /// A rule with the span of its whole source text
    Rule { rule: Rule, span: Span },
}

/// Top-level rule shapes
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// `TOPIC <path>`
    Topic(String),

    /// `when <entity-state> [for ..] [condition] do <action> [else ..]`
    StateChange(StateChangeRule),

    /// `when <message> [condition] do <action>`
    Mqtt(MessageRule),

    /// `when <event> fires [condition] do <action>`
    Event(MessageRule),

    /// `when {{ .. }} [condition] do <action>`
    Template(TemplateRule),

    /// `<media> powered_by <switch>`
    PowerPair { media: Lexeme, switch: Lexeme },

    /// `* off_at <time>`
    PowerOffAt(TimeExpr),

    /// `from <time> to <time> with ..`
    TimeRange(TimeRangeRule),
}

impl Rule {
    /// Short name of the rule shape, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Topic(_) => "topic",
            Rule::StateChange(_) => "state",
            Rule::Mqtt(_) => "mqtt",
            Rule::Event(_) => "event",
            Rule::Template(_) => "template",
            Rule::PowerPair { .. } => "power",
            Rule::PowerOffAt(_) => "power_off_at",
            Rule::TimeRange(_) => "time_range",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateChangeRule {
    pub state: EntityState,
    pub hold: Option<DurationExpr>,
    pub condition: Option<ConditionClause>,
    pub action: ActionExpr,
    pub else_clause: Option<ElseClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseClause {
    pub value: ValueExpr,
    pub hold: Option<DurationExpr>,
    pub action: ActionExpr,
}

/// MQTT message or event-type rule body
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRule {
    pub word: Lexeme,
    pub condition: Option<ConditionClause>,
    pub action: ActionExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRule {
    /// Text between `{{` and `}}`
    pub template: String,
    pub condition: Option<ConditionClause>,
    pub action: ActionExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeRangeRule {
    /// First source line of the rule, used for naming
    pub text: String,
    pub start: TimeExpr,
    pub end: TimeExpr,
    pub with: Lexeme,
    pub condition: Option<ConditionClause>,
    pub start_action: ActionExpr,
    pub end_action: ActionExpr,
}

/// `and` / `or`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    /// De Morgan dual
    pub fn inverse(self) -> Self {
        match self {
            Connective::And => Connective::Or,
            Connective::Or => Connective::And,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Connective::And => "and",
            Connective::Or => "or",
        }
    }
}

/// Entity state expressions
#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    /// `entity is value [with *.attr == v] [and *.attr == v]..`
    Simple {
        entity: Lexeme,
        value: ValueExpr,
        attributes: Vec<AttributeCheck>,
    },

    /// `a is 1 and b is 2 ..` (flattened, one connective)
    Multiple {
        connective: Connective,
        states: Vec<EntityState>,
    },

    /// `a or b is value`
    Condis {
        connective: Connective,
        entities: Vec<Lexeme>,
        value: ValueExpr,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeCheck {
    pub attribute: String,
    pub value: ValueExpr,
}

/// A state value as written
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Raw(String),
    Quoted(String),
}

impl ValueExpr {
    pub fn text(&self) -> &str {
        match self {
            ValueExpr::Raw(s) | ValueExpr::Quoted(s) => s,
        }
    }
}

/// Condition clause keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `while`: applies to the else branch too
    While,
    /// `when`: primary branch only
    When,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionClause {
    pub scope: Scope,
    pub body: ConditionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionBody {
    State(EntityState),
    Global(String),
}

/// `service[(param, name=value, ..)]`
#[derive(Debug, Clone, PartialEq)]
pub struct ActionExpr {
    pub service: Lexeme,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Lexeme,
    pub value: Option<ValueExpr>,
}

/// Duration as written
#[derive(Debug, Clone, PartialEq)]
pub enum DurationExpr {
    /// `H:MM:SS`
    Clock(Lexeme),
    /// `MM:SS`
    Short(Lexeme),
    /// `<N> hours|minutes|seconds`
    Units { amount: Lexeme, unit: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn as_str(self) -> &'static str {
        match self {
            Sign::Plus => "+",
            Sign::Minus => "-",
        }
    }
}

/// Time expressions
#[derive(Debug, Clone, PartialEq)]
pub enum TimeExpr {
    /// Clock time, `7:30` or `7:30pm`
    Literal(Lexeme),

    /// Solar or named time with an optional signed offset
    Logical {
        word: String,
        offset: Option<(Sign, DurationExpr)>,
    },
}

impl EntityState {
    /// Entity lexemes in source order
    pub fn entities(&self) -> Vec<&Lexeme> {
        match self {
            EntityState::Simple { entity, .. } => vec![entity],
            EntityState::Multiple { states, .. } => {
                states.iter().flat_map(EntityState::entities).collect()
            }
            EntityState::Condis { entities, .. } => entities.iter().collect(),
        }
    }
}

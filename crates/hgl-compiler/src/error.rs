//! Error types for HGL compilation

use hgl_automation::EmitError;
use hgl_core::{EntityRefError, Span};
use thiserror::Error;

use crate::braces::BraceError;
use crate::parser::Rule;

/// Result type for compile operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors that abort a compilation
#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed source
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// A derivation the grammar cannot group unambiguously
    #[error("ambiguous rule at {span}: {message}")]
    Ambiguous { span: Span, message: String },

    /// A `*` placeholder with no expansion element to substitute
    #[error("unresolved wildcard in {field} of rule {}", .span.lines_label())]
    UnresolvedWildcard { span: Span, field: &'static str },

    /// Two independent brace templates in one rule
    #[error("rule {} carries more than one brace template", .span.lines_label())]
    ConflictingExpansions { span: Span },

    /// Brace template in an else action; else branches reuse the rule's set through `*`
    #[error("else action of rule {} carries its own brace template", .span.lines_label())]
    ElseExpansion { span: Span },

    /// Clock time that is not a valid time of day
    #[error("invalid time '{literal}' at {span}")]
    InvalidTime { span: Span, literal: String },

    /// Duration amount that does not parse
    #[error("invalid duration '{text}' at {span}")]
    InvalidDuration { span: Span, text: String },

    /// Brace template that cannot be expanded
    #[error("invalid brace template '{text}' at {span}: {source}")]
    InvalidBraceTemplate {
        span: Span,
        text: String,
        #[source]
        source: BraceError,
    },

    /// Malformed entity reference
    #[error("invalid entity '{text}' at {span}: {source}")]
    InvalidEntity {
        span: Span,
        text: String,
        #[source]
        source: EntityRefError,
    },

    /// Alias at the end of the source with no rule to name
    #[error("alias '{alias}' at {span} is not followed by a rule")]
    DanglingAlias { span: Span, alias: String },

    /// Rule that compiled to no trigger or no action
    #[error("rule {} produced an empty record", .span.lines_label())]
    EmptyRecord { span: Span },

    /// Failure while handing a record to the sink
    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl From<pest::error::Error<Rule>> for CompileError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        use pest::error::LineColLocation;

        let (line, column) = match e.line_col {
            LineColLocation::Pos((line, col)) => (line, col),
            LineColLocation::Span((line, col), _) => (line, col),
        };
        CompileError::Parse {
            line,
            column,
            message: e.variant.message().to_string(),
        }
    }
}

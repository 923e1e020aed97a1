//! Source positions attached to parse nodes

use std::fmt;

/// Start/end line and column of a parse node (1-based, end exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    /// Create a span from start and end (line, column) pairs
    pub fn new(start: (usize, usize), end: (usize, usize)) -> Self {
        Self {
            start_line: start.0,
            start_column: start.1,
            end_line: end.0,
            end_column: end.1,
        }
    }

    /// Whether the span starts and ends on one line
    pub fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }

    /// Human-readable location used in synthesized rule names,
    /// e.g. `(line 3)` or `(lines 3 to 5)`
    pub fn lines_label(&self) -> String {
        if self.is_single_line() {
            format!("(line {})", self.start_line)
        } else {
            format!("(lines {} to {})", self.start_line, self.end_line)
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_column)
    }
}

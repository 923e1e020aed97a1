//! Record naming
//!
//! A record is named by its alias when one precedes the rule; otherwise the
//! name is synthesized from a rule-kind prefix, the trigger summary and the
//! source lines. Fan-out siblings get ` #<index>`, else branches an `ELSE `
//! prefix, and repeats within one compilation a ` (<n>)` suffix.

use std::collections::HashMap;

use hgl_core::Span;
use tracing::warn;

/// Rule shapes with synthesized names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    State,
    Mqtt,
    Event,
    Template,
}

impl RuleKind {
    /// Name synthesized from the trigger summary and the rule's lines
    pub fn synthesize(self, summary: &str, span: Span) -> String {
        let lines = span.lines_label();
        match self {
            RuleKind::State => format!("when {} {}", summary, lines),
            RuleKind::Mqtt => format!("mqtt {} {}", summary, lines),
            RuleKind::Event => format!("when_fires_{} {}", summary, lines),
            RuleKind::Template => format!("when_template {}", lines),
        }
    }
}

/// Name of the `index`th fan-out sibling
pub fn sibling(base: &str, index: usize) -> String {
    format!("{} #{}", base, index)
}

/// Name of an else-branch record
pub fn else_name(base: &str) -> String {
    format!("ELSE {}", base)
}

/// Names handed out during one compilation
#[derive(Debug, Clone, Default)]
pub struct Namer {
    taken: HashMap<String, usize>,
}

impl Namer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name`, appending ` (2)`, ` (3)`, .. when it is taken
    pub fn unique(&mut self, name: String) -> String {
        if !self.taken.contains_key(&name) {
            self.taken.insert(name.clone(), 1);
            return name;
        }

        let mut n = self.taken[&name];
        let candidate = loop {
            n += 1;
            let candidate = format!("{} ({})", name, n);
            if !self.taken.contains_key(&candidate) {
                break candidate;
            }
        };
        warn!(name = %name, renamed = %candidate, "duplicate record name");
        self.taken.insert(name, n);
        self.taken.insert(candidate.clone(), 1);
        candidate
    }
}

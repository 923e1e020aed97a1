//! Shell-style brace expansion
//!
//! `a{b,c}d` expands to `abd`, `acd`; ranges such as `{1..3}` and nested or
//! adjacent groups follow the shell. Expansion itself is done by
//! `bracoxide`. A group with neither a comma nor a range (`{a}`) is not a
//! template and is kept literally.

use thiserror::Error;

/// Brace expansion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BraceError {
    #[error("cannot expand '{pattern}': {reason}")]
    Expansion { pattern: String, reason: String },
}

/// Whether `text` holds a group with alternatives or a range
pub fn is_template(text: &str) -> bool {
    text.contains('{') && (text.contains(',') || text.contains(".."))
}

/// Expand every brace group in `pattern`, in left-to-right order
pub fn expand(pattern: &str) -> Result<Vec<String>, BraceError> {
    if !is_template(pattern) {
        return Ok(vec![pattern.to_string()]);
    }
    bracoxide::explode(pattern).map_err(|e| BraceError::Expansion {
        pattern: pattern.to_string(),
        reason: format!("{:?}", e),
    })
}

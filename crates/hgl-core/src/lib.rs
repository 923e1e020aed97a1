//! Core types for HGL
//!
//! This crate provides the fundamental types shared by the HGL compiler
//! crates: entity references, domain defaulting and source spans.

pub mod domains;
mod entity_id;
mod span;

pub use entity_id::{EntityRef, EntityRefError};
pub use span::Span;

/// Placeholder substituted by each element of an expansion set
pub const WILDCARD: char = '*';

/// Replace every wildcard placeholder in `text` with `element`
pub fn expand_wildcard(text: &str, element: &str) -> String {
    text.replace(WILDCARD, element)
}

/// Check whether `text` still holds a wildcard placeholder
pub fn has_wildcard(text: &str) -> bool {
    text.contains(WILDCARD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_wildcard() {
        assert_eq!(expand_wildcard("sensor.*", "porch"), "sensor.porch");
        assert_eq!(expand_wildcard("camera.*_live/*", "x"), "camera.x_live/x");
        assert_eq!(expand_wildcard("light.porch", "x"), "light.porch");
        assert!(has_wildcard("*.turn_on"));
        assert!(!has_wildcard("light.turn_on"));
    }
}

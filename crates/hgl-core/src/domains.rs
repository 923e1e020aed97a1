//! Domain constants and domain defaulting
//!
//! HGL lets entity and service names omit their domain. Defaulting fills
//! in a domain exactly once; a name that already contains the `.`
//! separator is never re-prefixed.

/// Fallback domain for bare trigger-side entity references
pub const SENSOR: &str = "sensor";

/// Fallback domain for bare action-side service names
pub const HOMEASSISTANT: &str = "homeassistant";

/// Domain of media entities paired with a power switch
pub const MEDIA_PLAYER: &str = "media_player";

/// Domain of power switch entities
pub const SWITCH: &str = "switch";

/// Separator between domain and object_id / service
pub const SEPARATOR: char = '.';

/// Separator between entity ids in an inline entity list
pub const LIST_SEPARATOR: char = ',';

/// Get the domain of a name (`"light.porch"` -> `Some("light")`)
pub fn domain_of(name: &str) -> Option<&str> {
    name.split_once(SEPARATOR).map(|(domain, _)| domain)
}

/// Prefix a bare name with `default_domain`; qualified names are returned unchanged
pub fn qualify(name: &str, default_domain: &str) -> String {
    if name.contains(SEPARATOR) || name.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", default_domain, SEPARATOR, name)
    }
}

/// Apply [`qualify`] to every element of a comma-joined entity list
pub fn qualify_list(list: &str, default_domain: &str) -> String {
    list.split(LIST_SEPARATOR)
        .map(|name| qualify(name.trim(), default_domain))
        .collect::<Vec<_>>()
        .join(",")
}

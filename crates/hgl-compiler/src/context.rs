//! Running context of one compilation
//!
//! Threaded by value through each top-level statement and handed back,
//! possibly updated. A fresh context starts every compilation.

use hgl_config::CompilerConfig;

use crate::ast::Lexeme;
use crate::naming::Namer;

#[derive(Debug, Clone)]
pub struct CompilerContext {
    /// Topic of MQTT rules until the next `TOPIC` declaration
    pub mqtt_topic: String,

    /// Power switches recorded by `powered_by` rules, in source order
    pub power_switches: Vec<String>,

    /// Alias waiting for the next rule
    pub pending_alias: Option<Lexeme>,

    pub namer: Namer,
}

impl CompilerContext {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            mqtt_topic: config.default_mqtt_topic.clone(),
            power_switches: Vec::new(),
            pending_alias: None,
            namer: Namer::new(),
        }
    }

    /// Take the pending alias text, clearing it
    pub fn take_alias(&mut self) -> Option<String> {
        self.pending_alias.take().map(|alias| alias.text)
    }
}

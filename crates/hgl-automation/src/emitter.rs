//! Rule emitter
//!
//! Finished records are handed to a [`RuleSink`] in emission order. The
//! [`YamlEmitter`] serializes each record as its own one-element YAML
//! sequence, so the concatenated output is a valid automations list.

use std::io::Write;
use thiserror::Error;
use tracing::debug;

use crate::record::AutomationRecord;

/// Emitter errors
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to serialize record '{alias}': {source}")]
    Serialize {
        alias: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for emitter operations
pub type EmitResult<T> = Result<T, EmitError>;

/// Receiver of finished automation records
pub trait RuleSink {
    /// Accept the next record in emission order
    fn emit(&mut self, record: AutomationRecord) -> EmitResult<()>;
}

impl RuleSink for Vec<AutomationRecord> {
    fn emit(&mut self, record: AutomationRecord) -> EmitResult<()> {
        self.push(record);
        Ok(())
    }
}

/// Serializes records as YAML into a writer
pub struct YamlEmitter<W: Write> {
    out: W,
    count: usize,
}

impl<W: Write> YamlEmitter<W> {
    /// Create an emitter writing into `out`
    pub fn new(out: W) -> Self {
        Self { out, count: 0 }
    }

    /// Write the header comment block naming the generator and invocation
    pub fn write_header(&mut self, generator: &str, invocation: &str) -> EmitResult<()> {
        writeln!(self.out, "## THIS FILE WAS GENERATED BY {}", generator)?;
        writeln!(self.out, "## {}", invocation)?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Number of records written so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RuleSink for YamlEmitter<W> {
    fn emit(&mut self, record: AutomationRecord) -> EmitResult<()> {
        let yaml = serde_yaml::to_string(std::slice::from_ref(&record)).map_err(|e| {
            EmitError::Serialize {
                alias: record.alias.clone(),
                source: e,
            }
        })?;
        self.out.write_all(yaml.as_bytes())?;
        writeln!(self.out)?;
        self.count += 1;
        debug!("Emitted record: {}", record.alias);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionStep, ServiceAction};
    use crate::trigger::{EventTrigger, Trigger};

    fn record(alias: &str) -> AutomationRecord {
        AutomationRecord::new(
            alias,
            vec![Trigger::Event(EventTrigger {
                event_type: "doorbell".to_string(),
            })],
            vec![],
            vec![ActionStep::Service(ServiceAction::new("light.turn_on"))],
        )
        .unwrap()
    }

    #[test]
    fn test_header_and_records() {
        let mut emitter = YamlEmitter::new(Vec::new());
        emitter
            .write_header("hgl-to-yaml", "hgl-to-yaml home.hgl")
            .unwrap();
        emitter.emit(record("first")).unwrap();
        emitter.emit(record("second")).unwrap();
        assert_eq!(emitter.count(), 2);

        let text = String::from_utf8(emitter.into_inner()).unwrap();
        assert!(text.starts_with(
            "## THIS FILE WAS GENERATED BY hgl-to-yaml\n## hgl-to-yaml home.hgl\n\n"
        ));

        // The concatenation parses back as one list, in emission order
        let parsed: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        let list = parsed.as_sequence().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["alias"], serde_yaml::Value::from("first"));
        assert_eq!(list[1]["alias"], serde_yaml::Value::from("second"));
        assert_eq!(list[1]["initial_state"], serde_yaml::Value::from(true));
    }

    #[test]
    fn test_vec_sink() {
        let mut sink: Vec<AutomationRecord> = Vec::new();
        sink.emit(record("only")).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].alias, "only");
    }
}

//! Compiler settings

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Settings consumed by the compiler
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Base URL of the Home Assistant instance, used in generated media URLs
    pub base_url: String,

    /// MQTT topic used until a `TOPIC` declaration changes it
    pub default_mqtt_topic: String,

    /// Minutes a media player must idle before its power switch turns off
    pub power_off_delay_minutes: u64,

    /// Domain given to bare action-side service names
    pub service_fallback_domain: String,

    /// Domain given to bare trigger-side entity references
    pub trigger_fallback_domain: String,

    /// Label for the compiled source, used in the global shutoff record name
    pub source_name: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8123".to_string(),
            default_mqtt_topic: "vantage/misc".to_string(),
            power_off_delay_minutes: 15,
            service_fallback_domain: "homeassistant".to_string(),
            trigger_fallback_domain: "sensor".to_string(),
            source_name: "hgl".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Load settings from a YAML file, filling missing keys with defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("Loading compiler config: {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> ConfigResult<Self> {
        self.base_url = base_url.into();
        self.validate()?;
        Ok(self)
    }

    /// Override the source label
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "base_url".to_string(),
                reason: format!("'{}' is not an http(s) URL", self.base_url),
            });
        }
        for (key, domain) in [
            ("service_fallback_domain", &self.service_fallback_domain),
            ("trigger_fallback_domain", &self.trigger_fallback_domain),
        ] {
            if domain.is_empty() || domain.contains('.') {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("'{}' is not a bare domain", domain),
                });
            }
        }
        Ok(())
    }
}

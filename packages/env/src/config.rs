use crate::error::EnvError;
use entityverse_view::Namespace;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "entityverse.config.json";

/// Entity environment configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvConfig {
    /// Pass every trail through a serialize/deserialize round trip before
    /// it reaches the consumer
    #[serde(default = "default_structured_clone")]
    pub structured_clone: bool,

    /// Namespace to sync; the global namespace when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn default_structured_clone() -> bool {
    true
}

impl EnvConfig {
    /// Load config from a directory
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, EnvError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: EnvConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(EnvConfig::default())
        }
    }

    pub fn namespace(&self) -> Namespace {
        Namespace::from(self.namespace.clone())
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            structured_clone: default_structured_clone(),
            namespace: None,
        }
    }
}

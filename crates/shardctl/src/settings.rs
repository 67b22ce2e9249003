//! Controller settings
//!
//! Per-replica settings for a shard controller, loaded from a TOML file.
//! Every replica of a controller must run with the same `strict_move` value,
//! since it changes which commands produce a new configuration.

use crate::error::{ControllerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shard controller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// This replica's identifier (log field only)
    #[serde(default)]
    pub controller_id: usize,
    /// Cluster name (log field only)
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    /// Reject moves that target a group which is not a member
    #[serde(default)]
    pub strict_move: bool,
}

fn default_cluster_name() -> String {
    "shardctl".to_string()
}

impl ControllerSettings {
    /// Create settings for a replica with defaults for everything else
    pub fn new(controller_id: usize) -> Self {
        Self {
            controller_id,
            ..Self::default()
        }
    }

    /// Enable or disable strict move validation
    pub fn with_strict_move(mut self, strict: bool) -> Self {
        self.strict_move = strict;
        self
    }

    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ControllerError::Configuration(format!("Failed to read settings file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| ControllerError::Configuration(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.trim().is_empty() {
            return Err(ControllerError::Configuration(
                "cluster_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            controller_id: 0,
            cluster_name: default_cluster_name(),
            strict_move: false,
        }
    }
}

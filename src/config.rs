//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working MEI setup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Knobs for grouping, marking and talking to the merge service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Element kinds whose members toggle as one unit
    pub group_kinds: Vec<String>,
    /// Element kinds that never take part in elimination
    pub stem_kinds: Vec<String>,
    /// Element kind a resolution session can open
    pub measure_kind: String,
    /// Attribute flagging eliminated material in a merge request
    pub visibility_attribute: String,
    /// Per-candidate marking attributes stripped from a resolved measure
    pub candidate_attributes: Vec<String>,
    /// Projection attribute telling which candidate layer drew an element
    pub layer_attribute: String,
    pub merge: MergeConfig,
}

/// Where and how to reach the merge service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Full URL the merge request is POSTed to
    pub endpoint: Option<String>,
    /// Round-trip timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            group_kinds: vec!["chord".to_string(), "beam".to_string()],
            stem_kinds: vec!["stem".to_string()],
            measure_kind: "measure".to_string(),
            visibility_attribute: "visible".to_string(),
            candidate_attributes: vec!["color".to_string()],
            layer_attribute: "fill".to_string(),
            merge: MergeConfig::default(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 30_000,
        }
    }
}

impl ResolveConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn is_group_kind(&self, kind: &str) -> bool {
        self.group_kinds.iter().any(|k| k == kind)
    }

    pub fn is_stem_kind(&self, kind: &str) -> bool {
        self.stem_kinds.iter().any(|k| k == kind)
    }
}

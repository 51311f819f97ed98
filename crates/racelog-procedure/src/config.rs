//! Regatta configuration for racing procedures, read from TOML.
//!
//! ```toml
//! default_procedure = "gate_start"
//!
//! [gate_start]
//! class_flag = "CLASS"
//! has_pathfinder = true
//! has_additional_golf_down_time = false
//!
//! [rrs26]
//! start_mode_flag = "INDIA"
//! ```
//!
//! Every key is optional.

use racelog_core::{Flag, RacingProcedureType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegattaConfiguration {
    pub default_procedure: RacingProcedureType,
    pub gate_start: GateStartConfiguration,
    pub rrs26: Rrs26Configuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateStartConfiguration {
    /// Shown over golf during the start sequence; `CLASS` when unset.
    pub class_flag: Option<Flag>,
    pub has_pathfinder: bool,
    pub has_additional_golf_down_time: bool,
    pub has_individual_recall: bool,
}

impl Default for GateStartConfiguration {
    fn default() -> Self {
        Self {
            class_flag: None,
            has_pathfinder: true,
            has_additional_golf_down_time: true,
            has_individual_recall: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rrs26Configuration {
    pub class_flag: Option<Flag>,
    /// Start mode used until one is chosen in the log.
    pub start_mode_flag: Flag,
    /// Flags that count as a start mode choice.
    pub start_mode_flags: Vec<Flag>,
    pub has_individual_recall: bool,
}

impl Default for Rrs26Configuration {
    fn default() -> Self {
        Self {
            class_flag: None,
            start_mode_flag: Flag::Papa,
            start_mode_flags: vec![Flag::Papa, Flag::India, Flag::Zulu, Flag::Black],
            has_individual_recall: true,
        }
    }
}

impl RegattaConfiguration {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration toml at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

//! Reconciler configuration, loadable from TOML.
//!
//! ```toml
//! apply_nicknames = true
//! max_concurrent_updates = 4
//!
//! [delays.LOBBY]
//! TASKS = 5
//!
//! [voice_rules.TASKS.tracked_alive]
//! mute = true
//! deaf = true
//! ```
//!
//! A file that sets `delays` or `voice_rules` replaces the whole table, so
//! unlisted entries fall back to 0 seconds and open flags respectively.

use std::path::Path;

use serde::{Deserialize, Serialize};
use voxsync_core::Error as CoreError;

use crate::delays::PhaseDelays;
use crate::rules::VoiceRules;

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Rename linked members to their in-game name.
    #[serde(default = "default_apply_nicknames")]
    pub apply_nicknames: bool,

    /// Concurrent updates per cohort; 0 means unbounded.
    #[serde(default = "default_max_concurrent_updates")]
    pub max_concurrent_updates: usize,

    /// Seconds to wait after each phase transition.
    #[serde(default)]
    pub delays: PhaseDelays,

    /// Mute/deafen policy.
    #[serde(default)]
    pub voice_rules: VoiceRules,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            apply_nicknames: default_apply_nicknames(),
            max_concurrent_updates: default_max_concurrent_updates(),
            delays: PhaseDelays::default(),
            voice_rules: VoiceRules::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a parse error when the document is not valid for this schema.
    pub fn from_toml_str(raw: &str) -> voxsync_core::Result<Self> {
        toml::from_str(raw).map_err(|e| CoreError::toml_parse_failed(e.to_string()))
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a read error when the file cannot be read, or a parse error.
    pub fn load(path: impl AsRef<Path>) -> voxsync_core::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::file_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&raw)
    }
}

const fn default_apply_nicknames() -> bool {
    false
}

const fn default_max_concurrent_updates() -> usize {
    0
}

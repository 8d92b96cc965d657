//! Engine configuration.
//!
//! Plain structs passed into constructors. Loading them from files or the
//! environment is the caller's job; every struct deserializes with defaults so
//! a partial document is enough.

use serde::{Deserialize, Serialize};

use crate::fuzzy::FuzzyMatcher;

/// Default number of simultaneous remote calls
pub const DEFAULT_CONCURRENCY: usize = 3;
/// Default number of page ids per remote batch lookup
pub const DEFAULT_REMOTE_BATCH_SIZE: usize = 50;
/// Default number of suggestions per unresolved reference
pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

/// Settings for the local and remote change detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Report every tracked document as modified, even with matching hashes
    pub force: bool,
    /// Page ids handed to the remote checker per batch call
    pub remote_batch_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            force: false,
            remote_batch_size: DEFAULT_REMOTE_BATCH_SIZE,
        }
    }
}

impl DetectorConfig {
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub const fn with_remote_batch_size(mut self, size: usize) -> Self {
        self.remote_batch_size = size;
        self
    }
}

/// Settings for the link registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Fall back to fuzzy matching when exact resolution fails
    pub fuzzy_enabled: bool,
    /// Fixed edit-distance threshold; length-scaled when unset
    pub max_distance: Option<usize>,
    /// Suggestions returned per unresolved reference
    pub suggestion_limit: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            fuzzy_enabled: false,
            max_distance: None,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

impl LinkConfig {
    #[must_use]
    pub const fn with_fuzzy(mut self, enabled: bool) -> Self {
        self.fuzzy_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn with_max_distance(mut self, max_distance: usize) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    /// Matcher configured with this threshold
    pub const fn matcher(&self) -> FuzzyMatcher {
        FuzzyMatcher {
            max_distance: self.max_distance,
        }
    }
}

/// Settings for the concurrent task runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum simultaneous tasks; values below 1 are treated as 1
    pub concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl RunnerConfig {
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Concurrency with the lower bound applied
    pub const fn effective_concurrency(&self) -> usize {
        if self.concurrency < 1 {
            1
        } else {
            self.concurrency
        }
    }
}

/// Settings for the bundled directory vault source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// File extensions (without dot) treated as documents
    pub extensions: Vec<String>,
    /// Skip files and directories whose name starts with `.`
    pub skip_hidden: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string()],
            skip_hidden: true,
        }
    }
}

/// All engine settings in one place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detector: DetectorConfig,
    pub links: LinkConfig,
    pub runner: RunnerConfig,
    pub vault: VaultConfig,
}

impl EngineConfig {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json(payload: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

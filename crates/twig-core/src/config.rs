//! Repository configuration stored at `.twig/config.json`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TwigResult;
use crate::fsutil::atomic_write;

/// Per-repository settings, fixed at init time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RepoConfig {
    /// Branch created by `init` and checked out initially.
    pub default_branch: String,
    /// Length of abbreviated commit ids in log output.
    pub short_id_len: usize,
    /// Markers written around the two sides of a conflicted file.
    pub conflict_markers: ConflictMarkers,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: "master".to_string(),
            short_id_len: 7,
            conflict_markers: ConflictMarkers::default(),
        }
    }
}

/// Lines written into a conflicted file. Each includes its newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConflictMarkers {
    pub ours: String,
    pub separator: String,
    pub theirs: String,
}

impl Default for ConflictMarkers {
    fn default() -> Self {
        Self {
            ours: "<<<<<<< HEAD\n".to_string(),
            separator: "=======\n".to_string(),
            theirs: ">>>>>>>\n".to_string(),
        }
    }
}

impl RepoConfig {
    /// Load the config, or return defaults when the file is absent.
    pub fn load(path: &Path) -> TwigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> TwigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }
}

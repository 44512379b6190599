//! Run configuration for a Composer invocation.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PROBE_INTERVAL, DEFAULT_PROJECT_NAME, DEFAULT_READY_TIMEOUT};

/// Settings that shape how a start plan is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Prefix for image, container, and volume names.
    pub project_name: String,
    /// Delay between readiness probes.
    pub probe_interval: Duration,
    /// Maximum time a started service may take to become ready.
    pub ready_timeout: Duration,
    /// Inject `<DEP>_HOST` / `<DEP>_PORT` variables for each dependency.
    pub link_env: bool,
    /// Rebuild images of `build` services even when they already exist.
    pub force_build: bool,
}

impl ComposerConfig {
    /// Creates a configuration with defaults for the given project.
    #[must_use]
    pub fn for_project(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Self::default()
        }
    }

    /// Derives a project name from the directory holding the compose file.
    ///
    /// The name is lower-cased and stripped of characters container runtimes
    /// reject; an empty result falls back to the default project name.
    #[must_use]
    pub fn project_name_for(compose_file: &Path) -> String {
        let dir_name = compose_file
            .canonicalize()
            .ok()
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name: String = dir_name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if name.is_empty() {
            DEFAULT_PROJECT_NAME.to_string()
        } else {
            name
        }
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            link_env: false,
            force_build: false,
        }
    }
}

//! System-wide constants and default names.

use std::time::Duration;

/// Composition file names searched, in order, when none is given.
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// Build file used when a `build` section names no `dockerfile`.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Build context used when a `build` section names no `context`.
pub const DEFAULT_BUILD_CONTEXT: &str = ".";

/// Project name used when none can be derived from the working directory.
pub const DEFAULT_PROJECT_NAME: &str = "composer";

/// Delay between two readiness probes of the same service.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// Time a service is given to become ready after being started.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable that overrides the project name.
pub const PROJECT_NAME_ENV: &str = "COMPOSER_PROJECT_NAME";

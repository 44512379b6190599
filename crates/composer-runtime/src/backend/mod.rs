//! Runtime adapter abstraction.
//!
//! Composer never builds images or runs containers itself: it issues
//! requests through [`RuntimeAdapter`] and observes the signals the runtime
//! reports back. Retry policy, if any, belongs to the implementor.

pub mod docker;
pub mod dry_run;

use std::collections::BTreeMap;

use composer_common::error::Result;
use composer_common::types::{Handle, ImageRef};
use composer_compose::model::{PortMapping, ServiceSpec, VolumeMount};

/// Fully resolved configuration for starting one service container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    /// Service the container belongs to.
    pub service: String,
    /// Project the service belongs to.
    pub project: String,
    /// Container name, unique per project.
    pub container_name: String,
    /// Port mappings.
    pub ports: Vec<PortMapping>,
    /// Environment variables, link variables included when enabled.
    pub env: BTreeMap<String, String>,
    /// Volume mounts.
    pub volumes: Vec<VolumeMount>,
    /// Command override.
    pub command: Option<Vec<String>>,
}

impl StartRequest {
    /// Builds the request for `service` with the given resolved environment.
    #[must_use]
    pub fn new(project: &str, service: &ServiceSpec, env: BTreeMap<String, String>) -> Self {
        Self {
            service: service.name.clone(),
            project: project.to_string(),
            container_name: format!("{project}-{}-1", service.name),
            ports: service.ports.clone(),
            env,
            volumes: service.volumes.clone(),
            command: service.command.clone(),
        }
    }
}

/// Readiness signal reported by a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The service accepts work.
    Ready,
    /// Still starting; probe again later.
    NotYet,
    /// The service will not become ready.
    Failed(String),
}

/// Container runtime collaborator.
///
/// Calls are blocking; the scheduler runs them off the async executor.
pub trait RuntimeAdapter: Send + Sync {
    /// Builds or pulls the image of a service.
    ///
    /// `force` requests a rebuild of `build` services even when an image
    /// already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be produced.
    fn build(&self, service: &ServiceSpec, force: bool) -> Result<ImageRef>;

    /// Starts a container for the request from the given image.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    fn start(&self, request: &StartRequest, image: &ImageRef) -> Result<Handle>;

    /// Probes whether a started container is ready.
    fn probe_ready(&self, handle: &Handle) -> Readiness;

    /// Stops and discards the container started for `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped.
    fn stop(&self, service: &str, handle: &Handle) -> Result<()>;

    /// Returns whether this runtime is usable on the current host.
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_compose::load_str;

    #[test]
    fn start_request_names_container_after_project_and_service() {
        let spec = load_str(
            r"
services:
  web:
    image: nginx
    ports: ['8080:80']
    command: nginx -g 'daemon off;'
",
        )
        .expect("load");
        let web = spec.service("web").expect("web");
        let request = StartRequest::new("flask", web, web.environment.clone());
        assert_eq!(request.container_name, "flask-web-1");
        assert_eq!(request.project, "flask");
        assert_eq!(request.ports.len(), 1);
        assert!(request.command.is_some());
    }
}

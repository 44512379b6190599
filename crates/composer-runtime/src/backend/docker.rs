//! Runtime adapter driving the `docker` command-line client.
//!
//! Every service of a project joins a shared `<project>_default` network
//! under its service name, so services reach their dependencies by name.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use composer_common::error::{ComposerError, Result};
use composer_common::types::{Handle, ImageRef};
use composer_compose::model::{ImageSource, MountSource, ServiceSpec};

use super::{Readiness, RuntimeAdapter, StartRequest};

/// Label carrying the project name on every container.
const PROJECT_LABEL: &str = "composer.project";
/// Label carrying the service name on every container.
const SERVICE_LABEL: &str = "composer.service";
/// `docker inspect` template: container status, then health status if any.
const INSPECT_FORMAT: &str = "{{.State.Status}}|{{if .State.Health}}{{.State.Health.Status}}{{end}}";

/// Adapter that shells out to the Docker CLI.
#[derive(Debug)]
pub struct DockerCliAdapter {
    binary: Option<PathBuf>,
    project: String,
    working_dir: PathBuf,
    network_ready: Mutex<bool>,
}

impl DockerCliAdapter {
    /// Creates an adapter for `project`, resolving relative build contexts
    /// and bind mounts against `working_dir`.
    #[must_use]
    pub fn new(project: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        let binary = which::which("docker").ok();
        if binary.is_none() {
            tracing::warn!("docker binary not found in PATH");
        }
        Self {
            binary,
            project: project.into(),
            working_dir: working_dir.into(),
            network_ready: Mutex::new(false),
        }
    }

    /// Name of the project network.
    #[must_use]
    pub fn network_name(&self) -> String {
        format!("{}_default", self.project)
    }

    /// Runs `docker` with `args`, returning trimmed stdout or the error text.
    fn docker<I, S>(&self, args: I) -> std::result::Result<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let binary = self
            .binary
            .as_deref()
            .ok_or_else(|| "docker binary not found in PATH".to_string())?;
        let mut cmd = Command::new(binary);
        let _ = cmd.args(args);
        tracing::debug!(command = ?cmd, "invoking docker");

        let output = cmd.output().map_err(|e| format!("failed to run docker: {e}"))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(if stderr.is_empty() {
                format!("docker exited with {}", output.status)
            } else {
                stderr
            })
        }
    }

    fn image_exists(&self, image: &str) -> bool {
        self.docker(["image", "inspect", "--format", "{{.Id}}", image])
            .is_ok()
    }

    fn ensure_network(&self) -> std::result::Result<String, String> {
        let network = self.network_name();
        let mut ready = self
            .network_ready
            .lock()
            .map_err(|_| "network lock poisoned".to_string())?;
        if !*ready {
            if self.docker(["network", "inspect", network.as_str()]).is_err() {
                tracing::info!(network = %network, "creating project network");
                let label = format!("{PROJECT_LABEL}={}", self.project);
                let _ = self.docker([
                    "network",
                    "create",
                    "--label",
                    label.as_str(),
                    network.as_str(),
                ])?;
            }
            *ready = true;
        }
        Ok(network)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.starts_with("~") {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Builds the `docker run` argument list for a request.
    fn run_args(&self, request: &StartRequest, image: &ImageRef, network: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--detach".into(),
            "--name".into(),
            request.container_name.clone(),
            "--label".into(),
            format!("{PROJECT_LABEL}={}", request.project),
            "--label".into(),
            format!("{SERVICE_LABEL}={}", request.service),
            "--network".into(),
            network.to_string(),
            "--network-alias".into(),
            request.service.clone(),
        ];
        for port in &request.ports {
            args.push("--publish".into());
            args.push(port.to_string());
        }
        for (key, value) in &request.env {
            args.push("--env".into());
            args.push(format!("{key}={value}"));
        }
        for mount in &request.volumes {
            let mut spec = match &mount.source {
                MountSource::Named(name) => format!("{}_{name}:{}", request.project, mount.target),
                MountSource::Bind(path) => {
                    format!("{}:{}", self.resolve(path).display(), mount.target)
                }
                MountSource::Anonymous => mount.target.clone(),
            };
            if mount.read_only {
                spec.push_str(":ro");
            }
            args.push("--volume".into());
            args.push(spec);
        }
        args.push(image.as_str().to_string());
        if let Some(command) = &request.command {
            args.extend(command.iter().cloned());
        }
        args
    }
}

impl RuntimeAdapter for DockerCliAdapter {
    fn build(&self, service: &ServiceSpec, force: bool) -> Result<ImageRef> {
        let runtime_error = |reason: String| ComposerError::Runtime {
            service: service.name.clone(),
            reason,
        };

        match &service.source {
            ImageSource::Image(reference) => {
                if !self.image_exists(reference) {
                    tracing::info!(service = %service.name, image = %reference, "pulling image");
                    let _ = self.docker(["pull", reference.as_str()]).map_err(runtime_error)?;
                }
                Ok(ImageRef::new(reference.clone()))
            }
            ImageSource::Build {
                context,
                dockerfile,
            } => {
                let tag = format!("{}-{}:latest", self.project, service.name);
                if !force && self.image_exists(&tag) {
                    tracing::debug!(service = %service.name, image = %tag, "image present, skipping build");
                    return Ok(ImageRef::new(tag));
                }
                let context = self.resolve(context);
                let dockerfile = context.join(dockerfile);
                tracing::info!(
                    service = %service.name,
                    context = %context.display(),
                    "building image"
                );
                let _ = self
                    .docker([
                        OsStr::new("build"),
                        OsStr::new("--tag"),
                        OsStr::new(&tag),
                        OsStr::new("--file"),
                        dockerfile.as_os_str(),
                        context.as_os_str(),
                    ])
                    .map_err(runtime_error)?;
                Ok(ImageRef::new(tag))
            }
        }
    }

    fn start(&self, request: &StartRequest, image: &ImageRef) -> Result<Handle> {
        let runtime_error = |reason: String| ComposerError::Runtime {
            service: request.service.clone(),
            reason,
        };
        let network = self.ensure_network().map_err(runtime_error)?;

        // A container left over from a previous run would block the name.
        let _ = self.docker(["rm", "--force", request.container_name.as_str()]);

        let id = self
            .docker(self.run_args(request, image, &network))
            .map_err(runtime_error)?;
        tracing::info!(service = %request.service, id = %id, "container started");
        Ok(Handle::new(id))
    }

    fn probe_ready(&self, handle: &Handle) -> Readiness {
        match self.docker(["inspect", "--format", INSPECT_FORMAT, handle.as_str()]) {
            Ok(output) => parse_inspect(&output),
            Err(reason) => Readiness::Failed(reason),
        }
    }

    fn stop(&self, service: &str, handle: &Handle) -> Result<()> {
        tracing::info!(service = %service, id = %handle, "removing container");
        let _ = self
            .docker(["rm", "--force", handle.as_str()])
            .map_err(|reason| ComposerError::Runtime {
                service: service.to_string(),
                reason: format!("cannot remove container {handle}: {reason}"),
            })?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }
}

/// Maps `status|health` output of `docker inspect` to a readiness signal.
///
/// A running container without a healthcheck is ready; with one, it is
/// ready once healthy.
fn parse_inspect(output: &str) -> Readiness {
    let (status, health) = output.split_once('|').unwrap_or((output, ""));
    match (status.trim(), health.trim()) {
        ("running", "" | "healthy") => Readiness::Ready,
        ("running", "unhealthy") => Readiness::Failed("container is unhealthy".into()),
        ("running" | "created" | "restarting", _) => Readiness::NotYet,
        (status @ ("exited" | "dead" | "removing" | "paused"), _) => {
            Readiness::Failed(format!("container is {status}"))
        }
        (status, _) => Readiness::Failed(format!("unexpected container status \"{status}\"")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_compose::load_str;

    fn adapter() -> DockerCliAdapter {
        DockerCliAdapter {
            binary: None,
            project: "flask".into(),
            working_dir: PathBuf::from("/srv/app"),
            network_ready: Mutex::new(false),
        }
    }

    #[test]
    fn inspect_running_without_healthcheck_is_ready() {
        assert_eq!(parse_inspect("running|"), Readiness::Ready);
    }

    #[test]
    fn inspect_health_states() {
        assert_eq!(parse_inspect("running|healthy"), Readiness::Ready);
        assert_eq!(parse_inspect("running|starting"), Readiness::NotYet);
        assert!(matches!(parse_inspect("running|unhealthy"), Readiness::Failed(_)));
    }

    #[test]
    fn inspect_exited_is_failed() {
        assert_eq!(
            parse_inspect("exited|"),
            Readiness::Failed("container is exited".into())
        );
    }

    #[test]
    fn run_args_carry_ports_env_and_volumes() {
        let spec = load_str(
            r"
services:
  web:
    build: ./services/api
    ports: ['5001:5000']
    environment:
      DATABASE_URL: postgres://db:5432/users
    volumes:
      - ./services/api:/usr/src/app
      - pgdata:/data:ro
    command: [python, manage.py, run]
volumes:
  pgdata:
",
        )
        .expect("load");
        let web = spec.service("web").expect("web");
        let adapter = adapter();
        let request = StartRequest::new("flask", web, web.environment.clone());
        let args = adapter.run_args(&request, &ImageRef::new("flask-web:latest"), "flask_default");

        let joined = args.join(" ");
        assert!(joined.starts_with("run --detach --name flask-web-1"), "got: {joined}");
        assert!(joined.contains("--network flask_default --network-alias web"));
        assert!(joined.contains("--publish 5001:5000"));
        assert!(joined.contains("--env DATABASE_URL=postgres://db:5432/users"));
        assert!(joined.contains("--volume /srv/app/./services/api:/usr/src/app"));
        assert!(joined.contains("--volume flask_pgdata:/data:ro"));
        assert!(joined.ends_with("flask-web:latest python manage.py run"), "got: {joined}");
    }

    #[test]
    fn missing_binary_is_unavailable_and_fails_builds() {
        let adapter = adapter();
        assert!(!adapter.is_available());
        let spec = load_str("services:\n  db:\n    image: postgres\n").expect("load");
        let err = adapter
            .build(spec.service("db").expect("db"), false)
            .unwrap_err();
        assert!(matches!(err, ComposerError::Runtime { ref service, .. } if service == "db"));
    }

    #[test]
    fn stop_failure_is_attributed_to_service() {
        let err = adapter().stop("cache", &Handle::new("9b1e4f")).unwrap_err();
        match err {
            ComposerError::Runtime { service, reason } => {
                assert_eq!(service, "cache");
                assert!(reason.contains("9b1e4f"), "got: {reason}");
            }
            other => panic!("expected Runtime, got {other:?}"),
        }
    }
}

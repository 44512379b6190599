//! Startup scheduler that executes a start plan against a runtime.
//!
//! Batches run one after another. Within a batch every service is launched
//! as its own task; the scheduler waits at the batch boundary until each of
//! them is `Ready` or `Failed`. The first failure cancels the rest of the
//! batch and no further batch is launched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use composer_common::config::ComposerConfig;
use composer_common::error::{ComposerError, Result};
use composer_common::types::{Handle, ServiceState};
use composer_compose::model::{CompositionSpec, ServiceSpec};
use composer_compose::plan::StartPlan;
use composer_compose::resolver::link_environment;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::backend::{Readiness, RuntimeAdapter, StartRequest};
use crate::report::RunReport;

/// Executes start plans.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: ComposerConfig,
}

impl Scheduler {
    /// Creates a scheduler with the given configuration.
    #[must_use]
    pub const fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Executes `plan` for the services of `spec`.
    ///
    /// The returned report holds the final state of every planned service.
    /// A service that was never launched because a dependency failed is
    /// `Failed` with [`ComposerError::DependencyFailed`]; one that was never
    /// launched for any other reason stays `Pending` and is listed as skipped.
    #[instrument(
        name = "up",
        skip(self, spec, plan, adapter),
        fields(project = %self.config.project_name, batches = plan.len())
    )]
    pub async fn run(
        &self,
        spec: &CompositionSpec,
        plan: &StartPlan,
        adapter: Arc<dyn RuntimeAdapter>,
    ) -> RunReport {
        let mut report = RunReport::new(plan);
        let mut environments = if self.config.link_env {
            link_environment(spec)
        } else {
            spec.services
                .values()
                .map(|s| (s.name.clone(), s.environment.clone()))
                .collect()
        };

        for (index, batch) in plan.batches().iter().enumerate() {
            info!(batch = index, services = ?batch, "starting batch");
            self.run_batch(spec, batch, &adapter, &mut environments, &mut report)
                .await;
            if report.has_failures() {
                error!(batch = index, failed = ?report.failed_services(), "batch failed, stopping");
                break;
            }
        }

        propagate_failures(spec, plan, &mut report);
        if report.is_success() {
            info!(services = plan.service_count(), "all services ready");
        }
        report
    }

    async fn run_batch(
        &self,
        spec: &CompositionSpec,
        batch: &[String],
        adapter: &Arc<dyn RuntimeAdapter>,
        environments: &mut BTreeMap<String, BTreeMap<String, String>>,
        report: &mut RunReport,
    ) {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut task_names = HashMap::new();

        for name in batch {
            let Some(service) = spec.service(name) else {
                warn!(service = %name, "planned service missing from composition");
                cancel.cancel();
                report.mark_failed(
                    name,
                    ComposerError::UnknownService { name: name.clone() },
                );
                break;
            };
            let env = environments.remove(name).unwrap_or_default();
            let request = StartRequest::new(&self.config.project_name, service, env);
            let task = ServiceTask {
                service: service.clone(),
                request,
                adapter: Arc::clone(adapter),
                force_build: self.config.force_build,
                probe_interval: self.config.probe_interval,
                ready_timeout: self.config.ready_timeout,
                cancel: cancel.clone(),
            };
            let _ = report.transition(name, ServiceState::Starting);
            let handle = tasks.spawn(task.run());
            let _ = task_names.insert(handle.id(), name.clone());
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (name, outcome) = match joined {
                Ok((id, outcome)) => (task_names.remove(&id), outcome),
                Err(join_error) => {
                    let name = task_names.remove(&join_error.id());
                    let reason = format!("service task aborted: {join_error}");
                    let outcome = Err(ComposerError::Runtime {
                        service: name.clone().unwrap_or_default(),
                        reason,
                    });
                    (name, outcome)
                }
            };
            let Some(name) = name else {
                continue;
            };
            match outcome {
                Ok(handle) => report.mark_ready(&name, handle),
                Err(err) => {
                    if !cancel.is_cancelled() {
                        warn!(service = %name, error = %err, "cancelling rest of batch");
                        cancel.cancel();
                    }
                    report.mark_failed(&name, err);
                }
            }
        }
    }
}

/// Marks never-launched services after a failed run.
///
/// A service cancelled because a batch sibling failed is not a root cause:
/// it maps to the first failure of its batch that was not a cancellation.
/// Plan order is topological, so a service's dependencies are settled before
/// the service itself is examined.
fn propagate_failures(spec: &CompositionSpec, plan: &StartPlan, report: &mut RunReport) {
    let failures = report.failures();
    let cause = failures
        .iter()
        .find(|err| !matches!(err, ComposerError::Cancelled { .. }))
        .and_then(ComposerError::service)
        .map(String::from);
    let mut roots: HashMap<String, String> = failures
        .iter()
        .filter_map(|err| {
            let service = err.service()?.to_string();
            let root = match (err, &cause) {
                (ComposerError::Cancelled { .. }, Some(cause)) => cause.clone(),
                _ => service.clone(),
            };
            Some((service, root))
        })
        .collect();

    for name in plan.services() {
        if report.state(name) != Some(ServiceState::Pending) {
            continue;
        }
        let mut deps: Vec<&str> = spec
            .service(name)
            .map(|s| s.depends_on.iter().map(String::as_str).collect())
            .unwrap_or_default();
        deps.sort_unstable();

        let root = deps.iter().find_map(|dep| roots.get(*dep).cloned());
        if let Some(root) = root {
            report.mark_failed(
                name,
                ComposerError::DependencyFailed {
                    service: name.to_string(),
                    root: root.clone(),
                },
            );
            let _ = roots.insert(name.to_string(), root);
        } else {
            report.mark_skipped(name);
        }
    }
}

/// Everything one service task needs, owned so it can run on the executor.
struct ServiceTask {
    service: ServiceSpec,
    request: StartRequest,
    adapter: Arc<dyn RuntimeAdapter>,
    force_build: bool,
    probe_interval: Duration,
    ready_timeout: Duration,
    cancel: CancellationToken,
}

impl ServiceTask {
    async fn run(self) -> Result<Handle> {
        let name = self.service.name.clone();
        let force = self.force_build;

        let service = self.service.clone();
        let image = self
            .blocking(move |adapter| adapter.build(&service, force))
            .await?;
        if self.cancel.is_cancelled() {
            return Err(ComposerError::Cancelled { service: name });
        }

        let request = self.request.clone();
        let handle = self
            .blocking(move |adapter| adapter.start(&request, &image))
            .await?;

        match self.wait_ready(&handle).await {
            Ok(()) => Ok(handle),
            Err(err @ ComposerError::Cancelled { .. }) => {
                let stop_name = name.clone();
                let stop_handle = handle.clone();
                if let Err(stop_err) = self
                    .blocking(move |adapter| adapter.stop(&stop_name, &stop_handle))
                    .await
                {
                    warn!(service = %name, error = %stop_err, "failed to stop cancelled service");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Polls readiness until ready, failed, timed out, or cancelled.
    async fn wait_ready(&self, handle: &Handle) -> Result<()> {
        let name = &self.service.name;
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            let probe_handle = handle.clone();
            let readiness = self
                .blocking(move |adapter| Ok(adapter.probe_ready(&probe_handle)))
                .await?;
            match readiness {
                Readiness::Ready => return Ok(()),
                Readiness::Failed(reason) => {
                    return Err(ComposerError::Runtime {
                        service: name.clone(),
                        reason,
                    });
                }
                Readiness::NotYet if Instant::now() >= deadline => {
                    return Err(ComposerError::Runtime {
                        service: name.clone(),
                        reason: format!(
                            "not ready after {:.1}s",
                            self.ready_timeout.as_secs_f64()
                        ),
                    });
                }
                Readiness::NotYet => {}
            }

            tokio::select! {
                () = self.cancel.cancelled() => {
                    return Err(ComposerError::Cancelled { service: name.clone() });
                }
                () = tokio::time::sleep(self.probe_interval) => {}
            }
        }
    }

    /// Runs a blocking adapter call off the async executor.
    async fn blocking<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RuntimeAdapter) -> Result<T> + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || call(adapter.as_ref()))
            .await
            .map_err(|e| ComposerError::Runtime {
                service: self.service.name.clone(),
                reason: format!("runtime call aborted: {e}"),
            })?
    }
}

//! `composer up` — Build, start, and wait for services in dependency order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use composer_common::config::ComposerConfig;
use composer_runtime::backend::RuntimeAdapter;
use composer_runtime::backend::docker::DockerCliAdapter;
use composer_runtime::backend::dry_run::DryRunAdapter;
use composer_runtime::Scheduler;

use super::Project;
use crate::output;

/// Arguments for the `up` command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Services to start, along with their dependencies. Starts all when empty.
    pub services: Vec<String>,

    /// Rebuild images of `build` services even if they exist.
    #[arg(long)]
    pub build: bool,

    /// Walk the plan without touching the container runtime.
    #[arg(long)]
    pub dry_run: bool,

    /// Inject `<DEP>_HOST` and `<DEP>_PORT` variables for each dependency.
    #[arg(long)]
    pub link_env: bool,

    /// Seconds a started service may take to become ready.
    #[arg(long, value_name = "SECS")]
    pub ready_timeout: Option<u64>,
}

/// Executes the `up` command.
///
/// # Errors
///
/// Returns an error if planning fails or any service fails to become ready.
pub async fn execute(project: &Project, args: UpArgs) -> anyhow::Result<()> {
    let total_start = Instant::now();
    let plan = project.plan(&args.services)?;

    let mut config = ComposerConfig::for_project(project.name.clone());
    config.force_build = args.build;
    config.link_env = args.link_env;
    if let Some(secs) = args.ready_timeout {
        config.ready_timeout = Duration::from_secs(secs);
    }

    let adapter: Arc<dyn RuntimeAdapter> = if args.dry_run {
        Arc::new(DryRunAdapter::new(project.name.clone()))
    } else {
        let docker = DockerCliAdapter::new(project.name.clone(), project.working_dir());
        if !docker.is_available() {
            anyhow::bail!("docker is not available; install it or use --dry-run");
        }
        Arc::new(docker)
    };

    eprint!("{}", output::format_plan(&project.name, &plan));
    let report = Scheduler::new(config).run(&project.spec, &plan, adapter).await;
    eprint!("{}", output::format_report(&report, total_start.elapsed()));

    if report.is_success() {
        Ok(())
    } else {
        anyhow::bail!("failed to start: {}", report.failed_services().join(", "))
    }
}

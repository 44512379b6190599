//! `composer plan` — Print the startup batches without executing them.

use clap::Args;

use super::Project;
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Services to plan, along with their dependencies. Plans all when empty.
    pub services: Vec<String>,
}

/// Executes the `plan` command.
///
/// # Errors
///
/// Returns an error if graph construction or planning fails.
pub fn execute(project: &Project, args: &PlanArgs) -> anyhow::Result<()> {
    let plan = project.plan(&args.services)?;
    print!("{}", output::format_plan(&project.name, &plan));
    Ok(())
}

//! `composer config` — Print the validated composition.

use clap::Args;

use super::Project;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print only service names, one per line.
    #[arg(long)]
    pub services: bool,
}

/// Executes the `config` command.
///
/// # Errors
///
/// Returns an error if the composition cannot be serialized.
pub fn execute(project: &Project, args: &ConfigArgs) -> anyhow::Result<()> {
    if args.services {
        for name in project.spec.service_names() {
            println!("{name}");
        }
        return Ok(());
    }
    print!("{}", serde_yaml::to_string(&project.spec)?);
    Ok(())
}

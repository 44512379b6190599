//! CLI command definitions and dispatch.

pub mod config;
pub mod plan;
pub mod up;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use composer_common::config::ComposerConfig;
use composer_common::constants::{DEFAULT_COMPOSE_FILES, PROJECT_NAME_ENV};
use composer_compose::{CompositionSpec, DependencyGraph, StartPlan};

/// Composer — start multi-service compositions in dependency order.
#[derive(Parser, Debug)]
#[command(name = "composer", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the composition file.
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,

    /// Project name used to prefix images, containers, and volumes.
    #[arg(short = 'p', long = "project-name", global = true, env = PROJECT_NAME_ENV)]
    pub project_name: Option<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build, start, and wait for services in dependency order.
    Up(up::UpArgs),
    /// Print the startup batches without starting anything.
    Plan(plan::PlanArgs),
    /// Print the validated composition as YAML.
    Config(config::ConfigArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let project = Project::open(cli.file.as_deref(), cli.project_name)?;
    match cli.command {
        Command::Up(args) => up::execute(&project, args).await,
        Command::Plan(args) => plan::execute(&project, &args),
        Command::Config(args) => config::execute(&project, &args),
    }
}

/// A loaded composition together with where it came from.
#[derive(Debug)]
pub struct Project {
    /// Composition file that was loaded.
    pub file: PathBuf,
    /// Project name.
    pub name: String,
    /// Validated composition.
    pub spec: CompositionSpec,
}

impl Project {
    /// Locates and loads the composition file.
    ///
    /// # Errors
    ///
    /// Returns an error if no file is found or the file is invalid.
    pub fn open(file: Option<&Path>, name: Option<String>) -> anyhow::Result<Self> {
        let file = match file {
            Some(file) => file.to_path_buf(),
            None => {
                let cwd = std::env::current_dir().context("cannot read working directory")?;
                composer_compose::find_compose_file(&cwd).with_context(|| {
                    format!(
                        "no composition file found in {} (looked for {})",
                        cwd.display(),
                        DEFAULT_COMPOSE_FILES.join(", ")
                    )
                })?
            }
        };
        let spec = composer_compose::load_file(&file)?;
        let name = name.unwrap_or_else(|| ComposerConfig::project_name_for(&file));
        tracing::debug!(file = %file.display(), project = %name, "composition loaded");
        Ok(Self { file, name, spec })
    }

    /// Directory relative paths in the composition are resolved against.
    pub fn working_dir(&self) -> PathBuf {
        self.file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    /// Computes the start plan for `services` and their dependencies, or
    /// for every service when `services` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown services or dependencies, or on a cycle.
    pub fn plan(&self, services: &[String]) -> anyhow::Result<StartPlan> {
        let graph = DependencyGraph::build(&self.spec)?;
        let plan = if services.is_empty() {
            StartPlan::compute(&graph)?
        } else {
            StartPlan::compute_for(&graph, &graph.closure(services)?)?
        };
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(yaml: &str) -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("compose.yaml");
        std::fs::write(&file, yaml).expect("write");
        let project = Project::open(Some(file.as_path()), Some("demo".into())).expect("open");
        (dir, project)
    }

    #[test]
    fn cli_parses_global_and_up_flags() {
        let cli = Cli::try_parse_from([
            "composer", "-f", "stack.yml", "up", "--build", "--ready-timeout", "5", "web",
        ])
        .expect("parse");
        assert_eq!(cli.file.as_deref(), Some(Path::new("stack.yml")));
        let Command::Up(args) = cli.command else {
            panic!("expected up");
        };
        assert!(args.build);
        assert!(!args.dry_run);
        assert_eq!(args.ready_timeout, Some(5));
        assert_eq!(args.services, vec!["web"]);
    }

    #[test]
    fn plan_for_selection_includes_dependencies() {
        let (_dir, project) = project(
            "services:\n  web: { image: x, depends_on: [db] }\n  db: { image: y }\n  docs: { image: z }\n",
        );
        let plan = project.plan(&["web".to_string()]).expect("plan");
        assert_eq!(plan.services().collect::<Vec<_>>(), vec!["db", "web"]);
        assert_eq!(project.working_dir(), project.file.parent().expect("parent"));
    }

    #[test]
    fn plan_rejects_unknown_selection() {
        let (_dir, project) = project("services:\n  db: { image: y }\n");
        let err = project.plan(&["ghost".to_string()]).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn project_name_defaults_to_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = dir.path().join("My-App");
        std::fs::create_dir(&app).expect("mkdir");
        let file = app.join("compose.yaml");
        std::fs::write(&file, "services:\n  db: { image: y }\n").expect("write");
        let project = Project::open(Some(file.as_path()), None).expect("open");
        assert_eq!(project.name, "my-app");
    }
}

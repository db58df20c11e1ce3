//! CLI command definitions and dispatch.

pub mod generate;
pub mod plan;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use kmt_compose::catalog::ServiceCatalog;
use kmt_compose::definition::{ApplicationDefinition, EnvironmentDefinition};
use kmt_compose::loader;

/// kmt — deployment manifests from versioned service definitions.
#[derive(Parser, Debug)]
#[command(name = "kmt", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve services and write deployment manifests.
    Generate(generate::GenerateArgs),
    /// Show the resolved services in dependency order without writing anything.
    Plan(plan::PlanArgs),
}

/// Definition inputs shared by every command.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Directory holding the service definitions (searched recursively).
    #[arg(short = 's', long = "service-defs", value_name = "DIR")]
    pub service_defs: PathBuf,

    /// Application definition file.
    #[arg(short = 'A', long = "application", value_name = "FILE")]
    pub application: PathBuf,

    /// Where the environment definition comes from.
    #[command(flatten)]
    pub environment: EnvironmentSource,
}

/// Environment definition given as a file or looked up in a directory.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct EnvironmentSource {
    /// Environment definition file.
    #[arg(short = 'E', long = "environment", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Directory searched for the application's environment definition.
    #[arg(short = 'e', long = "environment-defs", value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

/// Every decoded input of a run.
#[derive(Debug)]
pub struct Inputs {
    /// Known service definitions.
    pub catalog: ServiceCatalog,
    /// Requested services.
    pub application: ApplicationDefinition,
    /// Environment overrides and gateways.
    pub environment: EnvironmentDefinition,
}

impl InputArgs {
    /// Loads the catalog and both definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if any input cannot be found, read, or decoded.
    pub async fn load(&self) -> anyhow::Result<Inputs> {
        let (catalog, application) = tokio::try_join!(
            loader::load_catalog(&self.service_defs),
            loader::load_application(&self.application),
        )
        .context("failed to load definitions")?;

        let environment_file = match (&self.environment.file, &self.environment.dir) {
            (Some(file), _) => file.clone(),
            (None, Some(dir)) => loader::find_environment_file(dir, &application.environment.name)?,
            (None, None) => {
                anyhow::bail!("an environment definition file or directory is required")
            }
        };
        let environment = loader::load_environment(&environment_file)
            .await
            .with_context(|| {
                format!(
                    "failed to load environment from {}",
                    environment_file.display()
                )
            })?;

        Ok(Inputs {
            catalog,
            application,
            environment,
        })
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Generate(args) => generate::execute(args).await,
        Command::Plan(args) => plan::execute(args).await,
    }
}

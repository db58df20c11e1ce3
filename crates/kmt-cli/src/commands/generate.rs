//! `kmt generate` — Resolve services and write deployment manifests.

use std::path::PathBuf;

use clap::Args;
use kmt_common::config::GeneratorConfig;
use kmt_common::constants::{DEFAULT_DEPLOYMENT_TEMPLATE, DEFAULT_ENV_CONSTRUCTOR};
use kmt_common::error::{KmtError, Result};
use kmt_common::types::OutputFormat;
use kmt_compose::emitter::DeploymentTemplate;
use kmt_compose::{loader, pipeline};

use super::InputArgs;

/// Arguments for the `generate` command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Definition inputs.
    #[command(flatten)]
    pub input: InputArgs,

    /// Directory the manifests are written to.
    #[arg(short = 'o', long = "output", env = "KMT_OUTPUT", default_value = ".")]
    pub output: PathBuf,

    /// Output layout (`ksonnet` or `kustomize`).
    #[arg(
        short = 'f',
        long = "format",
        env = "KMT_FORMAT",
        default_value_t = OutputFormat::Ksonnet
    )]
    pub format: OutputFormat,

    /// Deployment template used for per-service descriptors (ksonnet only).
    ///
    /// Defaults to `./deployment-template.jsonnet`, which may be absent.
    #[arg(short = 'D', long = "deployment-template", env = "KMT_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Constructor expression placed in `.withEnv(...)` lines.
    #[arg(long, default_value = DEFAULT_ENV_CONSTRUCTOR)]
    pub env_constructor: String,
}

impl GenerateArgs {
    fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            output_dir: self.output.clone(),
            output_format: self.format,
            deployment_template: self
                .template
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOYMENT_TEMPLATE)),
            env_constructor: self.env_constructor.clone(),
        }
    }
}

/// Reads the deployment template for a ksonnet run.
///
/// A missing template is skipped with a warning when it is the default
/// one, and is an error when it was given explicitly.
async fn load_template(
    config: &GeneratorConfig,
    explicit: bool,
) -> Result<Option<DeploymentTemplate>> {
    if config.output_format != OutputFormat::Ksonnet {
        return Ok(None);
    }
    let path = &config.deployment_template;
    if !path.is_file() {
        if explicit {
            return Err(KmtError::Config {
                message: format!(
                    "--deployment-template must name an existing template: {}",
                    path.display()
                ),
            });
        }
        tracing::warn!(
            template = %path.display(),
            "deployment template not found, deployment descriptors skipped"
        );
        return Ok(None);
    }
    let text = loader::read_text(path).await?;
    Ok(Some(
        DeploymentTemplate::new(&text).with_env_constructor(config.env_constructor.as_str()),
    ))
}

/// Executes the `generate` command.
///
/// Loads every definition, resolves and overrides the requested services,
/// renders all artifacts, and writes them once rendering succeeded.
///
/// # Errors
///
/// Returns an error if loading, resolution, overriding, rendering, or
/// writing fails.
pub async fn execute(args: GenerateArgs) -> anyhow::Result<()> {
    let inputs = args.input.load().await?;
    let config = args.config();
    let template = load_template(&config, args.template.is_some()).await?;

    let written = pipeline::generate(
        &inputs.catalog,
        &inputs.application,
        &inputs.environment,
        &config,
        template.as_ref(),
    )
    .await?;

    tracing::info!(
        environment = %inputs.environment.environment.name,
        format = %config.output_format,
        output = %config.output_dir.display(),
        files = written.len(),
        "manifests generated"
    );
    Ok(())
}

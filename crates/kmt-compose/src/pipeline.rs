//! End-to-end generation: resolve, override, render, write.
//!
//! Rendering produces every artifact in memory before anything is
//! written, so a run that fails validation leaves the output directory
//! untouched.

use std::path::{Path, PathBuf};

use kmt_common::config::GeneratorConfig;
use kmt_common::constants::{
    CONFIG_MAP_FILE, DEPLOYMENT_EXTENSION, GATEWAY_SUFFIX, KUSTOMIZE_GATEWAYS_DIR,
    KUSTOMIZE_SERVICES_DIR, PARAMS_FILE,
};
use kmt_common::error::{KmtError, Result};
use kmt_common::types::OutputFormat;
use tokio::task::JoinSet;

use crate::catalog::ServiceSource;
use crate::definition::{ApplicationDefinition, EnvironmentDefinition};
use crate::emitter::{self, DeploymentTemplate};
use crate::overrides;
use crate::resolver::{self, ResolvedServices};

/// A rendered file, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path relative to the output directory.
    pub path: PathBuf,
    /// File contents.
    pub contents: String,
}

impl Artifact {
    fn new(path: impl Into<PathBuf>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }
}

/// Checks that both definitions target the same environment.
///
/// # Errors
///
/// Returns `KmtError::EnvironmentMismatch` if the names differ.
pub fn check_environment(
    application: &ApplicationDefinition,
    environment: &EnvironmentDefinition,
) -> Result<()> {
    if application.environment.name == environment.environment.name {
        Ok(())
    } else {
        Err(KmtError::EnvironmentMismatch {
            application: application.environment.name.clone(),
            environment: environment.environment.name.clone(),
        })
    }
}

/// Resolves the application's services and applies every override layer.
///
/// # Errors
///
/// Returns the first environment, resolution, or override error.
pub fn resolve<S: ServiceSource + ?Sized>(
    source: &S,
    application: &ApplicationDefinition,
    environment: &EnvironmentDefinition,
) -> Result<ResolvedServices> {
    check_environment(application, environment)?;
    let mut resolved = resolver::resolve_services(&application.requested(), source)?;
    overrides::apply_all(application, environment, &mut resolved)?;
    Ok(resolved)
}

fn render_params(resolved: &ResolvedServices) -> Result<String> {
    let params = emitter::export_params(resolved)?;
    let mut text = serde_json::to_string_pretty(&params)?;
    text.push('\n');
    Ok(text)
}

/// Renders the ksonnet layout: params, gateways, and deployments.
///
/// Deployments are skipped when `template` is `None`.
///
/// # Errors
///
/// Returns `KmtError::MissingParameter` or a gateway error.
pub fn render_ksonnet(
    resolved: &ResolvedServices,
    environment: &EnvironmentDefinition,
    template: Option<&DeploymentTemplate>,
) -> Result<Vec<Artifact>> {
    let mut artifacts = vec![Artifact::new(PARAMS_FILE, render_params(resolved)?)];
    for gateway in emitter::export_gateways(resolved, environment)? {
        let path = format!("{}{GATEWAY_SUFFIX}", gateway.name);
        artifacts.push(Artifact::new(path, gateway.render()));
    }
    if let Some(template) = template {
        for (name, service) in resolved {
            let path = format!("{name}.{DEPLOYMENT_EXTENSION}");
            artifacts.push(Artifact::new(path, template.render(service)));
        }
    }
    Ok(artifacts)
}

/// Renders the kustomize layout: per-service config maps and gateways.
///
/// # Errors
///
/// Returns `KmtError::MissingParameter` or a gateway error.
pub fn render_kustomize(
    resolved: &ResolvedServices,
    environment: &EnvironmentDefinition,
) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::with_capacity(resolved.len());
    for (name, service) in resolved {
        let path = Path::new(KUSTOMIZE_SERVICES_DIR).join(name).join(CONFIG_MAP_FILE);
        artifacts.push(Artifact::new(path, emitter::render_config_map(service)?));
    }
    for gateway in emitter::export_gateways(resolved, environment)? {
        let path = Path::new(KUSTOMIZE_GATEWAYS_DIR).join(format!("{}.yaml", gateway.name));
        artifacts.push(Artifact::new(path, gateway.render()));
    }
    Ok(artifacts)
}

/// Renders every artifact of the configured output format.
///
/// # Errors
///
/// Returns the first rendering error.
pub fn render_artifacts(
    resolved: &ResolvedServices,
    environment: &EnvironmentDefinition,
    config: &GeneratorConfig,
    template: Option<&DeploymentTemplate>,
) -> Result<Vec<Artifact>> {
    let artifacts = match config.output_format {
        OutputFormat::Ksonnet => render_ksonnet(resolved, environment, template)?,
        OutputFormat::Kustomize => render_kustomize(resolved, environment)?,
    };
    tracing::debug!(
        format = %config.output_format,
        artifacts = artifacts.len(),
        "artifacts rendered"
    );
    Ok(artifacts)
}

/// Writes artifacts under `output_dir`, creating directories as needed.
///
/// # Errors
///
/// Returns `KmtError::Io` for the first failed write.
pub async fn write_artifacts(output_dir: &Path, artifacts: Vec<Artifact>) -> Result<Vec<PathBuf>> {
    let mut tasks = JoinSet::new();
    for artifact in artifacts {
        let path = output_dir.join(&artifact.path);
        let _ = tasks.spawn(async move {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| KmtError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            tokio::fs::write(&path, artifact.contents)
                .await
                .map_err(|source| KmtError::Io {
                    path: path.clone(),
                    source,
                })?;
            Ok::<_, KmtError>(path)
        });
    }

    let mut written = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let path = joined.map_err(|e| KmtError::Config {
            message: format!("artifact writer task failed: {e}"),
        })??;
        tracing::info!(path = %path.display(), "artifact written");
        written.push(path);
    }
    written.sort();
    Ok(written)
}

/// Resolves, renders, and writes one generation run.
///
/// # Errors
///
/// Returns the first error of any stage. Nothing is written unless every
/// artifact rendered.
pub async fn generate<S: ServiceSource + ?Sized>(
    source: &S,
    application: &ApplicationDefinition,
    environment: &EnvironmentDefinition,
    config: &GeneratorConfig,
    template: Option<&DeploymentTemplate>,
) -> Result<Vec<PathBuf>> {
    let resolved = resolve(source, application, environment)?;
    let artifacts = render_artifacts(&resolved, environment, config, template)?;
    write_artifacts(&config.output_dir, artifacts).await
}

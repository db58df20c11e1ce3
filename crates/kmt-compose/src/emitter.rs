//! Manifest rendering.
//!
//! Every function here is a pure function of the final resolved set (plus
//! the environment definition for gateways). Nothing touches the
//! filesystem; see [`crate::pipeline`] for writing.

use std::fmt::Write as _;

use kmt_common::constants::{
    COMPONENT_NAME_MARKER, DEFAULT_ENV_CONSTRUCTOR, LABELS_MARKER, LINE_ENDING, PARAMS_REPLICAS,
    SELECTOR_JOINER, WITH_ENV_MARKER,
};
use kmt_common::error::{KmtError, Result};
use kmt_common::types::ParamValue;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::definition::{EnvironmentDefinition, SelectorKind};
use crate::resolver::{EnvironmentVariable, ResolvedService, ResolvedServices};

fn required_value<'s>(
    service: &ResolvedService,
    variable: &'s EnvironmentVariable,
) -> Result<&'s ParamValue> {
    variable.value.as_ref().ok_or_else(|| KmtError::MissingParameter {
        component: service.name.clone(),
        parameter: variable.key.clone(),
    })
}

/// Builds the shared parameters document.
///
/// Shape: `{global: {}, components: {<name>: {replicas, name, image, tag,
/// containerPort, <variable>: <value>...}}}`. `replicas` is always
/// [`PARAMS_REPLICAS`], whatever the resolved replica count.
///
/// # Errors
///
/// Returns `KmtError::MissingParameter` for the first variable without a
/// value. This is the last validation point of the pipeline.
pub fn export_params(resolved: &ResolvedServices) -> Result<Value> {
    let mut components = Map::new();
    for (name, service) in resolved {
        let mut component = Map::new();
        let _ = component.insert("replicas".into(), json!(PARAMS_REPLICAS));
        let _ = component.insert("name".into(), json!(name));
        let _ = component.insert("image".into(), json!(service.image));
        let _ = component.insert("tag".into(), json!(service.tag.to_string()));
        let _ = component.insert("containerPort".into(), json!(service.container_port()));
        for variable in &service.environment_variables {
            let value = required_value(service, variable)?;
            let _ = component.insert(variable.key.clone(), serde_json::to_value(value)?);
        }
        let _ = components.insert(name.clone(), Value::Object(component));
    }
    Ok(json!({ "global": {}, "components": components }))
}

/// A routing descriptor for one gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayDescriptor {
    /// Service the gateway routes to.
    pub name: String,
    /// Gateway port.
    pub port: u16,
    /// Label selector expression; empty for non-label selectors.
    pub selector: String,
}

impl GatewayDescriptor {
    /// Renders the three-line descriptor text.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "name: {}\nport: {}\nselector: {}\n",
            self.name, self.port, self.selector
        )
    }
}

/// Builds the label selector of `service`.
///
/// Each label becomes a `label(key)(value)` predicate, joined with `&&`.
/// The discriminator label is captured with a wildcard. Label values
/// `name` and `tag` stand for the service's own name and tag; any other
/// value naming a declared environment variable is replaced by that
/// variable's value, and is used literally otherwise.
///
/// # Errors
///
/// Returns `KmtError::MissingParameter` if a referenced variable has no value.
pub fn build_selector(service: &ResolvedService, discriminator: Option<&str>) -> Result<String> {
    let mut predicates = Vec::with_capacity(service.labels.len());
    for (key, value) in service.labels.iter() {
        if discriminator == Some(key) {
            predicates.push(format!("label({key})((.*))"));
            continue;
        }
        let resolved = match value {
            "name" => service.name.clone(),
            "tag" => service.tag.to_string(),
            other => match service.environment_variable(&other.to_lowercase()) {
                Some(variable) => required_value(service, variable)?.to_string(),
                None => other.to_string(),
            },
        };
        predicates.push(format!("label({key})({resolved})"));
    }
    Ok(predicates.join(SELECTOR_JOINER))
}

/// Builds one descriptor per environment service that declares a gateway.
///
/// # Errors
///
/// Returns `KmtError::OverrideTarget` if a gateway names a service that is
/// not resolved, or any error from [`build_selector`].
pub fn export_gateways(
    resolved: &ResolvedServices,
    environment: &EnvironmentDefinition,
) -> Result<Vec<GatewayDescriptor>> {
    let mut descriptors = Vec::new();
    for entry in &environment.services {
        let Some(gateway) = &entry.gateway else {
            continue;
        };
        let selector = match gateway.selector.kind {
            SelectorKind::Label => {
                let service = resolved.get(&entry.name).ok_or_else(|| KmtError::OverrideTarget {
                    service: entry.name.clone(),
                    kind: "gateway service",
                    name: entry.name.clone(),
                })?;
                build_selector(service, gateway.selector.discriminator.as_deref())?
            }
            SelectorKind::Unsupported => {
                tracing::warn!(
                    service = %entry.name,
                    "gateway selector type not supported, selector left empty"
                );
                String::new()
            }
        };
        descriptors.push(GatewayDescriptor {
            name: entry.name.clone(),
            port: gateway.port,
            selector,
        });
    }
    Ok(descriptors)
}

/// A line-oriented deployment template with three markers.
///
/// Lines containing `@@componentName@@`, `@@labels@@`, or `@@withEnv@@`
/// are expanded (first match wins, in that order); every other line is
/// copied through. All output lines end with CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTemplate {
    lines: Vec<String>,
    env_constructor: String,
}

impl DeploymentTemplate {
    /// Splits `text` into template lines.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            env_constructor: DEFAULT_ENV_CONSTRUCTOR.to_string(),
        }
    }

    /// Sets the constructor expression used in `.withEnv(...)` lines.
    #[must_use]
    pub fn with_env_constructor(mut self, constructor: impl Into<String>) -> Self {
        self.env_constructor = constructor.into();
        self
    }

    /// Renders the template for one service.
    #[must_use]
    pub fn render(&self, service: &ResolvedService) -> String {
        let mut out = String::new();
        for line in &self.lines {
            if line.contains(COMPONENT_NAME_MARKER) {
                out.push_str(&line.replace(COMPONENT_NAME_MARKER, &service.name));
                out.push_str(LINE_ENDING);
            } else if line.contains(LABELS_MARKER) {
                let labels: Vec<String> = service
                    .labels
                    .iter()
                    .map(|(key, value)| format!("  {key}: params.{value}"))
                    .collect();
                out.push_str(&labels.join(&format!(",{LINE_ENDING}")));
                out.push_str(LINE_ENDING);
            } else if line.contains(WITH_ENV_MARKER) {
                for variable in &service.environment_variables {
                    let _ = write!(
                        out,
                        "  .withEnv({}(\"{}\", params.{})){LINE_ENDING}",
                        self.env_constructor, variable.declared_name, variable.key
                    );
                }
            } else {
                out.push_str(line);
                out.push_str(LINE_ENDING);
            }
        }
        out
    }
}

/// Renders the `NAME=value` environment file of one service.
///
/// # Errors
///
/// Returns `KmtError::MissingParameter` for the first variable without a value.
pub fn render_config_map(service: &ResolvedService) -> Result<String> {
    let mut out = String::new();
    for variable in &service.environment_variables {
        let value = required_value(service, variable)?;
        let _ = write!(out, "{}={value}{LINE_ENDING}", variable.declared_name);
    }
    Ok(out)
}

//! Layered configuration overrides.
//!
//! Applied in a fixed order against the resolver's output:
//!
//! 1. application-layer environment-variable values,
//! 2. environment-layer environment-variable values (overwriting step 1),
//! 3. environment-layer labels,
//! 4. environment-layer replica counts.
//!
//! Environment-layer values therefore win over application-layer values,
//! which win over the declared defaults. Labels and replicas have no
//! application-layer path.

use std::collections::BTreeMap;

use kmt_common::error::{KmtError, Result};
use kmt_common::types::ParamValue;

use crate::definition::{
    ApplicationDefinition, EnvironmentDefinition, ServiceOverride, ServiceRequest,
};
use crate::resolver::{ResolvedService, ResolvedServices};

/// Resolves a `<name>` placeholder into `name`.
///
/// A value starting with `<` refers to a named parameter: every `<` and
/// `>` is stripped. Anything else is returned unchanged.
#[must_use]
pub fn subst_param(value: &str) -> String {
    if value.starts_with('<') {
        value.replace(['<', '>'], "")
    } else {
        value.to_string()
    }
}

/// A per-service entry of an override document carrying variable values.
pub trait EnvironmentLayer {
    /// Service the values are addressed to.
    fn service_name(&self) -> &str;

    /// Values keyed by variable name, any casing; `None` unsets the variable.
    fn environment_values(&self) -> &BTreeMap<String, Option<ParamValue>>;
}

impl EnvironmentLayer for ServiceRequest {
    fn service_name(&self) -> &str {
        &self.name
    }

    fn environment_values(&self) -> &BTreeMap<String, Option<ParamValue>> {
        &self.environment_variables
    }
}

impl EnvironmentLayer for ServiceOverride {
    fn service_name(&self) -> &str {
        &self.name
    }

    fn environment_values(&self) -> &BTreeMap<String, Option<ParamValue>> {
        &self.environment_variables
    }
}

fn target<'r>(resolved: &'r mut ResolvedServices, name: &str) -> Result<&'r mut ResolvedService> {
    resolved.get_mut(name).ok_or_else(|| KmtError::OverrideTarget {
        service: name.to_string(),
        kind: "service",
        name: name.to_string(),
    })
}

/// Sets the values a layer supplies for declared environment variables.
///
/// # Errors
///
/// Returns `KmtError::OverrideTarget` if a service is not resolved or a
/// variable is not declared by it.
pub fn apply_environment_variables<L: EnvironmentLayer>(
    layer: &[L],
    resolved: &mut ResolvedServices,
) -> Result<()> {
    for entry in layer {
        let values = entry.environment_values();
        if values.is_empty() {
            continue;
        }
        let service = target(resolved, entry.service_name())?;
        for (name, value) in values {
            let variable = service
                .environment_variable_mut(&name.to_lowercase())
                .ok_or_else(|| KmtError::OverrideTarget {
                    service: entry.service_name().to_string(),
                    kind: "environment variable",
                    name: name.clone(),
                })?;
            tracing::debug!(service = entry.service_name(), variable = %name, "value set");
            variable.value = value.clone();
        }
    }
    Ok(())
}

/// Sets environment-layer label values, resolving placeholders.
///
/// # Errors
///
/// Returns `KmtError::OverrideTarget` if a service is not resolved.
pub fn apply_labels(
    environment: &EnvironmentDefinition,
    resolved: &mut ResolvedServices,
) -> Result<()> {
    for entry in environment.services.iter().filter(|s| !s.labels.is_empty()) {
        let service = target(resolved, &entry.name)?;
        for (key, value) in entry.labels.iter() {
            service.labels.set(key, subst_param(value));
        }
        tracing::debug!(service = %entry.name, labels = entry.labels.len(), "labels set");
    }
    Ok(())
}

/// Sets environment-layer replica counts.
///
/// # Errors
///
/// Returns `KmtError::OverrideTarget` if a service is not resolved.
pub fn apply_replicas(
    environment: &EnvironmentDefinition,
    resolved: &mut ResolvedServices,
) -> Result<()> {
    for entry in &environment.services {
        if let Some(replicas) = entry.replicas {
            target(resolved, &entry.name)?.replicas = replicas;
            tracing::debug!(service = %entry.name, replicas, "replicas set");
        }
    }
    Ok(())
}

/// Applies every override layer in precedence order.
///
/// # Errors
///
/// Returns the first `KmtError::OverrideTarget` encountered.
pub fn apply_all(
    application: &ApplicationDefinition,
    environment: &EnvironmentDefinition,
    resolved: &mut ResolvedServices,
) -> Result<()> {
    for request in &application.services {
        if !request.labels.is_empty() || request.replicas.is_some() {
            tracing::warn!(
                service = %request.name,
                "labels and replicas are only applied from the environment definition"
            );
        }
    }
    apply_environment_variables(&application.services, resolved)?;
    apply_environment_variables(&environment.services, resolved)?;
    apply_labels(environment, resolved)?;
    apply_replicas(environment, resolved)?;
    tracing::info!(environment = %environment.environment.name, "overrides applied");
    Ok(())
}

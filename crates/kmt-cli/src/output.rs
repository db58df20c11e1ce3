//! Formatted output helpers for CLI commands.
//!
//! Renders resolved services as indented, human-readable plan lines.

use kmt_common::types::LabelSet;
use kmt_compose::resolver::{EnvironmentVariable, ResolvedService};

/// Placeholder shown for a variable that has no value yet.
const UNSET: &str = "<unset>";

/// Returns a horizontal rule of `width` box-drawing characters.
#[must_use]
pub fn rule(width: usize) -> String {
    "\u{2550}".repeat(width)
}

/// Formats a variable as `NAME=value`, using its declared name.
#[must_use]
pub fn format_variable(variable: &EnvironmentVariable) -> String {
    variable.value.as_ref().map_or_else(
        || format!("{}={UNSET}", variable.declared_name),
        |value| format!("{}={value}", variable.declared_name),
    )
}

/// Formats labels as `key=value` pairs in order, or `-` when empty.
#[must_use]
pub fn format_labels(labels: &LabelSet) -> String {
    if labels.is_empty() {
        return "-".to_string();
    }
    labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Formats one resolved service as plan lines.
#[must_use]
pub fn format_service(service: &ResolvedService) -> Vec<String> {
    let mut lines = vec![
        format!("  + {}@{}", service.name, service.tag),
        format!("      image: {}", service.image),
        format!("      replicas: {}", service.replicas),
        format!("      labels: {}", format_labels(&service.labels)),
    ];
    if let Some(port) = service.container_port() {
        lines.push(format!("      port: {port}"));
    }
    for variable in &service.environment_variables {
        lines.push(format!("      env: {}", format_variable(variable)));
    }
    lines
}

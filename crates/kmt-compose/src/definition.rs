//! Typed definition documents.
//!
//! Service, application, and environment definitions are decoded into
//! explicit records with optional fields and validated eagerly, so the
//! resolver and override engine never inspect untyped documents.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use kmt_common::error::{KmtError, Result};
use kmt_common::types::{LabelSet, ParamValue};
use serde::{Deserialize, Serialize};

use crate::range::VersionRange;

/// A dependency on another service, constrained by a version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Service name.
    pub name: String,
    /// Semantic-version range the chosen tag must satisfy.
    pub version: VersionRange,
}

impl Dependency {
    /// Creates a dependency from a name and an already parsed range.
    #[must_use]
    pub fn new(name: impl Into<String>, version: VersionRange) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// One published release of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceVersion {
    /// Semantic-version tag of this release.
    pub tag: semver::Version,
    /// Services this release depends on, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Environment variable names this release declares.
    #[serde(default)]
    pub environment_variables: Option<Vec<String>>,
    /// Labels this release declares.
    #[serde(default)]
    pub labels: Option<Vec<LabelSet>>,
}

/// Catalog entry describing one deployable service across its releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique service name.
    pub name: String,
    /// Container image.
    pub image: String,
    /// Exposed ports; the first is the container port.
    pub ports: Vec<u16>,
    /// Environment variable names shared by every release.
    #[serde(default)]
    pub environment_variables: Vec<String>,
    /// Labels shared by every release.
    #[serde(default)]
    pub labels: Vec<LabelSet>,
    /// Published releases.
    pub versions: Vec<ServiceVersion>,
}

impl ServiceDefinition {
    /// Checks the structural rules a definition must satisfy.
    ///
    /// # Checks performed
    ///
    /// 1. The name is not empty.
    /// 2. At least one port is declared.
    /// 3. At least one version is published, with no tag repeated.
    ///
    /// # Errors
    ///
    /// Returns `KmtError::InvalidDefinition` naming `path` on the first failed check.
    pub fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: String| KmtError::InvalidDefinition {
            path: path.to_path_buf(),
            message,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("service name is empty".into()));
        }
        if self.ports.is_empty() {
            return Err(invalid(format!("service \"{}\" declares no ports", self.name)));
        }
        if self.versions.is_empty() {
            return Err(invalid(format!(
                "service \"{}\" publishes no versions",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for version in &self.versions {
            if !seen.insert(&version.tag) {
                return Err(invalid(format!(
                    "service \"{}\" publishes version {} more than once",
                    self.name, version.tag
                )));
            }
        }
        Ok(())
    }

    /// Returns every published tag in declaration order.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.versions.iter().map(|v| v.tag.to_string()).collect()
    }
}

/// The environment a definition document targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRef {
    /// Environment name.
    pub name: String,
}

/// A service the application requests, plus its application-layer overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Service name.
    pub name: String,
    /// Requested version range.
    pub version: VersionRange,
    /// Values for declared environment variables.
    #[serde(default)]
    pub environment_variables: BTreeMap<String, Option<ParamValue>>,
    /// Labels; accepted in the document but only applied at the environment layer.
    #[serde(default)]
    pub labels: LabelSet,
    /// Replica count; accepted in the document but only applied at the environment layer.
    #[serde(default)]
    pub replicas: Option<u32>,
}

impl ServiceRequest {
    /// The dependency this request places on the catalog.
    #[must_use]
    pub fn dependency(&self) -> Dependency {
        Dependency::new(self.name.clone(), self.version.clone())
    }
}

/// Top-level request: which services an application wants, at which ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDefinition {
    /// Target environment.
    pub environment: EnvironmentRef,
    /// Requested services in declaration order.
    pub services: Vec<ServiceRequest>,
}

impl ApplicationDefinition {
    /// The requested services as resolver input.
    #[must_use]
    pub fn requested(&self) -> Vec<Dependency> {
        self.services.iter().map(ServiceRequest::dependency).collect()
    }
}

/// How a gateway selects the instances it routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    /// Match on the resolved service's labels.
    Label,
    /// Any selector type the emitter does not build expressions for.
    #[serde(other)]
    Unsupported,
}

/// Selector configuration of a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySelector {
    /// Selector type.
    #[serde(rename = "type")]
    pub kind: SelectorKind,
    /// Label key captured with a wildcard instead of a fixed value.
    #[serde(default)]
    pub discriminator: Option<String>,
}

/// Routing configuration for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Port the gateway listens on.
    pub port: u16,
    /// Instance selector.
    pub selector: GatewaySelector,
}

/// Environment-layer overrides for one already resolved service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOverride {
    /// Service name.
    pub name: String,
    /// Values for declared environment variables.
    #[serde(default)]
    pub environment_variables: BTreeMap<String, Option<ParamValue>>,
    /// Label values to set.
    #[serde(default)]
    pub labels: LabelSet,
    /// Replica count.
    #[serde(default)]
    pub replicas: Option<u32>,
    /// Gateway routing for this service.
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
}

/// Environment-specific overrides and gateway routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDefinition {
    /// Environment this document describes.
    pub environment: EnvironmentRef,
    /// Per-service overrides.
    #[serde(default)]
    pub services: Vec<ServiceOverride>,
}

//! Unified error types for the kmt workspace.
//!
//! Every failure in the generator is fatal: the run is a one-shot pipeline
//! and nothing is partially recovered. Library crates return [`KmtError`];
//! the CLI wraps it into `anyhow` at the process boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum KmtError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A definition document could not be decoded.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Document that failed to decode.
        path: PathBuf,
        /// Decoder diagnostic.
        message: String,
    },

    /// A definition document decoded but is structurally invalid.
    #[error("invalid definition in {path}: {message}")]
    InvalidDefinition {
        /// Document holding the invalid definition.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A configuration value or command-line input is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Two catalog entries declare the same service name.
    #[error("service \"{service}\" is defined more than once")]
    DuplicateService {
        /// Name declared twice.
        service: String,
    },

    /// A requested service name is absent from the catalog.
    #[error("no service definition found for {service}")]
    CatalogLookup {
        /// Service that was requested.
        service: String,
    },

    /// No published version of a service satisfies the requested range.
    #[error(
        "no matching version found for {service} {range}; available versions: [{}]",
        .available.join(", ")
    )]
    VersionResolution {
        /// Service being resolved.
        service: String,
        /// Requested semantic-version range.
        range: String,
        /// Every published tag, in catalog order.
        available: Vec<String>,
    },

    /// Version choices keep replacing each other past the depth limit.
    #[error("resolution cycle detected: {}", .chain.join(" -> "))]
    ResolutionCycle {
        /// The `name@tag` expansion chain at the point resolution stopped.
        chain: Vec<String>,
    },

    /// An override names a service or variable absent from the resolved set.
    #[error("override targets unknown {kind} `{name}` on service `{service}`")]
    OverrideTarget {
        /// Service the override is addressed to.
        service: String,
        /// What was looked up (`service`, `environment variable`, ...).
        kind: &'static str,
        /// The name that was not found.
        name: String,
    },

    /// A declared environment variable still has no value at emission time.
    #[error("parameter components.{component}.{parameter} has no value")]
    MissingParameter {
        /// Component (service) holding the variable.
        component: String,
        /// Lowercased variable key.
        parameter: String,
    },

    /// Application and environment definitions target different environments.
    #[error(
        "environment mismatch: application targets `{application}`, \
         environment definition is `{environment}`"
    )]
    EnvironmentMismatch {
        /// Environment named by the application definition.
        application: String,
        /// Environment named by the environment definition.
        environment: String,
    },

    /// Serialization of an emitted document failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KmtError>;

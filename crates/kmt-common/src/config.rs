//! Generator configuration model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::OutputFormat;

/// Settings that shape how resolved services are emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Directory all artifacts are written under.
    pub output_dir: PathBuf,
    /// Artifact layout to produce.
    pub output_format: OutputFormat,
    /// Line-oriented template used for per-service deployment descriptors.
    pub deployment_template: PathBuf,
    /// Constructor expression placed in each `.withEnv(...)` line.
    pub env_constructor: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            output_format: OutputFormat::default(),
            deployment_template: PathBuf::from(crate::constants::DEFAULT_DEPLOYMENT_TEMPLATE),
            env_constructor: crate::constants::DEFAULT_ENV_CONSTRUCTOR.to_string(),
        }
    }
}

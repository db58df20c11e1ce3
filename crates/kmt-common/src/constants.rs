//! Marker tokens, output file names, and defaults.

/// Template marker replaced by the service name.
pub const COMPONENT_NAME_MARKER: &str = "@@componentName@@";

/// Template marker expanded into one line per label.
pub const LABELS_MARKER: &str = "@@labels@@";

/// Template marker expanded into one `.withEnv(...)` line per variable.
pub const WITH_ENV_MARKER: &str = "@@withEnv@@";

/// Line terminator for every emitted template and config-map line.
pub const LINE_ENDING: &str = "\r\n";

/// Joiner between gateway selector predicates.
pub const SELECTOR_JOINER: &str = " && ";

/// Default deployment template path.
pub const DEFAULT_DEPLOYMENT_TEMPLATE: &str = "./deployment-template.jsonnet";

/// Default constructor expression used in `.withEnv(...)` lines.
pub const DEFAULT_ENV_CONSTRUCTOR: &str = "container.envType.new";

/// Replica count a resolved service starts with.
pub const DEFAULT_REPLICAS: u32 = 1;

/// Replica count written into every params component entry.
pub const PARAMS_REPLICAS: u32 = 1;

/// Shared parameters document (ksonnet layout).
pub const PARAMS_FILE: &str = "params.libsonnet";

/// Suffix of gateway descriptors (ksonnet layout).
pub const GATEWAY_SUFFIX: &str = "-gw.yml";

/// Extension of rendered deployment descriptors (ksonnet layout).
pub const DEPLOYMENT_EXTENSION: &str = "jsonnet";

/// Directory holding per-service folders (kustomize layout).
pub const KUSTOMIZE_SERVICES_DIR: &str = "services";

/// Environment file written into each service folder (kustomize layout).
pub const CONFIG_MAP_FILE: &str = "configMap.env";

/// Directory holding gateway descriptors (kustomize layout).
pub const KUSTOMIZE_GATEWAYS_DIR: &str = "infrastructure/vamp/gateways";

/// Extensions decoded as JSON.
pub const JSON_EXTENSIONS: &[&str] = &["json"];

/// Extensions decoded as YAML.
pub const YAML_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Deepest dependency chain the resolver expands before reporting a cycle.
pub const MAX_RESOLUTION_DEPTH: usize = 128;

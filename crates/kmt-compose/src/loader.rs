//! Discovery and decoding of definition documents.
//!
//! Definition files are JSON (`.json`) or YAML (`.yml`, `.yaml`), chosen
//! by extension. Catalog directories are walked recursively and every
//! file is read concurrently.

use std::path::{Path, PathBuf};

use kmt_common::constants::{JSON_EXTENSIONS, YAML_EXTENSIONS};
use kmt_common::error::{KmtError, Result};
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use walkdir::{DirEntry, WalkDir};

use crate::catalog::ServiceCatalog;
use crate::definition::{ApplicationDefinition, EnvironmentDefinition, ServiceDefinition};

/// Encoding of a definition document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// JSON document.
    Json,
    /// YAML document.
    Yaml,
}

impl DataFormat {
    /// Detects the format from the file extension, case-insensitively.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        if JSON_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Json)
        } else if YAML_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Yaml)
        } else {
            None
        }
    }
}

/// Decodes `content` according to the extension of `path`.
///
/// # Errors
///
/// Returns `KmtError::Config` for an unsupported extension and
/// `KmtError::Parse` if the document does not decode.
pub fn decode<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    let parse_error = |message: String| KmtError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match DataFormat::from_path(path) {
        Some(DataFormat::Json) => {
            serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
        }
        Some(DataFormat::Yaml) => {
            serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))
        }
        None => Err(KmtError::Config {
            message: format!("unsupported definition format: {}", path.display()),
        }),
    }
}

/// Decodes and validates one service definition.
///
/// The file stem must equal the declared service name.
///
/// # Errors
///
/// Returns a decoding error or `KmtError::InvalidDefinition`.
pub fn parse_service_definition(path: &Path, content: &str) -> Result<ServiceDefinition> {
    let definition: ServiceDefinition = decode(path, content)?;
    definition.validate(path)?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if stem != definition.name {
        return Err(KmtError::InvalidDefinition {
            path: path.to_path_buf(),
            message: format!(
                "service `{}` must be defined in a file named `{}`",
                definition.name, definition.name
            ),
        });
    }
    Ok(definition)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn walk_error(dir: &Path, err: walkdir::Error) -> KmtError {
    let path = err.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    KmtError::Io { path, source }
}

/// Lists every definition file under `dir`, recursively, sorted by path.
///
/// Hidden files and directories are skipped.
///
/// # Errors
///
/// Returns `KmtError::Io` if the directory cannot be walked.
pub fn discover_data_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if entry.file_type().is_file() && DataFormat::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Reads a whole text file.
///
/// # Errors
///
/// Returns `KmtError::Io` if the file cannot be read.
pub async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| KmtError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads and decodes one document.
///
/// # Errors
///
/// Returns `KmtError::Io` or a decoding error.
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_text(path).await?;
    decode(path, &content)
}

/// Builds the catalog from every definition file under `dir`.
///
/// Files are read and decoded concurrently, then inserted in path order.
///
/// # Errors
///
/// Returns `KmtError::Config` if the directory holds no definitions, or
/// the first read, decode, validation, or duplicate-name error.
pub async fn load_catalog(dir: &Path) -> Result<ServiceCatalog> {
    let files = discover_data_files(dir)?;
    if files.is_empty() {
        return Err(KmtError::Config {
            message: format!("no service definitions found in {}", dir.display()),
        });
    }

    let mut tasks = JoinSet::new();
    for path in files {
        let _ = tasks.spawn(async move {
            let content = read_text(&path).await?;
            let definition = parse_service_definition(&path, &content)?;
            Ok::<_, KmtError>((path, definition))
        });
    }

    let mut loaded = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (path, definition) = joined.map_err(|e| KmtError::Config {
            message: format!("definition loader task failed: {e}"),
        })??;
        tracing::debug!(path = %path.display(), service = %definition.name, "definition loaded");
        loaded.push((path, definition));
    }
    loaded.sort_by(|a, b| a.0.cmp(&b.0));

    let catalog = ServiceCatalog::from_definitions(loaded.into_iter().map(|(_, d)| d))?;
    tracing::info!(dir = %dir.display(), services = catalog.len(), "catalog loaded");
    Ok(catalog)
}

/// Loads an application definition.
///
/// # Errors
///
/// Returns `KmtError::Io` or a decoding error.
pub async fn load_application(path: &Path) -> Result<ApplicationDefinition> {
    let application: ApplicationDefinition = read_document(path).await?;
    tracing::debug!(
        path = %path.display(),
        environment = %application.environment.name,
        services = application.services.len(),
        "application definition loaded"
    );
    Ok(application)
}

/// Loads an environment definition.
///
/// # Errors
///
/// Returns `KmtError::Io` or a decoding error.
pub async fn load_environment(path: &Path) -> Result<EnvironmentDefinition> {
    let environment: EnvironmentDefinition = read_document(path).await?;
    tracing::debug!(
        path = %path.display(),
        environment = %environment.environment.name,
        services = environment.services.len(),
        "environment definition loaded"
    );
    Ok(environment)
}

fn first_match(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let walker = WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(prefix));
        if matches && entry.file_type().is_file() && DataFormat::from_path(entry.path()).is_some() {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

/// Finds the definition of `environment` in an environment-definitions directory.
///
/// Looks for a data file whose name starts with the environment name,
/// first directly under `dir`, then under `dir/<environment>/`.
///
/// # Errors
///
/// Returns `KmtError::Config` if no such file exists.
pub fn find_environment_file(dir: &Path, environment: &str) -> Result<PathBuf> {
    if let Some(path) = first_match(dir, environment)? {
        return Ok(path);
    }
    if let Some(path) = first_match(&dir.join(environment), environment)? {
        return Ok(path);
    }
    Err(KmtError::Config {
        message: format!(
            "no definition for environment `{environment}` found in {}",
            dir.display()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE_YAML: &str = "\
name: web
image: registry/web
ports: [8080]
versions:
  - tag: 1.0.0
";

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    #[test]
    fn detects_format_by_extension() {
        assert_eq!(DataFormat::from_path(Path::new("a.json")), Some(DataFormat::Json));
        assert_eq!(DataFormat::from_path(Path::new("a.yml")), Some(DataFormat::Yaml));
        assert_eq!(DataFormat::from_path(Path::new("a.YAML")), Some(DataFormat::Yaml));
        assert_eq!(DataFormat::from_path(Path::new("a.toml")), None);
        assert_eq!(DataFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn decode_reports_path_on_parse_failure() {
        let err = decode::<ServiceDefinition>(Path::new("bad.json"), "{not json").unwrap_err();
        assert!(matches!(err, KmtError::Parse { ref path, .. } if path == Path::new("bad.json")));
    }

    #[test]
    fn decode_rejects_unknown_extension() {
        let err = decode::<ServiceDefinition>(Path::new("web.txt"), SERVICE_YAML).unwrap_err();
        assert!(matches!(err, KmtError::Config { .. }));
    }

    #[test]
    fn file_stem_must_match_service_name() {
        assert!(parse_service_definition(Path::new("defs/web.yml"), SERVICE_YAML).is_ok());
        let err = parse_service_definition(Path::new("defs/api.yml"), SERVICE_YAML).unwrap_err();
        assert!(matches!(err, KmtError::InvalidDefinition { .. }));
    }

    #[test]
    fn discovery_is_recursive_and_skips_hidden_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write(dir.path(), "web.yml", SERVICE_YAML);
        let _ = write(dir.path(), "team/api.json", "{}");
        let _ = write(dir.path(), ".hidden.yml", SERVICE_YAML);
        let _ = write(dir.path(), ".git/config.yml", SERVICE_YAML);
        let _ = write(dir.path(), "notes.md", "# notes");

        let files = discover_data_files(dir.path()).expect("discover");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).expect("prefix").to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("team/api.json"), PathBuf::from("web.yml")]);
    }

    #[tokio::test]
    async fn load_catalog_reads_every_definition() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write(dir.path(), "web.yml", SERVICE_YAML);
        let _ = write(
            dir.path(),
            "nested/db.json",
            r#"{"name":"db","image":"registry/db","ports":[5432],"versions":[{"tag":"2.1.0"}]}"#,
        );

        let catalog = load_catalog(dir.path()).await.expect("load");
        assert_eq!(catalog.names(), vec!["db", "web"]);
    }

    #[tokio::test]
    async fn load_catalog_rejects_empty_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_catalog(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("no service definitions found"));
    }

    #[tokio::test]
    async fn load_catalog_rejects_duplicate_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write(dir.path(), "web.yml", SERVICE_YAML);
        let _ = write(dir.path(), "copy/web.yaml", SERVICE_YAML);
        let err = load_catalog(dir.path()).await.unwrap_err();
        assert!(matches!(err, KmtError::DuplicateService { ref service } if service == "web"));
    }

    #[tokio::test]
    async fn load_missing_application_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_application(&dir.path().join("app.yml")).await.unwrap_err();
        assert!(matches!(err, KmtError::Io { .. }));
    }

    #[test]
    fn environment_file_found_at_root_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = write(dir.path(), "prod-env.yml", "environment: {name: prod}");
        let _ = write(dir.path(), "prod/prod.yml", "environment: {name: prod}");
        assert_eq!(find_environment_file(dir.path(), "prod").expect("find"), root);
    }

    #[test]
    fn environment_file_found_in_subdirectory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _ = write(dir.path(), "staging.yml", "environment: {name: staging}");
        let nested = write(dir.path(), "prod/prod.json", r#"{"environment":{"name":"prod"}}"#);
        assert_eq!(find_environment_file(dir.path(), "prod").expect("find"), nested);
    }

    #[test]
    fn missing_environment_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            find_environment_file(dir.path(), "prod"),
            Err(KmtError::Config { .. })
        ));
    }
}

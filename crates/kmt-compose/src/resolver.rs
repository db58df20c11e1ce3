//! Version selection and transitive dependency resolution.
//!
//! Walks the requested services depth-first, picks the highest published
//! tag satisfying each range, and flattens the chosen release into a
//! [`ResolvedService`]. Exactly one resolved service exists per name.
//!
//! A name that is already resolved to a tag satisfying the incoming range
//! is skipped without touching the catalog (first resolved wins). Ranges
//! from different requesters are never merged and earlier choices are
//! never revisited; a later range the current tag does not satisfy
//! replaces the earlier choice outright.

use std::collections::BTreeMap;

use kmt_common::constants::{DEFAULT_REPLICAS, MAX_RESOLUTION_DEPTH};
use kmt_common::error::{KmtError, Result};
use kmt_common::types::{LabelSet, ParamValue};
use serde::Serialize;

use crate::catalog::ServiceSource;
use crate::definition::{Dependency, ServiceDefinition, ServiceVersion};
use crate::overrides::subst_param;
use crate::range::VersionRange;

/// Resolved services keyed by name.
pub type ResolvedServices = BTreeMap<String, ResolvedService>;

/// A declared environment variable and its current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentVariable {
    /// Lowercased lookup key.
    pub key: String,
    /// Name as declared, original casing.
    pub declared_name: String,
    /// Value assigned by an override layer, if any.
    pub value: Option<ParamValue>,
}

/// One service at one chosen version, flattened and configurable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedService {
    /// Service name.
    pub name: String,
    /// Container image.
    pub image: String,
    /// Exposed ports.
    pub ports: Vec<u16>,
    /// Chosen tag.
    pub tag: semver::Version,
    /// Dependencies of the chosen release.
    pub dependencies: Vec<Dependency>,
    /// Declared environment variables in declaration order.
    pub environment_variables: Vec<EnvironmentVariable>,
    /// Flattened labels.
    pub labels: LabelSet,
    /// Replica count.
    pub replicas: u32,
}

impl ResolvedService {
    /// Flattens `version` onto a copy of `definition`.
    ///
    /// The definition's base environment variables and labels are unioned
    /// with the release's own, without duplicates. Variable names are keyed
    /// by their lowercased form and label values pass through
    /// [`subst_param`].
    #[must_use]
    pub fn flatten(definition: &ServiceDefinition, version: &ServiceVersion) -> Self {
        let names = union(
            &definition.environment_variables,
            version.environment_variables.as_deref(),
        );
        let label_sets = union(&definition.labels, version.labels.as_deref());

        let mut service = Self {
            name: definition.name.clone(),
            image: definition.image.clone(),
            ports: definition.ports.clone(),
            tag: version.tag.clone(),
            dependencies: version.dependencies.clone(),
            environment_variables: Vec::with_capacity(names.len()),
            labels: LabelSet::new(),
            replicas: DEFAULT_REPLICAS,
        };
        for name in names {
            service.declare_environment_variable(name);
        }
        for (key, value) in label_sets.into_iter().flat_map(|set| set.iter()) {
            service.labels.set(key, subst_param(value));
        }
        service
    }

    fn declare_environment_variable(&mut self, declared_name: &str) {
        let key = declared_name.to_lowercase();
        match self.environment_variable_mut(&key) {
            Some(existing) => declared_name.clone_into(&mut existing.declared_name),
            None => self.environment_variables.push(EnvironmentVariable {
                key,
                declared_name: declared_name.to_string(),
                value: None,
            }),
        }
    }

    /// Returns the variable stored under the lowercased `key`.
    #[must_use]
    pub fn environment_variable(&self, key: &str) -> Option<&EnvironmentVariable> {
        self.environment_variables.iter().find(|ev| ev.key == key)
    }

    /// Mutable access to the variable stored under the lowercased `key`.
    pub fn environment_variable_mut(&mut self, key: &str) -> Option<&mut EnvironmentVariable> {
        self.environment_variables.iter_mut().find(|ev| ev.key == key)
    }

    /// The port the container listens on.
    #[must_use]
    pub fn container_port(&self) -> Option<u16> {
        self.ports.first().copied()
    }
}

fn union<'a, T: PartialEq>(base: &'a [T], extra: Option<&'a [T]>) -> Vec<&'a T> {
    let mut merged: Vec<&T> = Vec::with_capacity(base.len());
    for item in base.iter().chain(extra.unwrap_or_default()) {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    merged
}

/// Picks the highest published release of `definition` satisfying `range`.
///
/// # Errors
///
/// Returns `KmtError::VersionResolution` listing every published tag if
/// none satisfies the range.
pub fn select_version<'d>(
    definition: &'d ServiceDefinition,
    range: &VersionRange,
) -> Result<&'d ServiceVersion> {
    definition
        .versions
        .iter()
        .filter(|v| range.matches(&v.tag))
        .max_by(|a, b| a.tag.cmp(&b.tag))
        .ok_or_else(|| KmtError::VersionResolution {
            service: definition.name.clone(),
            range: range.to_string(),
            available: definition.tags(),
        })
}

/// Depth-first resolver over a [`ServiceSource`].
#[derive(Debug)]
pub struct DependencyResolver<'a, S: ServiceSource + ?Sized> {
    source: &'a S,
    path: Vec<String>,
}

impl<'a, S: ServiceSource + ?Sized> DependencyResolver<'a, S> {
    /// Creates a resolver reading definitions from `source`.
    #[must_use]
    pub const fn new(source: &'a S) -> Self {
        Self {
            source,
            path: Vec::new(),
        }
    }

    /// Resolves `requested` and its transitive dependencies into `resolved`.
    ///
    /// Entries already present in `resolved` are kept when their tag
    /// satisfies the incoming range.
    ///
    /// # Errors
    ///
    /// Fails on the first missing definition, unsatisfiable range, or when
    /// the expansion chain exceeds `MAX_RESOLUTION_DEPTH`.
    pub fn resolve(
        &mut self,
        requested: &[Dependency],
        resolved: &mut ResolvedServices,
    ) -> Result<()> {
        for dependency in requested {
            if let Some(existing) = resolved.get(&dependency.name) {
                if dependency.version.matches(&existing.tag) {
                    tracing::debug!(
                        service = %dependency.name,
                        tag = %existing.tag,
                        range = %dependency.version,
                        "already resolved"
                    );
                    continue;
                }
                tracing::warn!(
                    service = %dependency.name,
                    tag = %existing.tag,
                    range = %dependency.version,
                    "resolved tag does not satisfy range, resolving again"
                );
            }

            let source = self.source;
            let definition = source.lookup(&dependency.name).ok_or_else(|| {
                KmtError::CatalogLookup {
                    service: dependency.name.clone(),
                }
            })?;
            let version = select_version(definition, &dependency.version)?;
            tracing::debug!(
                service = %definition.name,
                tag = %version.tag,
                range = %dependency.version,
                "selected version"
            );

            let entry = format!("{}@{}", definition.name, version.tag);
            if self.path.len() >= MAX_RESOLUTION_DEPTH {
                let mut chain = self.path.clone();
                chain.push(entry);
                return Err(KmtError::ResolutionCycle { chain });
            }

            let service = ResolvedService::flatten(definition, version);
            let dependencies = service.dependencies.clone();
            let _ = resolved.insert(service.name.clone(), service);

            self.path.push(entry);
            self.resolve(&dependencies, resolved)?;
            let _ = self.path.pop();
        }
        Ok(())
    }
}

/// Resolves `requested` against `source` into the `resolved` accumulator.
///
/// # Errors
///
/// See [`DependencyResolver::resolve`].
pub fn resolve<S: ServiceSource + ?Sized>(
    requested: &[Dependency],
    source: &S,
    resolved: &mut ResolvedServices,
) -> Result<()> {
    DependencyResolver::new(source).resolve(requested, resolved)
}

/// Resolves `requested` against `source` into a fresh map.
///
/// # Errors
///
/// See [`DependencyResolver::resolve`].
pub fn resolve_services<S: ServiceSource + ?Sized>(
    requested: &[Dependency],
    source: &S,
) -> Result<ResolvedServices> {
    let mut resolved = ResolvedServices::new();
    resolve(requested, source, &mut resolved)?;
    tracing::info!(services = resolved.len(), "dependencies resolved");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::catalog::ServiceCatalog;

    fn req(range: &str) -> VersionRange {
        range.parse().expect("range")
    }

    fn dep(name: &str, range: &str) -> Dependency {
        Dependency::new(name, req(range))
    }

    fn release(tag: &str, dependencies: Vec<Dependency>) -> ServiceVersion {
        ServiceVersion {
            tag: tag.parse().expect("tag"),
            dependencies,
            environment_variables: None,
            labels: None,
        }
    }

    fn service(name: &str, versions: Vec<ServiceVersion>) -> ServiceDefinition {
        ServiceDefinition {
            name: name.into(),
            image: format!("registry/{name}"),
            ports: vec![8080],
            environment_variables: Vec::new(),
            labels: Vec::new(),
            versions,
        }
    }

    /// Counts lookups per name on top of a catalog.
    struct CountingSource {
        catalog: ServiceCatalog,
        lookups: RefCell<Vec<String>>,
    }

    impl ServiceSource for CountingSource {
        fn lookup(&self, name: &str) -> Option<&ServiceDefinition> {
            self.lookups.borrow_mut().push(name.to_string());
            self.catalog.lookup(name)
        }
    }

    impl CountingSource {
        fn lookups_of(&self, name: &str) -> usize {
            self.lookups.borrow().iter().filter(|n| *n == name).count()
        }
    }

    #[test]
    fn selects_highest_satisfying_version() {
        let def = service(
            "a",
            vec![
                release("1.0.0", vec![]),
                release("1.2.0", vec![]),
                release("2.0.0", vec![]),
            ],
        );
        let chosen = select_version(&def, &req("^1.0.0")).expect("select");
        assert_eq!(chosen.tag, semver::Version::new(1, 2, 0));
    }

    #[test]
    fn selection_ignores_declaration_order() {
        let def = service(
            "a",
            vec![
                release("1.4.0", vec![]),
                release("1.10.0", vec![]),
                release("1.9.3", vec![]),
            ],
        );
        let chosen = select_version(&def, &req("^1")).expect("select");
        assert_eq!(chosen.tag.to_string(), "1.10.0");
    }

    #[test]
    fn selection_skips_prereleases_for_plain_ranges() {
        let def = service(
            "a",
            vec![release("1.1.0", vec![]), release("1.2.0-beta.1", vec![])],
        );
        let chosen = select_version(&def, &req("^1.0.0")).expect("select");
        assert_eq!(chosen.tag.to_string(), "1.1.0");
    }

    #[test]
    fn missing_version_lists_available_tags() {
        let def = service("a", vec![release("1.0.0", vec![])]);
        let err = select_version(&def, &req("^2.0.0")).unwrap_err();
        match err {
            KmtError::VersionResolution {
                service,
                range,
                available,
            } => {
                assert_eq!(service, "a");
                assert_eq!(range, "^2.0.0");
                assert_eq!(available, vec!["1.0.0"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_definition_is_catalog_lookup_error() {
        let catalog = ServiceCatalog::new();
        let err = resolve_services(&[dep("ghost", "^1")], &catalog).unwrap_err();
        assert!(matches!(err, KmtError::CatalogLookup { ref service } if service == "ghost"));
    }

    #[test]
    fn bare_version_pins_exact_release() {
        let catalog = ServiceCatalog::from_definitions([service(
            "a",
            vec![release("1.2.0", vec![]), release("1.3.0", vec![])],
        )])
        .expect("catalog");

        let resolved = resolve_services(&[dep("a", "1.2.0")], &catalog).expect("resolve");
        assert_eq!(resolved["a"].tag.to_string(), "1.2.0");
    }

    #[test]
    fn whitespace_and_alternative_ranges_resolve() {
        let catalog = ServiceCatalog::from_definitions([service(
            "a",
            vec![
                release("1.4.0", vec![]),
                release("2.1.0", vec![]),
                release("3.0.0", vec![]),
            ],
        )])
        .expect("catalog");

        let bounded = resolve_services(&[dep("a", ">=1.0.0 <2.0.0")], &catalog).expect("bounded");
        assert_eq!(bounded["a"].tag.to_string(), "1.4.0");
        let either = resolve_services(&[dep("a", "^1.0.0 || ^2.0.0")], &catalog).expect("either");
        assert_eq!(either["a"].tag.to_string(), "2.1.0");
    }

    #[test]
    fn resolves_transitive_dependencies() {
        let catalog = ServiceCatalog::from_definitions([
            service("web", vec![release("1.0.0", vec![dep("api", "^2.0.0")])]),
            service("api", vec![release("2.3.1", vec![dep("db", "~9.1")])]),
            service("db", vec![release("9.1.4", vec![]), release("9.2.0", vec![])]),
        ])
        .expect("catalog");

        let resolved = resolve_services(&[dep("web", "^1")], &catalog).expect("resolve");
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved["api"].tag.to_string(), "2.3.1");
        assert_eq!(resolved["db"].tag.to_string(), "9.1.4");
        assert_eq!(resolved["web"].replicas, 1);
    }

    #[test]
    fn first_resolved_wins_without_refetch() {
        let catalog = ServiceCatalog::from_definitions([
            service(
                "a",
                vec![release("1.0.0", vec![]), release("1.5.0", vec![])],
            ),
            service("b", vec![release("1.0.0", vec![dep("a", "^1.5.0")])]),
        ])
        .expect("catalog");
        let source = CountingSource {
            catalog,
            lookups: RefCell::new(Vec::new()),
        };

        let requested = [dep("a", "^1.0.0"), dep("b", "^1")];
        let resolved = resolve_services(&requested, &source).expect("resolve");

        assert_eq!(resolved["a"].tag.to_string(), "1.5.0");
        assert_eq!(source.lookups_of("a"), 1, "a must not be fetched twice");
        assert_eq!(source.lookups_of("b"), 1);
    }

    #[test]
    fn existing_accumulator_entries_are_kept() {
        let catalog = ServiceCatalog::from_definitions([service(
            "a",
            vec![release("1.0.0", vec![]), release("1.1.0", vec![])],
        )])
        .expect("catalog");
        let pinned = catalog.lookup("a").and_then(|d| d.versions.first()).expect("a");
        let mut resolved = ResolvedServices::new();
        let _ = resolved.insert(
            "a".into(),
            ResolvedService::flatten(catalog.lookup("a").expect("a"), pinned),
        );

        resolve(&[dep("a", "^1")], &catalog, &mut resolved).expect("resolve");
        assert_eq!(resolved["a"].tag.to_string(), "1.0.0");
    }

    #[test]
    fn incompatible_later_range_replaces_earlier_choice() {
        // web pins db ^1, api later asks for db ^2. The later request wins
        // and web's constraint is no longer honoured; nothing reports it.
        let catalog = ServiceCatalog::from_definitions([
            service("web", vec![release("1.0.0", vec![dep("db", "^1")])]),
            service("api", vec![release("1.0.0", vec![dep("db", "^2")])]),
            service("db", vec![release("1.4.0", vec![]), release("2.1.0", vec![])]),
        ])
        .expect("catalog");

        let resolved =
            resolve_services(&[dep("web", "^1"), dep("api", "^1")], &catalog).expect("resolve");
        assert_eq!(resolved["db"].tag.to_string(), "2.1.0");
        assert!(!req("^1").matches(&resolved["db"].tag));
    }

    #[test]
    fn compatible_cycle_terminates() {
        let catalog = ServiceCatalog::from_definitions([
            service("a", vec![release("1.0.0", vec![dep("b", "^1")])]),
            service("b", vec![release("1.0.0", vec![dep("a", "^1")])]),
        ])
        .expect("catalog");

        let resolved = resolve_services(&[dep("a", "^1")], &catalog).expect("resolve");
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn oscillating_ranges_report_cycle() {
        let catalog = ServiceCatalog::from_definitions([
            service(
                "a",
                vec![
                    release("1.0.0", vec![dep("b", "^1")]),
                    release("2.0.0", vec![dep("b", "^2")]),
                ],
            ),
            service(
                "b",
                vec![
                    release("1.0.0", vec![dep("a", "^2")]),
                    release("2.0.0", vec![dep("a", "^1")]),
                ],
            ),
        ])
        .expect("catalog");

        let err = resolve_services(&[dep("a", "^1")], &catalog).unwrap_err();
        match err {
            KmtError::ResolutionCycle { chain } => {
                assert_eq!(chain.len(), MAX_RESOLUTION_DEPTH + 1);
                assert_eq!(chain[0], "a@1.0.0");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn flatten_unions_base_and_version_declarations() {
        let mut def = service("a", vec![]);
        def.environment_variables = vec!["LOG_LEVEL".into(), "DB_URL".into()];
        def.labels = vec![[("tier", "backend")].into_iter().collect()];
        let version = ServiceVersion {
            tag: semver::Version::new(1, 0, 0),
            dependencies: vec![dep("db", "^1")],
            environment_variables: Some(vec!["DB_URL".into(), "Cache_Host".into()]),
            labels: Some(vec![
                [("tier", "backend")].into_iter().collect(),
                [("version", "<release>")].into_iter().collect(),
            ]),
        };

        let flat = ResolvedService::flatten(&def, &version);
        let keys: Vec<&str> = flat.environment_variables.iter().map(|ev| ev.key.as_str()).collect();
        assert_eq!(keys, vec!["log_level", "db_url", "cache_host"]);
        assert_eq!(
            flat.environment_variable("cache_host").map(|ev| ev.declared_name.as_str()),
            Some("Cache_Host")
        );
        assert!(flat.environment_variables.iter().all(|ev| ev.value.is_none()));
        assert_eq!(
            flat.labels.iter().collect::<Vec<_>>(),
            vec![("tier", "backend"), ("version", "release")]
        );
        assert_eq!(flat.dependencies.len(), 1);
        assert_eq!(flat.container_port(), Some(8080));
    }
}

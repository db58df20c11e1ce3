//! In-memory index of every known service definition.
//!
//! The catalog is filled once, before resolution starts, and is never
//! mutated afterwards.

use std::collections::HashMap;

use kmt_common::error::{KmtError, Result};

use crate::definition::ServiceDefinition;

/// Read access to service definitions by name.
///
/// The resolver only ever looks definitions up through this trait.
pub trait ServiceSource {
    /// Returns the definition registered under `name`.
    fn lookup(&self, name: &str) -> Option<&ServiceDefinition>;
}

/// Service definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: HashMap<String, ServiceDefinition>,
}

impl ServiceCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from a set of definitions.
    ///
    /// # Errors
    ///
    /// Returns `KmtError::DuplicateService` if two definitions share a name.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ServiceDefinition>,
    ) -> Result<Self> {
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.insert(definition)?;
        }
        Ok(catalog)
    }

    /// Registers a definition.
    ///
    /// # Errors
    ///
    /// Returns `KmtError::DuplicateService` if the name is already registered.
    pub fn insert(&mut self, definition: ServiceDefinition) -> Result<()> {
        if self.services.contains_key(&definition.name) {
            return Err(KmtError::DuplicateService {
                service: definition.name,
            });
        }
        tracing::debug!(
            service = %definition.name,
            versions = definition.versions.len(),
            "registered service definition"
        );
        let _ = self.services.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Returns the definition registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }

    /// Registered service names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the catalog holds no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceSource for ServiceCatalog {
    fn lookup(&self, name: &str) -> Option<&ServiceDefinition> {
        self.get(name)
    }
}

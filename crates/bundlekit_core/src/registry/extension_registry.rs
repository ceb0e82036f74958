//! In-process module registry.
//!
//! # Responsibility
//! - Hold registered bundles and index which classes provide which
//!   declared extension types.
//! - Gate every read behind an explicit `initialize()` step.
//!
//! # Invariants
//! - One bundle per coordinate.
//! - The extension-type universe only lists declared types with at least one
//!   registered provider.
//! - Provider uniqueness per implementation name is not enforced here; the
//!   instantiator rejects ambiguous lookups.

use super::{ModuleRegistry, RegistryError};
use crate::bundle::coordinate::BundleCoordinate;
use crate::bundle::is_valid_type_name;
use crate::bundle::properties::BundleProperties;
use crate::bundle::Bundle;
use crate::namespace::NamespaceRef;
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct RegistryState {
    bundles: BTreeMap<BundleCoordinate, Bundle>,
    /// implementation name -> providing bundles
    provider_index: BTreeMap<String, BTreeSet<BundleCoordinate>>,
    /// extension type -> implementation names
    extension_index: BTreeMap<String, BTreeSet<String>>,
}

/// Explicitly constructed, explicitly initialized module registry.
pub struct ExtensionRegistry {
    host: NamespaceRef,
    extension_types: BTreeSet<String>,
    state: RwLock<RegistryState>,
    initialized: AtomicBool,
}

impl ExtensionRegistry {
    /// Creates an uninitialized registry for the declared extension types.
    ///
    /// # Errors
    /// - [`RegistryError::InvalidTypeName`] for malformed extension type names.
    pub fn new<I, S>(host: NamespaceRef, extension_types: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut declared = BTreeSet::new();
        for extension_type in extension_types {
            let extension_type = extension_type.into().trim().to_string();
            if !is_valid_type_name(&extension_type) {
                return Err(RegistryError::InvalidTypeName(extension_type));
            }
            declared.insert(extension_type);
        }

        Ok(Self {
            host,
            extension_types: declared,
            state: RwLock::new(RegistryState::default()),
            initialized: AtomicBool::new(false),
        })
    }

    /// Creates a registry whose extension types come from
    /// `bundle.extension.type.*` properties.
    pub fn from_properties(
        host: NamespaceRef,
        properties: &BundleProperties,
    ) -> Result<Self, RegistryError> {
        Self::new(host, properties.extension_types().into_values())
    }

    /// Registers one bundle and indexes its extension providers.
    pub fn register_bundle(&self, bundle: Bundle) -> Result<(), RegistryError> {
        let coordinate = bundle.coordinate().clone();
        let mut state = self.write_state();
        if state.bundles.contains_key(&coordinate) {
            return Err(RegistryError::DuplicateBundle(coordinate.to_string()));
        }

        let mut provided = 0usize;
        for class in bundle.namespace().contents().classes() {
            let descriptor = class.descriptor();
            let implemented: Vec<&String> = self
                .extension_types
                .iter()
                .filter(|extension_type| descriptor.is_assignable_to(extension_type))
                .collect();
            if implemented.is_empty() {
                continue;
            }

            let providers = state
                .provider_index
                .entry(descriptor.name().to_string())
                .or_default();
            if !providers.is_empty() {
                warn!(
                    "event=registry_register module=registry status=duplicate_provider implementation={} bundle={} existing={}",
                    descriptor.name(),
                    coordinate,
                    providers.len()
                );
            }
            providers.insert(coordinate.clone());

            for extension_type in implemented {
                state
                    .extension_index
                    .entry(extension_type.clone())
                    .or_default()
                    .insert(descriptor.name().to_string());
            }
            provided += 1;
        }

        state.bundles.insert(coordinate.clone(), bundle);
        info!(
            "event=registry_register module=registry status=ok bundle={} providers={}",
            coordinate, provided
        );
        Ok(())
    }

    /// Marks setup complete; reads succeed from here on.
    pub fn initialize(&self) {
        let bundles = self.read_state().bundles.len();
        self.initialized.store(true, Ordering::Release);
        info!(
            "event=registry_init module=registry status=ok bundles={} extension_types={}",
            bundles,
            self.extension_types.len()
        );
    }

    /// Drops every bundle and returns to the uninitialized state.
    pub fn shutdown(&self) {
        self.initialized.store(false, Ordering::Release);
        let mut state = self.write_state();
        let bundles = state.bundles.len();
        *state = RegistryState::default();
        info!(
            "event=registry_shutdown module=registry status=ok bundles={}",
            bundles
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.read_state().bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().bundles.is_empty()
    }

    pub fn bundle(&self, coordinate: &BundleCoordinate) -> Option<Bundle> {
        self.read_state().bundles.get(coordinate).cloned()
    }

    /// Registered bundle coordinates in order.
    pub fn bundles(&self) -> Vec<BundleCoordinate> {
        self.read_state().bundles.keys().cloned().collect()
    }

    /// Declared extension types, with or without providers.
    pub fn declared_extension_types(&self) -> &BTreeSet<String> {
        &self.extension_types
    }

    fn ensure_initialized(&self) -> Result<(), RegistryError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(RegistryError::NotInitialized)
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModuleRegistry for ExtensionRegistry {
    fn providers(&self, implementation: &str) -> Result<Vec<BundleCoordinate>, RegistryError> {
        self.ensure_initialized()?;
        Ok(self
            .read_state()
            .provider_index
            .get(implementation.trim())
            .map(|providers| providers.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn extension_types(&self) -> Result<BTreeSet<String>, RegistryError> {
        self.ensure_initialized()?;
        Ok(self
            .read_state()
            .extension_index
            .iter()
            .filter(|(_, implementations)| !implementations.is_empty())
            .map(|(extension_type, _)| extension_type.clone())
            .collect())
    }

    fn namespace(&self, bundle: &BundleCoordinate) -> Result<NamespaceRef, RegistryError> {
        self.ensure_initialized()?;
        self.read_state()
            .bundles
            .get(bundle)
            .map(Bundle::namespace_ref)
            .ok_or_else(|| RegistryError::UnknownBundle(bundle.to_string()))
    }

    fn host_namespace(&self) -> NamespaceRef {
        NamespaceRef::clone(&self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::ExtensionRegistry;
    use crate::bundle::coordinate::BundleCoordinate;
    use crate::bundle::properties::BundleProperties;
    use crate::bundle::{Bundle, BundleBuilder};
    use crate::namespace::{ClassBuilder, IsolatedNamespace, NamespaceContents, NamespaceRef};
    use crate::registry::{ModuleRegistry, RegistryError};
    use std::sync::Arc;

    fn host() -> NamespaceRef {
        Arc::new(IsolatedNamespace::host(NamespaceContents::new()))
    }

    fn bundle(id: &str, classes: &[(&str, &str)]) -> Bundle {
        let coordinate =
            BundleCoordinate::new(Some("acme"), id, Some("1.0.0")).expect("valid coordinate");
        classes
            .iter()
            .fold(BundleBuilder::new(coordinate), |builder, (name, api)| {
                builder.class(ClassBuilder::new(*name).implements(*api))
            })
            .build()
            .expect("bundle builds")
    }

    #[test]
    fn reads_fail_until_initialized() {
        let registry = ExtensionRegistry::new(host(), ["acme.api.Parser"]).expect("registry");
        registry
            .register_bundle(bundle("a", &[("acme.a.Csv", "acme.api.Parser")]))
            .expect("register");

        assert_eq!(
            registry.providers("acme.a.Csv"),
            Err(RegistryError::NotInitialized)
        );
        assert_eq!(
            registry.extension_types(),
            Err(RegistryError::NotInitialized)
        );

        registry.initialize();
        assert_eq!(registry.providers("acme.a.Csv").expect("providers").len(), 1);
    }

    #[test]
    fn rejects_duplicate_coordinate_and_invalid_extension_type() {
        let registry = ExtensionRegistry::new(host(), ["acme.api.Parser"]).expect("registry");
        registry
            .register_bundle(bundle("a", &[]))
            .expect("first registration");
        let err = registry
            .register_bundle(bundle("a", &[]))
            .expect_err("duplicate coordinate");
        assert!(matches!(err, RegistryError::DuplicateBundle(_)));

        let err = ExtensionRegistry::new(host(), ["not valid"]).err();
        assert_eq!(
            err,
            Some(RegistryError::InvalidTypeName("not valid".to_string()))
        );
    }

    #[test]
    fn universe_lists_only_extension_types_with_providers() {
        let registry = ExtensionRegistry::new(host(), ["acme.api.Parser", "acme.api.Writer"])
            .expect("registry");
        registry
            .register_bundle(bundle(
                "a",
                &[("acme.a.Csv", "acme.api.Parser"), ("acme.a.Util", "acme.Other")],
            ))
            .expect("register");
        registry.initialize();

        let universe = registry.extension_types().expect("universe");
        assert_eq!(universe.len(), 1);
        assert!(universe.contains("acme.api.Parser"));
        assert!(registry.providers("acme.a.Util").expect("lookup").is_empty());
    }

    #[test]
    fn indexes_every_bundle_providing_the_same_name() {
        let registry = ExtensionRegistry::new(host(), ["acme.api.Parser"]).expect("registry");
        registry
            .register_bundle(bundle("a", &[("acme.Csv", "acme.api.Parser")]))
            .expect("register a");
        registry
            .register_bundle(bundle("b", &[("acme.Csv", "acme.api.Parser")]))
            .expect("register b");
        registry.initialize();

        let providers = registry.providers("acme.Csv").expect("providers");
        assert_eq!(providers.len(), 2);
    }

    #[test]
    fn shutdown_clears_bundles_and_requires_reinitialization() {
        let properties = BundleProperties::new()
            .with_property("bundle.extension.type.parser", "acme.api.Parser");
        let registry = ExtensionRegistry::from_properties(host(), &properties).expect("registry");
        let coordinate = bundle("a", &[]).coordinate().clone();
        registry.register_bundle(bundle("a", &[])).expect("register");
        registry.initialize();
        registry.namespace(&coordinate).expect("namespace");

        registry.shutdown();
        assert!(registry.is_empty());
        assert!(!registry.is_initialized());
        assert_eq!(
            registry.namespace(&coordinate).err(),
            Some(RegistryError::NotInitialized)
        );

        registry.initialize();
        assert_eq!(
            registry.namespace(&coordinate).err(),
            Some(RegistryError::UnknownBundle(coordinate.to_string()))
        );
    }
}

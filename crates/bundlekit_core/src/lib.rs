//! Bundle isolation runtime.
//! Extensions live in per-bundle namespaces; this crate decides which
//! namespace serves a lookup and builds extensions inside their own bundle.

pub mod archive;
pub mod bundle;
pub mod context;
pub mod instantiate;
pub mod logging;
pub mod namespace;
pub mod registry;

pub use bundle::coordinate::{BundleCoordinate, CoordinateError};
pub use bundle::properties::{BundleProperties, PropertiesError};
pub use bundle::{Bundle, BundleBuilder, BundleError};
pub use context::{AmbientGuard, CallStack, ContextAwareLoader, ContextResolver};
pub use instantiate::{ConstructorPolicy, FactoryPanic, InstantiationError, Instantiator};
pub use logging::{
    default_log_level, init_logging, init_logging_from_properties, logging_status, LoggingError,
};
pub use namespace::{
    ClassBuilder, ClassDef, ConstructError, IsolatedNamespace, LoadError, Namespace,
    NamespaceContents, NamespaceKind, NamespaceRef, TypeDescriptor,
};
pub use registry::{ExtensionRegistry, ModuleRegistry, RegistryError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

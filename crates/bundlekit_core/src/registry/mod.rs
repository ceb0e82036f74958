//! Module registry contracts.
//!
//! The registry is the catalog the runtime consults for "which bundles
//! provide this implementation", "which extension types exist" and "which
//! namespace belongs to this bundle". It is constructed and injected
//! explicitly; there is no process-wide instance.

pub mod extension_registry;

use crate::bundle::coordinate::BundleCoordinate;
use crate::namespace::NamespaceRef;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use extension_registry::ExtensionRegistry;

/// Read-side contract used by context resolution and instantiation.
///
/// Every query fails [`RegistryError::NotInitialized`] until setup completes.
pub trait ModuleRegistry: Send + Sync {
    /// Bundles providing `implementation`, in coordinate order.
    fn providers(&self, implementation: &str) -> Result<Vec<BundleCoordinate>, RegistryError>;

    /// Extension types with at least one provider.
    fn extension_types(&self) -> Result<BTreeSet<String>, RegistryError>;

    /// Private namespace of `bundle`.
    fn namespace(&self, bundle: &BundleCoordinate) -> Result<NamespaceRef, RegistryError>;

    /// Host default namespace used when nothing bundle-owned matches.
    fn host_namespace(&self) -> NamespaceRef;
}

/// Registry lookup and registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    NotInitialized,
    UnknownBundle(String),
    DuplicateBundle(String),
    InvalidTypeName(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "module registry is not initialized"),
            Self::UnknownBundle(value) => write!(f, "bundle is not registered: {value}"),
            Self::DuplicateBundle(value) => write!(f, "bundle already registered: {value}"),
            Self::InvalidTypeName(value) => write!(f, "type name is invalid: {value}"),
        }
    }
}

impl Error for RegistryError {}

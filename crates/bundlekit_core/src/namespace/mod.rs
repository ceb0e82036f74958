//! Isolated loading namespaces.
//!
//! # Responsibility
//! - Define the namespace handle contract every bundle (and the host) exposes.
//! - Provide an in-memory implementation with parent-first delegation.
//!
//! # Invariants
//! - Namespace identity is its [`NamespaceId`]; contents are never compared.
//! - A namespace only sees its own classes/resources plus its parent's.

pub mod class;
pub mod isolated;

use crate::registry::RegistryError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::sync::Arc;
use uuid::Uuid;

pub use class::{ClassBuilder, ClassDef, ConstructError, Constructors, TypeDescriptor};
pub use isolated::{IsolatedNamespace, NamespaceContents};

/// Shared handle to any namespace.
pub type NamespaceRef = Arc<dyn Namespace>;

/// Lazy, single-pass sequence of resource matches.
pub type Resources = Box<dyn Iterator<Item = ResourceUrl> + Send>;

/// Stable namespace identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(Uuid);

impl NamespaceId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for NamespaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    /// Host default namespace.
    Host,
    /// One bundle's private namespace.
    Bundle,
    /// Facade that forwards to whichever namespace is current.
    ContextAware,
}

/// Locator of one resource inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUrl(String);

impl ResourceUrl {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Loading contract of one isolated namespace.
pub trait Namespace: Send + Sync {
    fn id(&self) -> NamespaceId;

    fn kind(&self) -> NamespaceKind;

    /// Human-readable label for diagnostics (coordinate or `host`).
    fn label(&self) -> String;

    fn load_class(&self, name: &str) -> Result<Arc<ClassDef>, LoadError>;

    fn get_resource(&self, name: &str) -> Result<Option<ResourceUrl>, LoadError>;

    fn get_resource_as_stream(
        &self,
        name: &str,
    ) -> Result<Option<Box<dyn Read + Send>>, LoadError>;

    fn get_resources(&self, name: &str) -> Result<Resources, LoadError>;

    fn set_default_assertion_status(&self, enabled: bool) -> Result<(), LoadError>;

    fn set_package_assertion_status(&self, package: &str, enabled: bool)
        -> Result<(), LoadError>;

    fn set_class_assertion_status(&self, class: &str, enabled: bool) -> Result<(), LoadError>;

    fn clear_assertion_status(&self) -> Result<(), LoadError>;

    fn desired_assertion_status(&self, class: &str) -> Result<bool, LoadError>;

    /// Whether this namespace may be pinned as a thread's ambient context.
    fn supports_ambient(&self) -> bool {
        false
    }
}

/// Returns whether two handles name the same namespace.
pub fn same_namespace(left: &NamespaceRef, right: &NamespaceRef) -> bool {
    left.id() == right.id()
}

/// Class and resource lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    ClassNotFound(String),
    Resolution(RegistryError),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClassNotFound(name) => write!(f, "class not found: {name}"),
            Self::Resolution(err) => write!(f, "namespace resolution failed: {err}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolution(err) => Some(err),
            Self::ClassNotFound(_) => None,
        }
    }
}

impl From<RegistryError> for LoadError {
    fn from(value: RegistryError) -> Self {
        Self::Resolution(value)
    }
}

//! Type descriptors and factory tables standing in for loadable classes.
//!
//! A class is registered with one factory pair per Rust interface it can be
//! built as (`dyn Trait`). Instantiation looks the pair up by `TypeId`, so
//! "is a subtype of the expected interface" means "has a factory entry for it".

use crate::bundle::coordinate::BundleCoordinate;
use crate::bundle::properties::BundleProperties;
use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Failure raised by an extension factory.
pub type ConstructError = Box<dyn Error + Send + Sync>;

type ConfigFactory<I> =
    Arc<dyn Fn(&BundleProperties) -> Result<Box<I>, ConstructError> + Send + Sync>;
type PlainFactory<I> = Arc<dyn Fn() -> Result<Box<I>, ConstructError> + Send + Sync>;

/// Declared shape of a type as seen by context resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    supertypes: BTreeSet<String>,
    enclosing: Option<Arc<TypeDescriptor>>,
    bundle: Option<BundleCoordinate>,
}

impl TypeDescriptor {
    /// Host-owned type with no supertypes.
    pub fn host(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: BTreeSet::new(),
            enclosing: None,
            bundle: None,
        }
    }

    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.insert(supertype.into());
        self
    }

    pub fn with_enclosing(mut self, enclosing: Arc<TypeDescriptor>) -> Self {
        self.enclosing = Some(enclosing);
        self
    }

    pub fn in_bundle(mut self, bundle: BundleCoordinate) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supertypes(&self) -> &BTreeSet<String> {
        &self.supertypes
    }

    pub fn enclosing(&self) -> Option<&Arc<TypeDescriptor>> {
        self.enclosing.as_ref()
    }

    /// Declaring bundle; `None` for host types.
    pub fn bundle(&self) -> Option<&BundleCoordinate> {
        self.bundle.as_ref()
    }

    /// Whether a value of this type can be used where `type_name` is expected.
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.name == type_name || self.supertypes.contains(type_name)
    }
}

/// Factory pair for building one class as interface `I`.
pub struct Constructors<I: ?Sized> {
    with_config: Option<ConfigFactory<I>>,
    no_args: Option<PlainFactory<I>>,
}

impl<I: ?Sized> Constructors<I> {
    fn empty() -> Self {
        Self {
            with_config: None,
            no_args: None,
        }
    }

    pub fn has_config_constructor(&self) -> bool {
        self.with_config.is_some()
    }

    pub fn has_default_constructor(&self) -> bool {
        self.no_args.is_some()
    }

    pub(crate) fn config_constructor(&self) -> Option<&ConfigFactory<I>> {
        self.with_config.as_ref()
    }

    pub(crate) fn default_constructor(&self) -> Option<&PlainFactory<I>> {
        self.no_args.as_ref()
    }
}

impl<I: ?Sized> Clone for Constructors<I> {
    fn clone(&self) -> Self {
        Self {
            with_config: self.with_config.clone(),
            no_args: self.no_args.clone(),
        }
    }
}

/// A loadable class: descriptor plus per-interface factories.
pub struct ClassDef {
    descriptor: Arc<TypeDescriptor>,
    constructors: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ClassDef {
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Factories for interface `I`, if this class can be built as one.
    pub fn constructors<I: ?Sized + 'static>(&self) -> Option<&Constructors<I>> {
        self.constructors
            .get(&TypeId::of::<I>())
            .and_then(|entry| entry.downcast_ref::<Constructors<I>>())
    }

    pub fn is_subtype_of<I: ?Sized + 'static>(&self) -> bool {
        self.constructors.contains_key(&TypeId::of::<I>())
    }
}

impl Debug for ClassDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("descriptor", &self.descriptor)
            .field("interfaces", &self.constructors.len())
            .finish()
    }
}

/// Declares one class before it is bound to a bundle or the host.
pub struct ClassBuilder {
    name: String,
    supertypes: BTreeSet<String>,
    enclosing: Option<String>,
    constructors: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: BTreeSet::new(),
            enclosing: None,
            constructors: HashMap::new(),
        }
    }

    /// Declares an interface/base type name this class implements.
    pub fn implements(mut self, type_name: impl Into<String>) -> Self {
        self.supertypes.insert(type_name.into());
        self
    }

    /// Declares the lexically enclosing class by name.
    pub fn enclosed_in(mut self, enclosing: impl Into<String>) -> Self {
        self.enclosing = Some(enclosing.into());
        self
    }

    /// Registers a zero-argument factory for interface `I`.
    pub fn constructor<I, F>(mut self, factory: F) -> Self
    where
        I: ?Sized + 'static,
        F: Fn() -> Result<Box<I>, ConstructError> + Send + Sync + 'static,
    {
        self.update::<I>(|entry| entry.no_args = Some(Arc::new(factory)));
        self
    }

    /// Registers a factory taking [`BundleProperties`] for interface `I`.
    pub fn config_constructor<I, F>(mut self, factory: F) -> Self
    where
        I: ?Sized + 'static,
        F: Fn(&BundleProperties) -> Result<Box<I>, ConstructError> + Send + Sync + 'static,
    {
        self.update::<I>(|entry| entry.with_config = Some(Arc::new(factory)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn enclosing_name(&self) -> Option<&str> {
        self.enclosing.as_deref()
    }

    /// Descriptor for this class bound to `bundle` (or the host when `None`).
    pub(crate) fn describe(
        &self,
        enclosing: Option<Arc<TypeDescriptor>>,
        bundle: Option<BundleCoordinate>,
    ) -> TypeDescriptor {
        TypeDescriptor {
            name: self.name.clone(),
            supertypes: self.supertypes.clone(),
            enclosing,
            bundle,
        }
    }

    pub(crate) fn finish(self, descriptor: Arc<TypeDescriptor>) -> ClassDef {
        ClassDef {
            descriptor,
            constructors: self.constructors,
        }
    }

    /// Binds a top-level class to the host namespace.
    pub fn build_host(self) -> ClassDef {
        let descriptor = Arc::new(self.describe(None, None));
        self.finish(descriptor)
    }

    fn update<I: ?Sized + 'static>(&mut self, apply: impl FnOnce(&mut Constructors<I>)) {
        let key = TypeId::of::<I>();
        let mut constructors = self
            .constructors
            .remove(&key)
            .and_then(|entry| entry.downcast::<Constructors<I>>().ok())
            .map(|entry| *entry)
            .unwrap_or_else(Constructors::empty);
        apply(&mut constructors);
        self.constructors.insert(key, Box::new(constructors));
    }
}

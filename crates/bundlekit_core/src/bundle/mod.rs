//! Bundle identity, configuration and assembly.
//!
//! # Responsibility
//! - Identify bundles by validated coordinates.
//! - Carry the properties handed to extension factories.
//! - Assemble one bundle's classes and resources into its private namespace.
//!
//! # Invariants
//! - Every class in a built bundle carries the bundle coordinate in its
//!   descriptor, including nested classes and their enclosing chain.
//! - Type names are dotted or `::`-separated identifiers.

pub mod coordinate;
pub mod properties;

use crate::archive::{ArchiveProviders, ArchiveUri};
use crate::namespace::{
    ClassBuilder, IsolatedNamespace, NamespaceContents, NamespaceRef, TypeDescriptor,
};
use coordinate::BundleCoordinate;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io::Read;
use std::sync::Arc;

static TYPE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(?:(?:\.|::)[A-Za-z_][A-Za-z0-9_$]*)*$")
        .expect("valid type name regex")
});

/// Returns whether `value` is a well-formed type name.
pub fn is_valid_type_name(value: &str) -> bool {
    TYPE_NAME_RE.is_match(value)
}

/// One assembled bundle.
#[derive(Clone)]
pub struct Bundle {
    coordinate: BundleCoordinate,
    namespace: Arc<IsolatedNamespace>,
}

impl Bundle {
    pub fn coordinate(&self) -> &BundleCoordinate {
        &self.coordinate
    }

    pub fn namespace(&self) -> &Arc<IsolatedNamespace> {
        &self.namespace
    }

    pub fn namespace_ref(&self) -> NamespaceRef {
        Arc::clone(&self.namespace) as NamespaceRef
    }
}

impl Debug for Bundle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("coordinate", &self.coordinate)
            .field("classes", &self.namespace.contents().class_names().count())
            .finish()
    }
}

/// Collects classes and resources for one bundle.
pub struct BundleBuilder {
    coordinate: BundleCoordinate,
    parent: Option<NamespaceRef>,
    classes: Vec<ClassBuilder>,
    resources: Vec<(String, Vec<u8>)>,
}

impl BundleBuilder {
    pub fn new(coordinate: BundleCoordinate) -> Self {
        Self {
            coordinate,
            parent: None,
            classes: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Namespace consulted first for every lookup (normally the host).
    pub fn parent(mut self, parent: NamespaceRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn class(mut self, class: ClassBuilder) -> Self {
        self.classes.push(class);
        self
    }

    pub fn resource(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.resources.push((name.into(), bytes.into()));
        self
    }

    /// Reads one resource through the archive providers.
    pub fn resource_from_archive(
        mut self,
        name: impl Into<String>,
        providers: &ArchiveProviders,
        uri: &ArchiveUri,
    ) -> Result<Self, BundleError> {
        let mut bytes = Vec::new();
        providers
            .open(uri)
            .and_then(|mut stream| stream.read_to_end(&mut bytes))
            .map_err(|err| BundleError::Archive {
                uri: uri.to_string(),
                source: err,
            })?;
        self.resources.push((name.into(), bytes));
        Ok(self)
    }

    /// Binds every class to this bundle and builds its namespace.
    ///
    /// # Errors
    /// - [`BundleError::InvalidTypeName`] for malformed class or enclosing names.
    /// - [`BundleError::DuplicateClass`] when a name is declared twice.
    /// - [`BundleError::EnclosingCycle`] when enclosing declarations loop.
    pub fn build(self) -> Result<Bundle, BundleError> {
        let mut index = HashMap::new();
        for (position, class) in self.classes.iter().enumerate() {
            if !is_valid_type_name(class.name()) {
                return Err(BundleError::InvalidTypeName(class.name().to_string()));
            }
            if let Some(enclosing) = class.enclosing_name() {
                if !is_valid_type_name(enclosing) {
                    return Err(BundleError::InvalidTypeName(enclosing.to_string()));
                }
            }
            if index.insert(class.name().to_string(), position).is_some() {
                return Err(BundleError::DuplicateClass(class.name().to_string()));
            }
        }

        let mut describer = Describer {
            classes: &self.classes,
            index: &index,
            coordinate: &self.coordinate,
            done: HashMap::new(),
            visiting: BTreeSet::new(),
        };
        let mut descriptors = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            descriptors.push(describer.describe(class.name())?);
        }

        let mut contents = NamespaceContents::new();
        for (class, descriptor) in self.classes.into_iter().zip(descriptors) {
            contents.insert_class(class.finish(descriptor));
        }
        for (name, bytes) in self.resources {
            contents.insert_resource(name, bytes);
        }

        debug!(
            "event=bundle_build module=bundle status=ok coordinate={} classes={}",
            self.coordinate,
            index.len()
        );

        let namespace = IsolatedNamespace::bundle(self.coordinate.clone(), self.parent, contents);
        Ok(Bundle {
            coordinate: self.coordinate,
            namespace: Arc::new(namespace),
        })
    }
}

struct Describer<'a> {
    classes: &'a [ClassBuilder],
    index: &'a HashMap<String, usize>,
    coordinate: &'a BundleCoordinate,
    done: HashMap<String, Arc<TypeDescriptor>>,
    visiting: BTreeSet<String>,
}

impl Describer<'_> {
    fn describe(&mut self, name: &str) -> Result<Arc<TypeDescriptor>, BundleError> {
        if let Some(descriptor) = self.done.get(name) {
            return Ok(Arc::clone(descriptor));
        }
        let Some(position) = self.index.get(name).copied() else {
            // Enclosing type declared outside this bundle.
            return Ok(Arc::new(TypeDescriptor::host(name)));
        };
        if !self.visiting.insert(name.to_string()) {
            return Err(BundleError::EnclosingCycle(name.to_string()));
        }

        let class = &self.classes[position];
        let enclosing = match class.enclosing_name() {
            Some(enclosing) => Some(self.describe(enclosing)?),
            None => None,
        };
        let descriptor = Arc::new(class.describe(enclosing, Some(self.coordinate.clone())));

        self.visiting.remove(name);
        self.done.insert(name.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }
}

/// Bundle assembly errors.
#[derive(Debug)]
pub enum BundleError {
    InvalidTypeName(String),
    DuplicateClass(String),
    EnclosingCycle(String),
    Archive { uri: String, source: std::io::Error },
}

impl Display for BundleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTypeName(value) => write!(f, "type name is invalid: {value}"),
            Self::DuplicateClass(value) => write!(f, "class declared twice in bundle: {value}"),
            Self::EnclosingCycle(value) => {
                write!(f, "enclosing class declarations form a cycle at: {value}")
            }
            Self::Archive { uri, source } => {
                write!(f, "failed to read bundle content `{uri}`: {source}")
            }
        }
    }
}

impl Error for BundleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Archive { source, .. } => Some(source),
            _ => None,
        }
    }
}

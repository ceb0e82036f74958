//! In-memory isolated namespace.
//!
//! # Responsibility
//! - Own one bundle's (or the host's) classes and resource bytes.
//! - Delegate parent-first, so shared host types resolve identically in
//!   every bundle while bundle-private content stays invisible elsewhere.
//!
//! # Invariants
//! - Contents are fixed at construction; only assertion flags mutate.
//! - `get_resources` yields parent matches before own matches.

use super::{
    ClassDef, LoadError, Namespace, NamespaceId, NamespaceKind, NamespaceRef, ResourceUrl,
    Resources,
};
use crate::bundle::coordinate::BundleCoordinate;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex, MutexGuard};

/// Classes and resources owned by one namespace.
#[derive(Debug, Default)]
pub struct NamespaceContents {
    classes: HashMap<String, Arc<ClassDef>>,
    resources: BTreeMap<String, Arc<[u8]>>,
}

impl NamespaceContents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.insert_class(class);
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert_resource(name, bytes);
        self
    }

    pub fn insert_class(&mut self, class: ClassDef) {
        self.classes.insert(class.name().to_string(), Arc::new(class));
    }

    pub fn insert_resource(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.resources.insert(name.into(), Arc::from(bytes));
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassDef>> {
        self.classes.values()
    }
}

#[derive(Debug, Default)]
struct AssertionStatus {
    default_enabled: bool,
    packages: HashMap<String, bool>,
    classes: HashMap<String, bool>,
}

impl AssertionStatus {
    fn desired(&self, class: &str) -> bool {
        if let Some(enabled) = self.classes.get(class) {
            return *enabled;
        }
        let mut package = class;
        while let Some((parent, _)) = package.rsplit_once('.') {
            if let Some(enabled) = self.packages.get(parent) {
                return *enabled;
            }
            package = parent;
        }
        self.default_enabled
    }
}

/// Namespace backed by in-memory contents.
pub struct IsolatedNamespace {
    id: NamespaceId,
    kind: NamespaceKind,
    owner: Option<BundleCoordinate>,
    parent: Option<NamespaceRef>,
    contents: NamespaceContents,
    assertions: Mutex<AssertionStatus>,
}

impl IsolatedNamespace {
    /// Host default namespace; never pinned as ambient.
    pub fn host(contents: NamespaceContents) -> Self {
        Self {
            id: NamespaceId::random(),
            kind: NamespaceKind::Host,
            owner: None,
            parent: None,
            contents,
            assertions: Mutex::new(AssertionStatus::default()),
        }
    }

    /// Private namespace of `owner`, delegating to `parent` first.
    pub fn bundle(
        owner: BundleCoordinate,
        parent: Option<NamespaceRef>,
        contents: NamespaceContents,
    ) -> Self {
        Self {
            id: NamespaceId::random(),
            kind: NamespaceKind::Bundle,
            owner: Some(owner),
            parent,
            contents,
            assertions: Mutex::new(AssertionStatus::default()),
        }
    }

    pub fn owner(&self) -> Option<&BundleCoordinate> {
        self.owner.as_ref()
    }

    pub fn contents(&self) -> &NamespaceContents {
        &self.contents
    }

    fn resource_url(&self, name: &str) -> ResourceUrl {
        match &self.owner {
            Some(owner) => ResourceUrl::new(format!("bundle://{owner}/{name}")),
            None => ResourceUrl::new(format!("host:///{name}")),
        }
    }

    fn assertions(&self) -> MutexGuard<'_, AssertionStatus> {
        self.assertions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Namespace for IsolatedNamespace {
    fn id(&self) -> NamespaceId {
        self.id
    }

    fn kind(&self) -> NamespaceKind {
        self.kind
    }

    fn label(&self) -> String {
        match &self.owner {
            Some(owner) => owner.to_string(),
            None => "host".to_string(),
        }
    }

    fn load_class(&self, name: &str) -> Result<Arc<ClassDef>, LoadError> {
        if let Some(parent) = &self.parent {
            match parent.load_class(name) {
                Ok(class) => return Ok(class),
                Err(LoadError::ClassNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        self.contents
            .classes
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::ClassNotFound(name.to_string()))
    }

    fn get_resource(&self, name: &str) -> Result<Option<ResourceUrl>, LoadError> {
        if let Some(parent) = &self.parent {
            if let Some(url) = parent.get_resource(name)? {
                return Ok(Some(url));
            }
        }
        Ok(self
            .contents
            .resources
            .contains_key(name)
            .then(|| self.resource_url(name)))
    }

    fn get_resource_as_stream(
        &self,
        name: &str,
    ) -> Result<Option<Box<dyn Read + Send>>, LoadError> {
        if let Some(parent) = &self.parent {
            if let Some(stream) = parent.get_resource_as_stream(name)? {
                return Ok(Some(stream));
            }
        }
        Ok(self
            .contents
            .resources
            .get(name)
            .map(|bytes| Box::new(Cursor::new(Arc::clone(bytes))) as Box<dyn Read + Send>))
    }

    fn get_resources(&self, name: &str) -> Result<Resources, LoadError> {
        let own = self
            .contents
            .resources
            .contains_key(name)
            .then(|| self.resource_url(name));
        match &self.parent {
            Some(parent) => Ok(Box::new(parent.get_resources(name)?.chain(own))),
            None => Ok(Box::new(own.into_iter())),
        }
    }

    fn set_default_assertion_status(&self, enabled: bool) -> Result<(), LoadError> {
        self.assertions().default_enabled = enabled;
        Ok(())
    }

    fn set_package_assertion_status(
        &self,
        package: &str,
        enabled: bool,
    ) -> Result<(), LoadError> {
        self.assertions()
            .packages
            .insert(package.to_string(), enabled);
        Ok(())
    }

    fn set_class_assertion_status(&self, class: &str, enabled: bool) -> Result<(), LoadError> {
        self.assertions().classes.insert(class.to_string(), enabled);
        Ok(())
    }

    fn clear_assertion_status(&self) -> Result<(), LoadError> {
        let mut status = self.assertions();
        status.default_enabled = false;
        status.packages.clear();
        status.classes.clear();
        Ok(())
    }

    fn desired_assertion_status(&self, class: &str) -> Result<bool, LoadError> {
        Ok(self.assertions().desired(class))
    }

    fn supports_ambient(&self) -> bool {
        self.kind == NamespaceKind::Bundle
    }
}

#[cfg(test)]
mod tests {
    use super::{IsolatedNamespace, NamespaceContents};
    use crate::bundle::coordinate::BundleCoordinate;
    use crate::namespace::{ClassBuilder, LoadError, Namespace, NamespaceRef};
    use std::io::Read;
    use std::sync::Arc;

    fn coordinate(id: &str) -> BundleCoordinate {
        BundleCoordinate::new(Some("acme"), id, Some("1.0.0")).expect("valid coordinate")
    }

    fn host() -> NamespaceRef {
        Arc::new(IsolatedNamespace::host(
            NamespaceContents::new()
                .with_class(ClassBuilder::new("host.Shared").build_host())
                .with_resource("shared.txt", b"host".to_vec()),
        ))
    }

    #[test]
    fn delegates_classes_parent_first_and_isolates_private_ones() {
        let host = host();
        let bundle = IsolatedNamespace::bundle(
            coordinate("a"),
            Some(Arc::clone(&host)),
            NamespaceContents::new().with_class(ClassBuilder::new("a.Private").build_host()),
        );

        let shared = bundle.load_class("host.Shared").expect("shared class");
        let from_host = host.load_class("host.Shared").expect("host class");
        assert!(Arc::ptr_eq(&shared, &from_host));

        bundle.load_class("a.Private").expect("private class");
        let err = host.load_class("a.Private").expect_err("host cannot see bundle class");
        assert_eq!(err, LoadError::ClassNotFound("a.Private".to_string()));
    }

    #[test]
    fn resources_list_parent_matches_first() {
        let bundle = IsolatedNamespace::bundle(
            coordinate("a"),
            Some(host()),
            NamespaceContents::new().with_resource("shared.txt", b"bundle".to_vec()),
        );

        let urls: Vec<String> = bundle
            .get_resources("shared.txt")
            .expect("resources")
            .map(|url| url.to_string())
            .collect();
        assert_eq!(
            urls,
            vec![
                "host:///shared.txt".to_string(),
                "bundle://acme:a:1.0.0/shared.txt".to_string()
            ]
        );

        let mut text = String::new();
        bundle
            .get_resource_as_stream("shared.txt")
            .expect("lookup")
            .expect("stream")
            .read_to_string(&mut text)
            .expect("read");
        assert_eq!(text, "host");
        assert!(bundle.get_resource("missing").expect("lookup").is_none());
    }

    #[test]
    fn assertion_status_prefers_class_then_package_then_default() {
        let namespace = IsolatedNamespace::host(NamespaceContents::new());
        namespace
            .set_default_assertion_status(true)
            .expect("default flag");
        namespace
            .set_package_assertion_status("acme.io", false)
            .expect("package flag");
        namespace
            .set_class_assertion_status("acme.io.Reader", true)
            .expect("class flag");

        assert!(namespace.desired_assertion_status("acme.Other").expect("status"));
        assert!(!namespace.desired_assertion_status("acme.io.deep.Writer").expect("status"));
        assert!(namespace.desired_assertion_status("acme.io.Reader").expect("status"));

        namespace.clear_assertion_status().expect("clear");
        assert!(!namespace.desired_assertion_status("acme.io.Reader").expect("status"));
    }

    #[test]
    fn only_bundle_namespaces_support_ambient_pinning() {
        let host = IsolatedNamespace::host(NamespaceContents::new());
        let bundle = IsolatedNamespace::bundle(coordinate("a"), None, NamespaceContents::new());
        assert!(!host.supports_ambient());
        assert!(bundle.supports_ambient());
    }
}

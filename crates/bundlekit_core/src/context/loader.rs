use super::resolver::ContextResolver;
use crate::namespace::{
    ClassDef, LoadError, Namespace, NamespaceId, NamespaceKind, NamespaceRef, ResourceUrl,
    Resources,
};
use crate::registry::ModuleRegistry;
use std::io::Read;
use std::sync::Arc;

/// Namespace facade that re-resolves the current context on every call and
/// forwards the call unchanged to the namespace it finds.
pub struct ContextAwareLoader {
    id: NamespaceId,
    resolver: ContextResolver,
}

impl ContextAwareLoader {
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        Self {
            id: NamespaceId::random(),
            resolver: ContextResolver::new(registry),
        }
    }

    pub fn resolver(&self) -> &ContextResolver {
        &self.resolver
    }

    /// Namespace the next forwarded call would reach.
    pub fn current_target(&self) -> Result<NamespaceRef, LoadError> {
        Ok(self.resolver.resolve()?)
    }
}

impl Namespace for ContextAwareLoader {
    fn id(&self) -> NamespaceId {
        self.id
    }

    fn kind(&self) -> NamespaceKind {
        NamespaceKind::ContextAware
    }

    fn label(&self) -> String {
        "context-aware".to_string()
    }

    fn load_class(&self, name: &str) -> Result<Arc<ClassDef>, LoadError> {
        self.current_target()?.load_class(name)
    }

    fn get_resource(&self, name: &str) -> Result<Option<ResourceUrl>, LoadError> {
        self.current_target()?.get_resource(name)
    }

    fn get_resource_as_stream(
        &self,
        name: &str,
    ) -> Result<Option<Box<dyn Read + Send>>, LoadError> {
        self.current_target()?.get_resource_as_stream(name)
    }

    fn get_resources(&self, name: &str) -> Result<Resources, LoadError> {
        self.current_target()?.get_resources(name)
    }

    fn set_default_assertion_status(&self, enabled: bool) -> Result<(), LoadError> {
        self.current_target()?.set_default_assertion_status(enabled)
    }

    fn set_package_assertion_status(
        &self,
        package: &str,
        enabled: bool,
    ) -> Result<(), LoadError> {
        self.current_target()?
            .set_package_assertion_status(package, enabled)
    }

    fn set_class_assertion_status(&self, class: &str, enabled: bool) -> Result<(), LoadError> {
        self.current_target()?
            .set_class_assertion_status(class, enabled)
    }

    fn clear_assertion_status(&self) -> Result<(), LoadError> {
        self.current_target()?.clear_assertion_status()
    }

    fn desired_assertion_status(&self, class: &str) -> Result<bool, LoadError> {
        self.current_target()?.desired_assertion_status(class)
    }
}

//! Picks the namespace that should serve the current thread's lookups.
//!
//! # Invariants
//! - Frames are examined innermost first; the first match wins.
//! - A frame matches when its type, or any type enclosing it, is assignable
//!   to a type in the registry's extension universe.
//! - A matched bundle namespace is pinned as the thread's ambient namespace.
//! - With no match the forward (host) namespace is returned and nothing is
//!   pinned.

use super::ambient;
use super::call_stack::CallStack;
use crate::namespace::{NamespaceRef, TypeDescriptor};
use crate::registry::{ModuleRegistry, RegistryError};
use log::{debug, error};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Maps a call stack to the namespace owning the innermost extension type.
#[derive(Clone)]
pub struct ContextResolver {
    registry: Arc<dyn ModuleRegistry>,
    forward: NamespaceRef,
}

impl ContextResolver {
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        let forward = registry.host_namespace();
        Self { registry, forward }
    }

    /// Namespace used when no frame belongs to a bundle.
    pub fn forward(&self) -> &NamespaceRef {
        &self.forward
    }

    /// Resolves against the calling thread's frames.
    ///
    /// # Errors
    /// - [`RegistryError::NotInitialized`] when the registry has not been
    ///   initialized.
    pub fn resolve(&self) -> Result<NamespaceRef, RegistryError> {
        self.resolve_stack(&CallStack::current())
    }

    /// Resolves against an explicit stack snapshot.
    ///
    /// The registry is consulted even for an empty stack, so an uninitialized
    /// registry never yields the forward namespace.
    pub fn resolve_stack(&self, stack: &CallStack) -> Result<NamespaceRef, RegistryError> {
        let universe = self.registry.extension_types()?;
        let mut enclosing_universe = EnclosingUniverse::Pending;

        for frame in stack.innermost_first() {
            let matched = if is_extension_type(frame, &universe) {
                Some(Arc::clone(frame))
            } else {
                self.find_enclosing_extension_type(frame, &mut enclosing_universe)?
            };
            let Some(matched) = matched else {
                continue;
            };

            let namespace = match matched.bundle() {
                Some(coordinate) => self.registry.namespace(coordinate)?,
                None => NamespaceRef::clone(&self.forward),
            };
            if namespace.supports_ambient() {
                ambient::set(Some(NamespaceRef::clone(&namespace)));
                debug!(
                    "event=context_pin module=context status=ok type={} namespace={}",
                    matched.name(),
                    namespace.label()
                );
            }
            return Ok(namespace);
        }
        Ok(NamespaceRef::clone(&self.forward))
    }

    /// Walks the enclosing chain of `descriptor`. The universe for enclosing
    /// lookups is fetched at most once per resolution; `NotInitialized` there
    /// is logged and treated as no match.
    fn find_enclosing_extension_type(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        cache: &mut EnclosingUniverse,
    ) -> Result<Option<Arc<TypeDescriptor>>, RegistryError> {
        let Some(mut enclosing) = descriptor.enclosing() else {
            return Ok(None);
        };

        if matches!(cache, EnclosingUniverse::Pending) {
            *cache = match self.registry.extension_types() {
                Ok(universe) => EnclosingUniverse::Ready(universe),
                Err(RegistryError::NotInitialized) => EnclosingUniverse::Unavailable,
                Err(err) => return Err(err),
            };
        }
        let universe = match cache {
            EnclosingUniverse::Ready(universe) => universe,
            _ => {
                error!(
                    "event=context_resolve module=context status=error type={} enclosing={} error_code=not_initialized",
                    descriptor.name(),
                    enclosing.name()
                );
                return Ok(None);
            }
        };

        loop {
            if is_extension_type(enclosing, universe) {
                return Ok(Some(Arc::clone(enclosing)));
            }
            match enclosing.enclosing() {
                Some(next) => enclosing = next,
                None => return Ok(None),
            }
        }
    }
}

enum EnclosingUniverse {
    Pending,
    Ready(BTreeSet<String>),
    Unavailable,
}

fn is_extension_type(descriptor: &TypeDescriptor, universe: &BTreeSet<String>) -> bool {
    universe
        .iter()
        .any(|extension_type| descriptor.is_assignable_to(extension_type))
}

#[cfg(test)]
mod tests {
    use super::ContextResolver;
    use crate::bundle::coordinate::BundleCoordinate;
    use crate::context::ambient;
    use crate::context::call_stack::CallStack;
    use crate::namespace::{
        same_namespace, IsolatedNamespace, NamespaceContents, NamespaceRef, TypeDescriptor,
    };
    use crate::registry::{ModuleRegistry, RegistryError};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Universe lookups succeed `ready_calls` times, then report
    /// `NotInitialized`.
    struct FlakyRegistry {
        host: NamespaceRef,
        ready_calls: AtomicUsize,
    }

    impl ModuleRegistry for FlakyRegistry {
        fn providers(&self, _: &str) -> Result<Vec<BundleCoordinate>, RegistryError> {
            Ok(Vec::new())
        }

        fn extension_types(&self) -> Result<BTreeSet<String>, RegistryError> {
            let remaining = self.ready_calls.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(RegistryError::NotInitialized);
            }
            self.ready_calls.store(remaining - 1, Ordering::SeqCst);
            Ok(BTreeSet::from(["acme.api.Parser".to_string()]))
        }

        fn namespace(&self, bundle: &BundleCoordinate) -> Result<NamespaceRef, RegistryError> {
            Err(RegistryError::UnknownBundle(bundle.to_string()))
        }

        fn host_namespace(&self) -> NamespaceRef {
            NamespaceRef::clone(&self.host)
        }
    }

    fn resolver(ready_calls: usize) -> (ContextResolver, NamespaceRef) {
        let host: NamespaceRef = Arc::new(IsolatedNamespace::host(NamespaceContents::new()));
        let registry = Arc::new(FlakyRegistry {
            host: NamespaceRef::clone(&host),
            ready_calls: AtomicUsize::new(ready_calls),
        });
        (ContextResolver::new(registry), host)
    }

    #[test]
    fn enclosing_lookup_failure_counts_as_no_match() {
        let (resolver, host) = resolver(1);
        let outer = Arc::new(TypeDescriptor::host("acme.Outer"));
        let inner = TypeDescriptor::host("acme.Outer.Inner").with_enclosing(outer);
        let stack = CallStack::new().with_frame(inner);

        let resolved = resolver.resolve_stack(&stack).expect("falls back");
        assert!(same_namespace(&resolved, &host));
    }

    #[test]
    fn top_level_not_initialized_propagates() {
        let (resolver, _) = resolver(0);
        let stack = CallStack::new().with_frame(TypeDescriptor::host("acme.Main"));
        let err = resolver.resolve_stack(&stack).err();
        assert_eq!(err, Some(RegistryError::NotInitialized));
    }

    #[test]
    fn empty_stack_still_requires_initialized_registry() {
        let (resolver, _) = resolver(0);
        let err = resolver.resolve_stack(&CallStack::new()).err();
        assert_eq!(err, Some(RegistryError::NotInitialized));
    }

    #[test]
    fn universe_is_fetched_once_per_frame_walk() {
        // Two calls: one for the frames, one shared by every enclosing chain.
        let (resolver, host) = resolver(2);
        let outer = Arc::new(TypeDescriptor::host("acme.Outer"));
        let stack = CallStack::new()
            .with_frame(TypeDescriptor::host("acme.Outer.A").with_enclosing(Arc::clone(&outer)))
            .with_frame(TypeDescriptor::host("acme.Outer.B").with_enclosing(Arc::clone(&outer)))
            .with_frame(TypeDescriptor::host("acme.Main"));

        let resolved = resolver.resolve_stack(&stack).expect("resolves");
        assert!(same_namespace(&resolved, &host));
    }

    #[test]
    fn host_type_implementing_extension_resolves_to_forward_without_pinning() {
        let (resolver, host) = resolver(usize::MAX);
        ambient::set(None);
        let stack = CallStack::new()
            .with_frame(TypeDescriptor::host("acme.Builtin").with_supertype("acme.api.Parser"));

        let resolved = resolver.resolve_stack(&stack).expect("resolves");
        assert!(same_namespace(&resolved, &host));
        assert!(ambient::current().is_none());
    }
}

//! Per-thread ambient namespace.
//!
//! # Invariants
//! - Scoped overrides go through [`AmbientGuard`], which restores exactly the
//!   value captured on install, on every exit path including unwinding.
//! - Nested guards on one thread restore in LIFO order.
//! - Threads do not inherit the slot; use [`spawn`] to carry it over.

use crate::namespace::NamespaceRef;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::thread::{self, JoinHandle};

thread_local! {
    static AMBIENT: RefCell<Option<NamespaceRef>> = const { RefCell::new(None) };
}

/// Current ambient namespace of the calling thread.
pub fn current() -> Option<NamespaceRef> {
    AMBIENT
        .try_with(|slot| slot.borrow().clone())
        .unwrap_or_default()
}

/// Replaces the ambient namespace, returning the previous value.
pub fn set(namespace: Option<NamespaceRef>) -> Option<NamespaceRef> {
    AMBIENT
        .try_with(|slot| slot.replace(namespace))
        .unwrap_or_default()
}

/// Restores the captured ambient namespace when dropped.
#[must_use = "the previous ambient namespace is restored as soon as the guard is dropped"]
pub struct AmbientGuard {
    previous: Option<NamespaceRef>,
    _not_send: PhantomData<*const ()>,
}

impl AmbientGuard {
    /// Installs `namespace` as ambient for the guard's lifetime.
    pub fn install(namespace: NamespaceRef) -> Self {
        Self {
            previous: set(Some(namespace)),
            _not_send: PhantomData,
        }
    }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        set(self.previous.take());
    }
}

/// Spawns a thread that starts with the caller's ambient namespace.
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let inherited = current();
    thread::spawn(move || {
        set(inherited);
        f()
    })
}

#[cfg(test)]
mod tests {
    use super::{current, set, spawn, AmbientGuard};
    use crate::namespace::{same_namespace, IsolatedNamespace, NamespaceContents, NamespaceRef};
    use std::sync::Arc;

    fn namespace() -> NamespaceRef {
        Arc::new(IsolatedNamespace::host(NamespaceContents::new()))
    }

    #[test]
    fn guards_restore_in_lifo_order() {
        let base = namespace();
        set(Some(Arc::clone(&base)));
        {
            let first = namespace();
            let _outer = AmbientGuard::install(Arc::clone(&first));
            {
                let _inner = AmbientGuard::install(namespace());
            }
            assert!(same_namespace(&current().expect("ambient"), &first));
        }
        assert!(same_namespace(&current().expect("ambient"), &base));
        set(None);
    }

    #[test]
    fn spawned_threads_start_with_callers_namespace() {
        let parent = namespace();
        let _guard = AmbientGuard::install(Arc::clone(&parent));

        let seen = spawn(current).join().expect("thread joins");
        assert!(same_namespace(&seen.expect("inherited"), &parent));

        let plain = std::thread::spawn(current).join().expect("thread joins");
        assert!(plain.is_none());
    }
}

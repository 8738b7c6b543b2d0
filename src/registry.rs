//! A process-wide catalog of named namespaces.
//!
//! Some object types register themselves, by name, in whichever namespace is
//! the calling thread's *current scope* when they are created or cloned.
//! Replicating such an object naively would register every replica under the
//! model's name in the same namespace. The [`Managed`](crate::Managed)
//! placement avoids that by building each replica inside a private per-slot
//! namespace and then detaching it.
//!
//! ```
//! use replica_kit::registry::{current_namespace, Catalog};
//!
//! let catalog = Catalog::new();
//! let ns = catalog.mkdir("scratch");
//! {
//!     let _scope = ns.enter();
//!     assert!(current_namespace().unwrap().ptr_eq(&ns));
//! }
//! assert!(current_namespace().is_none());
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// A type that records itself in a [`Namespace`] when created.
///
/// Implementors are replicated with the [`Managed`](crate::Managed)
/// placement.
pub trait Registered {
    /// The namespace the object is currently registered in, if any.
    fn namespace(&self) -> Option<Namespace>;

    /// Remove the object from its namespace. After this call
    /// [`namespace`](Registered::namespace) returns `None`.
    fn detach(&mut self);
}

/// Named collection of namespaces.
pub struct Catalog {
    namespaces: Mutex<BTreeMap<String, Namespace>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            namespaces: Mutex::new(BTreeMap::new()),
        }
    }

    /// The catalog shared by the whole process.
    pub fn global() -> &'static Catalog {
        static GLOBAL: OnceLock<Catalog> = OnceLock::new();
        GLOBAL.get_or_init(Catalog::new)
    }

    /// Return the namespace called `name`, creating it if needed.
    pub fn mkdir(&self, name: &str) -> Namespace {
        self.namespaces
            .lock()
            .entry(name.to_owned())
            .or_insert_with(|| Namespace::new(name))
            .clone()
    }

    /// Look up a namespace by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Namespace> {
        self.namespaces.lock().get(name).cloned()
    }

    /// Drop a namespace from the catalog. Handles to it stay valid.
    pub fn remove(&self, name: &str) -> Option<Namespace> {
        self.namespaces.lock().remove(name)
    }

    /// Number of namespaces in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.namespaces.lock().len()
    }

    /// Returns `true` if the catalog holds no namespace.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.lock().is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("namespaces", &self.namespaces.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

struct NamespaceInner {
    name: String,
    /// Registered object names and how many live objects carry each.
    entries: Mutex<BTreeMap<String, usize>>,
}

/// A shared, named container of registered object names.
#[derive(Clone)]
pub struct Namespace {
    inner: Arc<NamespaceInner>,
}

impl Namespace {
    /// Create a namespace that is not listed in any catalog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(NamespaceInner {
                name: name.into(),
                entries: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// The namespace's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Record an object called `object`.
    ///
    /// Registering a name that is already present is allowed but logged,
    /// since lookups by that name become ambiguous.
    pub fn register(&self, object: &str) {
        let mut entries = self.inner.entries.lock();
        let count = entries.entry(object.to_owned()).or_insert(0);
        if *count > 0 {
            tracing::warn!(
                target: "replica_kit::registry",
                namespace = %self.inner.name,
                object,
                "replacing existing object with the same name"
            );
        }
        *count += 1;
    }

    /// Forget one object called `object`. Returns `false` if none was
    /// registered.
    pub fn unregister(&self, object: &str) -> bool {
        let mut entries = self.inner.entries.lock();
        match entries.get_mut(object) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                entries.remove(object);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if at least one object called `object` is registered.
    #[must_use]
    pub fn contains(&self, object: &str) -> bool {
        self.inner.entries.lock().contains_key(object)
    }

    /// How many live objects are registered under `object`.
    #[must_use]
    pub fn count(&self, object: &str) -> usize {
        self.inner.entries.lock().get(object).copied().unwrap_or(0)
    }

    /// Number of distinct registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Returns `true` if both handles refer to the same namespace.
    #[must_use]
    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Make this namespace the calling thread's current scope until the
    /// returned guard is dropped.
    pub fn enter(&self) -> ScopeGuard {
        let previous = CURRENT.with(|current| current.replace(Some(self.clone())));
        ScopeGuard {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.inner.name)
            .field("entries", &*self.inner.entries.lock())
            .finish()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Namespace>> = const { RefCell::new(None) };
}

/// The calling thread's current namespace scope.
#[must_use]
pub fn current_namespace() -> Option<Namespace> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Restores the previous scope on drop. Bound to the thread that created it.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    previous: Option<Namespace>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("previous", &self.previous.as_ref().map(Namespace::name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdir_returns_same_namespace() {
        let catalog = Catalog::new();
        let a = catalog.mkdir("a");
        let again = catalog.mkdir("a");
        assert!(a.ptr_eq(&again));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn remove_forgets_namespace() {
        let catalog = Catalog::new();
        catalog.mkdir("gone");
        assert!(catalog.remove("gone").is_some());
        assert!(catalog.get("gone").is_none());
        assert!(catalog.is_empty());
    }

    #[test]
    fn register_counts_duplicates() {
        let ns = Namespace::new("ns");
        ns.register("h");
        ns.register("h");
        assert_eq!(ns.count("h"), 2);
        assert_eq!(ns.len(), 1);

        assert!(ns.unregister("h"));
        assert!(ns.contains("h"));
        assert!(ns.unregister("h"));
        assert!(!ns.contains("h"));
        assert!(!ns.unregister("h"));
    }

    #[test]
    fn scopes_nest_and_restore() {
        let outer = Namespace::new("outer");
        let inner = Namespace::new("inner");
        assert!(current_namespace().is_none());
        {
            let _outer = outer.enter();
            {
                let _inner = inner.enter();
                assert!(current_namespace().unwrap().ptr_eq(&inner));
            }
            assert!(current_namespace().unwrap().ptr_eq(&outer));
        }
        assert!(current_namespace().is_none());
    }

    #[test]
    fn scope_is_per_thread() {
        let ns = Namespace::new("local");
        let _scope = ns.enter();
        std::thread::spawn(|| assert!(current_namespace().is_none()))
            .join()
            .unwrap();
        assert!(current_namespace().is_some());
    }
}

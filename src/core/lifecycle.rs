/*!
Resource lifecycle: one-shot teardown and parent/child bookkeeping.

A [`Destroyable`] resource releases its native handles exactly once; later
calls are no-ops. A parent (a slot) keeps a [`ResourceRegistry`] of weak
references to its children (sessions) so it can tear them down
deterministically when it goes away. Children unregister themselves when they
are destroyed first.
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{trace, warn};

use crate::core::error::{Error, Result};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a tracked resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resource with a one-shot teardown.
///
/// `destroy` must release native resources at most once; calling it again
/// succeeds without side effects.
pub trait Destroyable: Send + Sync {
    /// Release the resource
    fn destroy(&self) -> Result<()>;

    /// Whether `destroy` has completed
    fn is_destroyed(&self) -> bool;
}

type Children = HashMap<ResourceId, Weak<dyn Destroyable>>;

#[derive(Default)]
struct RegistryState {
    children: Children,
    closed: bool,
}

fn lock_registry(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    // The map stays consistent across a panic, so keep using it
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of child resources held by their parent
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ResourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a child under `id`.
    ///
    /// Fails with [`Error::Destroyed`] once the registry has been closed by
    /// [`destroy_all`](Self::destroy_all).
    pub fn register(&self, id: ResourceId, child: Weak<dyn Destroyable>) -> Result<()> {
        let mut state = lock_registry(&self.state);
        if state.closed {
            return Err(Error::Destroyed("Slot"));
        }
        state.children.insert(id, child);
        trace!(child = %id, "registered child resource");
        Ok(())
    }

    /// Number of children that are still alive
    pub fn len(&self) -> usize {
        let mut state = lock_registry(&self.state);
        state.children.retain(|_, child| child.strong_count() > 0);
        state.children.len()
    }

    /// Whether no live children are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the registry and destroy every live child.
    ///
    /// Every child is destroyed even if one of them fails; the first error is
    /// returned.
    pub fn destroy_all(&self) -> Result<()> {
        let children: Vec<(ResourceId, Weak<dyn Destroyable>)> = {
            let mut state = lock_registry(&self.state);
            state.closed = true;
            state.children.drain().collect()
        };

        let mut first_error = None;
        for (id, child) in children {
            let Some(child) = child.upgrade() else {
                continue;
            };
            if let Err(e) = child.destroy() {
                warn!(child = %id, error = %e, "failed to destroy child resource");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn link(&self, id: ResourceId) -> ParentLink {
        ParentLink {
            registry: Arc::downgrade(&self.state),
            id,
        }
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_registry(&self.state);
        f.debug_struct("ResourceRegistry")
            .field("children", &state.children.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Back-reference from a child to its parent's registry
#[derive(Debug, Clone)]
struct ParentLink {
    registry: Weak<Mutex<RegistryState>>,
    id: ResourceId,
}

impl fmt::Debug for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistryState({} children)", self.children.len())
    }
}

/// Lifecycle bookkeeping embedded in every destroyable resource
#[derive(Debug)]
pub struct Lifecycle {
    id: ResourceId,
    destroyed: AtomicBool,
    parent: Option<ParentLink>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Bookkeeping for a resource without a parent
    pub fn new() -> Self {
        Self {
            id: ResourceId::next(),
            destroyed: AtomicBool::new(false),
            parent: None,
        }
    }

    /// Bookkeeping for a child of `parent`
    ///
    /// The child still has to be registered once it is shared.
    pub fn with_parent(parent: &ResourceRegistry) -> Self {
        let id = ResourceId::next();
        Self {
            id,
            destroyed: AtomicBool::new(false),
            parent: Some(parent.link(id)),
        }
    }

    /// Identifier of the resource
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Whether the resource has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Fail with [`Error::Destroyed`] if the resource is gone
    pub fn ensure_alive(&self, what: &'static str) -> Result<()> {
        if self.is_destroyed() {
            return crate::destroyed_err!(what);
        }
        Ok(())
    }

    /// Mark the resource destroyed and detach it from its parent.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn destroy(&self) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(parent) = &self.parent {
            if let Some(registry) = parent.registry.upgrade() {
                lock_registry(&registry).children.remove(&parent.id);
                trace!(child = %parent.id, "detached from parent");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Probe {
        lifecycle: Lifecycle,
        teardowns: AtomicUsize,
    }

    impl Probe {
        fn new(registry: &ResourceRegistry) -> Arc<Probe> {
            let probe = Arc::new(Probe {
                lifecycle: Lifecycle::with_parent(registry),
                teardowns: AtomicUsize::new(0),
            });
            let weak: Weak<dyn Destroyable> = Arc::downgrade(&probe) as Weak<dyn Destroyable>;
            registry.register(probe.lifecycle.id(), weak).unwrap();
            probe
        }
    }

    impl Destroyable for Probe {
        fn destroy(&self) -> Result<()> {
            if self.lifecycle.destroy() {
                self.teardowns.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn is_destroyed(&self) -> bool {
            self.lifecycle.is_destroyed()
        }
    }

    #[test]
    fn test_destroy_is_one_shot() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.ensure_alive("Probe").is_ok());
        assert!(lifecycle.destroy());
        assert!(!lifecycle.destroy());
        assert_eq!(lifecycle.ensure_alive("Probe"), Err(Error::Destroyed("Probe")));
    }

    #[test]
    fn test_child_unregisters_on_destroy() {
        let registry = ResourceRegistry::new();
        let probe = Probe::new(&registry);
        assert_eq!(registry.len(), 1);

        probe.destroy().unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_destroy_all_reaches_live_children() {
        let registry = ResourceRegistry::new();
        let a = Probe::new(&registry);
        let b = Probe::new(&registry);
        let c = Probe::new(&registry);
        drop(c);

        registry.destroy_all().unwrap();
        assert!(a.is_destroyed() && b.is_destroyed());
        assert_eq!(a.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(b.teardowns.load(Ordering::SeqCst), 1);

        // Closed registries accept no new children
        let late = Arc::new(Probe {
            lifecycle: Lifecycle::new(),
            teardowns: AtomicUsize::new(0),
        });
        let weak: Weak<dyn Destroyable> = Arc::downgrade(&late) as Weak<dyn Destroyable>;
        assert_eq!(
            registry.register(late.lifecycle.id(), weak),
            Err(Error::Destroyed("Slot"))
        );
    }

    #[test]
    fn test_dead_children_are_not_counted() {
        let registry = ResourceRegistry::new();
        let probe = Probe::new(&registry);
        drop(probe);
        assert_eq!(registry.len(), 0);
    }
}

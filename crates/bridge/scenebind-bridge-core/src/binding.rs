//! Native reference ownership for wrappers.
//!
//! A [`Binding`] owns exactly one native reference on the container it is
//! bound to and gives it back when it is dropped or rebound. The host's own
//! reference counting of the wrapper is independent; the only job here is
//! keeping the native count at one or more while the wrapper exists.

use std::sync::Arc;

use log::debug;
use scenebind_native::{ContainerId, SceneDatabase};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainerBinding {
    Unbound,
    Bound(ContainerId),
}

pub struct Binding {
    db: Arc<dyn SceneDatabase>,
    state: ContainerBinding,
}

impl Binding {
    pub fn unbound(db: Arc<dyn SceneDatabase>) -> Self {
        Self {
            db,
            state: ContainerBinding::Unbound,
        }
    }

    /// Bind to `id`, taking a reference. Returns `None` when the container
    /// does not exist.
    pub fn bound(db: Arc<dyn SceneDatabase>, id: ContainerId) -> Option<Self> {
        let mut binding = Self::unbound(db);
        binding.rebind(Some(id)).then_some(binding)
    }

    pub fn state(&self) -> ContainerBinding {
        self.state
    }

    pub fn container(&self) -> Option<ContainerId> {
        match self.state {
            ContainerBinding::Bound(id) => Some(id),
            ContainerBinding::Unbound => None,
        }
    }

    /// Switch to `target`. The new container is acquired before the old one
    /// is released, so rebinding to the same container never destroys it.
    /// Fails without changing anything when `target` does not exist.
    pub fn rebind(&mut self, target: Option<ContainerId>) -> bool {
        if let Some(id) = target {
            if !self.db.ref_container(id) {
                return false;
            }
        }
        let previous = std::mem::replace(
            &mut self.state,
            target.map_or(ContainerBinding::Unbound, ContainerBinding::Bound),
        );
        if let ContainerBinding::Bound(old) = previous {
            self.db.unref_container(old);
        }
        debug!("binding {previous:?} -> {:?}", self.state);
        true
    }
}

impl Clone for Binding {
    /// A clone holds its own reference.
    fn clone(&self) -> Self {
        let mut binding = Self::unbound(Arc::clone(&self.db));
        binding.rebind(self.container());
        binding
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        if let ContainerBinding::Bound(id) = self.state {
            self.db.unref_container(id);
        }
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding").field("state", &self.state).finish()
    }
}

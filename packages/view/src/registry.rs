//! Namespace → view space lookup
//!
//! One live `ViewSpace` per namespace key for the lifetime of the registry.
//! Spaces are created on first use. The registry is an explicit value that
//! is passed to whoever needs to resolve a namespace; clones share state.

use crate::space::ViewSpace;
use entityverse_common::Namespace;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ViewSpaceRegistry {
    spaces: Arc<Mutex<HashMap<Namespace, ViewSpace>>>,
}

impl ViewSpaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn spaces(&self) -> MutexGuard<'_, HashMap<Namespace, ViewSpace>> {
        self.spaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the space for `namespace`, creating it on first use
    pub fn get(&self, namespace: &Namespace) -> ViewSpace {
        self.spaces()
            .entry(namespace.clone())
            .or_insert_with(|| {
                debug!(%namespace, "creating view space");
                ViewSpace::new(namespace.clone())
            })
            .clone()
    }

    pub fn global(&self) -> ViewSpace {
        self.get(&Namespace::Global)
    }

    pub fn contains(&self, namespace: &Namespace) -> bool {
        self.spaces().contains_key(namespace)
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        self.spaces().keys().cloned().collect()
    }

    /// Destroy every entity of `namespace`; the space itself stays registered
    pub fn clear(&self, namespace: &Namespace) {
        let space = self.spaces().get(namespace).cloned();
        if let Some(space) = space {
            space.clear();
        }
    }

    /// Clear all spaces and forget them
    pub fn reset(&self) {
        let spaces: Vec<ViewSpace> = self.spaces().drain().map(|(_, space)| space).collect();
        for space in spaces {
            space.clear();
        }
    }
}

//! # Entity View Space
//!
//! Container for all entity views of one namespace. It is the single source
//! of truth for topology (root list, ordered child lists, parent links) and
//! owns every entity's change accumulator.
//!
//! ## Invariants
//!
//! - The root list and the child lists partition the live entity ids: every
//!   entity is either a root or a child of exactly one parent.
//! - Every sibling list is sorted by ascending order, ties by insertion.
//! - Adjacency is updated first, the parent back-reference after.
//!
//! ## Trail construction
//!
//! ```text
//! pre-order walk ──► StructuralChanges (create / set parent / update order)
//!                ──► ContentUpdates    (change properties), then clear
//! removed list   ──► Removal           (destroy), then dispose
//! ```

use crate::changes::{EntityChanges, PropertyEq};
use crate::trail::{ChangeTrail, ChangeTrailPhase};
use entityverse_common::{
    insert_ordered, ordered_position, remove_from, EntityError, EntityId, EntityResult, Namespace,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Authoring-side state of one entity
#[derive(Debug)]
struct NodeRecord {
    token: String,
    parent: Option<EntityId>,
    order: f64,
}

#[derive(Debug)]
struct ViewInstance {
    node: NodeRecord,
    // a Vec and not a set: insertion order matters for ties
    children: Vec<EntityId>,
    changes: EntityChanges,
}

#[derive(Debug)]
pub struct EntityViewSpace {
    namespace: Namespace,
    entities: HashMap<EntityId, ViewInstance>,
    root_entities: Vec<EntityId>,
    removed_entity_changes: Vec<EntityChanges>,
}

fn order_in(entities: &HashMap<EntityId, ViewInstance>, id: &EntityId) -> f64 {
    entities.get(id).map(|entry| entry.node.order).unwrap_or(0.0)
}

/// `NaN` has no place in a sorted list
pub(crate) fn normalize_order(order: f64) -> f64 {
    if order.is_nan() {
        0.0
    } else {
        order
    }
}

impl EntityViewSpace {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            entities: HashMap::new(),
            root_entities: Vec::new(),
            removed_entity_changes: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Register a new entity and seed its creation record
    pub fn add_entity(
        &mut self,
        id: EntityId,
        token: impl Into<String>,
        parent: Option<&EntityId>,
        order: f64,
    ) -> EntityResult<()> {
        if self.entities.contains_key(&id) {
            return Err(EntityError::DuplicateIdentity(id));
        }
        if let Some(parent) = parent {
            if !self.entities.contains_key(parent) {
                return Err(EntityError::UnknownParent(parent.clone()));
            }
        }

        let token = token.into();
        let order = normalize_order(order);
        trace!(namespace = %self.namespace, %id, %token, "add entity");

        let changes = EntityChanges::new(id.clone(), token.clone(), order);
        self.entities.insert(
            id.clone(),
            ViewInstance {
                node: NodeRecord {
                    token,
                    parent: None,
                    order,
                },
                children: Vec::new(),
                changes,
            },
        );

        match parent {
            Some(parent) => self.add_to_children(parent, &id),
            None => {
                self.insert_root(&id);
                Ok(())
            }
        }
    }

    pub fn has_entity(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn is_root_entity(&self, id: &EntityId) -> bool {
        self.root_entities.contains(id)
    }

    pub fn is_child_of(&self, child: &EntityId, parent: &EntityId) -> bool {
        self.entities
            .get(parent)
            .map(|entry| entry.children.contains(child))
            .unwrap_or(false)
    }

    pub fn parent_of(&self, id: &EntityId) -> Option<&EntityId> {
        self.entities.get(id).and_then(|entry| entry.node.parent.as_ref())
    }

    pub fn order_of(&self, id: &EntityId) -> Option<f64> {
        self.entities.get(id).map(|entry| entry.node.order)
    }

    pub fn token_of(&self, id: &EntityId) -> Option<&str> {
        self.entities.get(id).map(|entry| entry.node.token.as_str())
    }

    pub fn children_of(&self, id: &EntityId) -> &[EntityId] {
        self.entities
            .get(id)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    /// All live entity ids, in no particular order
    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys()
    }

    pub fn root_entities(&self) -> &[EntityId] {
        &self.root_entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// True if the next build would emit at least one entry
    pub fn has_pending_changes(&self) -> bool {
        !self.removed_entity_changes.is_empty()
            || self.entities.values().any(|entry| entry.changes.has_changes())
    }

    /// Latest staged or known property value
    pub fn property_of(&self, id: &EntityId, name: &str) -> Option<&Value> {
        self.entities
            .get(id)
            .and_then(|entry| entry.changes.current_property(name))
    }

    /// Is `ancestor` on the parent chain of `id`
    pub fn is_ancestor(&self, ancestor: &EntityId, id: &EntityId) -> bool {
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent_of(parent);
        }
        false
    }

    /// Remove a single entity; its children are orphaned to the root list
    pub fn remove_entity(&mut self, id: &EntityId) {
        let Some(entry) = self.entities.get(id) else {
            return;
        };
        trace!(namespace = %self.namespace, %id, "remove entity");

        for child in entry.children.clone() {
            self.remove_child_from_parent(&child, id);
        }

        let Some(mut entry) = self.entities.remove(id) else {
            return;
        };

        if let Some(parent) = &entry.node.parent {
            if let Some(parent_entry) = self.entities.get_mut(parent) {
                remove_from(&mut parent_entry.children, id);
            }
        }
        remove_from(&mut self.root_entities, id);

        entry.changes.destroy_entity();
        self.removed_entity_changes.push(entry.changes);
    }

    /// Remove an entity together with all of its descendants (children first)
    pub fn remove_entity_sub_tree(&mut self, id: &EntityId) {
        let Some(entry) = self.entities.get(id) else {
            return;
        };
        for child in entry.children.clone() {
            self.remove_entity_sub_tree(&child);
        }
        self.remove_entity(id);
    }

    /// Attach `child` below `parent`, detaching it from any previous parent
    pub fn add_to_children(&mut self, parent: &EntityId, child: &EntityId) -> EntityResult<()> {
        if !self.entities.contains_key(parent) {
            return Err(EntityError::UnknownParent(parent.clone()));
        }
        if !self.entities.contains_key(child) {
            return Ok(());
        }

        match self.parent_of(child).cloned() {
            Some(current) if &current == parent => return Ok(()),
            Some(current) => self.remove_child_from_parent(child, &current),
            None => {}
        }

        let order = order_in(&self.entities, child);
        let index = ordered_position(self.children_of(parent), order, |id| {
            order_in(&self.entities, id)
        });
        if let Some(entry) = self.entities.get_mut(parent) {
            entry.children.insert(index, child.clone());
        }
        remove_from(&mut self.root_entities, child);

        if let Some(entry) = self.entities.get_mut(child) {
            entry.node.parent = Some(parent.clone());
            entry.changes.set_parent(Some(parent.clone()));
        }
        trace!(namespace = %self.namespace, %parent, %child, "add to children");
        Ok(())
    }

    /// `add_to_children` with a cycle check
    pub fn add_child(&mut self, parent: &EntityId, child: &EntityId) -> EntityResult<()> {
        if !self.entities.contains_key(parent) {
            return Err(EntityError::UnknownParent(parent.clone()));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(EntityError::CycleDetected {
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        self.add_to_children(parent, child)
    }

    /// Detach `child` from `parent` and make it a root
    pub fn remove_child_from_parent(&mut self, child: &EntityId, parent: &EntityId) {
        let Some(entry) = self.entities.get_mut(parent) else {
            return;
        };
        if !remove_from(&mut entry.children, child) {
            return;
        }

        self.insert_root(child);
        if let Some(entry) = self.entities.get_mut(child) {
            entry.node.parent = None;
            entry.changes.set_parent(None);
        }
        trace!(namespace = %self.namespace, %parent, %child, "remove child from parent");
    }

    /// Detach `id` from whatever parent it has
    pub fn remove_from_parent(&mut self, id: &EntityId) {
        if let Some(parent) = self.parent_of(id).cloned() {
            self.remove_child_from_parent(id, &parent);
        }
    }

    /// Update the order of `id` and re-sort it among its siblings
    pub fn change_order(&mut self, id: &EntityId, order: f64) {
        let order = normalize_order(order);
        let Some(entry) = self.entities.get_mut(id) else {
            return;
        };
        if entry.node.order == order {
            return;
        }
        entry.node.order = order;
        let parent = entry.node.parent.clone();

        match parent {
            Some(parent) => {
                if let Some(parent_entry) = self.entities.get_mut(&parent) {
                    remove_from(&mut parent_entry.children, id);
                }
                let index = ordered_position(self.children_of(&parent), order, |id| {
                    order_in(&self.entities, id)
                });
                if let Some(parent_entry) = self.entities.get_mut(&parent) {
                    parent_entry.children.insert(index, id.clone());
                }
            }
            None => {
                remove_from(&mut self.root_entities, id);
                self.insert_root(id);
            }
        }

        if let Some(entry) = self.entities.get_mut(id) {
            entry.changes.change_order(order);
        }
        trace!(namespace = %self.namespace, %id, order, "change order");
    }

    pub fn set_property(
        &mut self,
        id: &EntityId,
        name: &str,
        value: Value,
        is_equal: Option<PropertyEq<'_>>,
    ) {
        if let Some(entry) = self.entities.get_mut(id) {
            entry.changes.change_property(name, value, is_equal);
        }
    }

    pub fn remove_property(&mut self, id: &EntityId, name: &str) {
        if let Some(entry) = self.entities.get_mut(id) {
            entry.changes.remove_property(name);
        }
    }

    /// Destroy every entity in the namespace
    ///
    /// The destruction entries are still emitted by the next build.
    pub fn clear(&mut self) {
        for id in self.root_entities.clone() {
            self.remove_entity_sub_tree(&id);
        }

        if !self.root_entities.is_empty() {
            panic!("entity-view-space clear panic: root entities is not empty!");
        }
        if !self.entities.is_empty() {
            panic!("entity-view-space clear panic: entities is not empty!");
        }
    }

    /// Turn everything accumulated since the last build into a change trail
    pub fn build_change_trails(&mut self) -> ChangeTrail {
        let mut trail = ChangeTrail::new();
        let path = self.build_path_of_changes();

        for id in &path {
            if let Some(entry) = self.entities.get_mut(id) {
                entry
                    .changes
                    .build_change_trail(&mut trail, ChangeTrailPhase::StructuralChanges);
            }
        }
        let structural = trail.len();

        for id in &path {
            if let Some(entry) = self.entities.get_mut(id) {
                entry
                    .changes
                    .build_change_trail(&mut trail, ChangeTrailPhase::ContentUpdates);
                entry.changes.clear();
            }
        }
        let content = trail.len() - structural;

        let removed = self.removed_entity_changes.len();
        for mut changes in self.removed_entity_changes.drain(..) {
            changes.build_change_trail(&mut trail, ChangeTrailPhase::Removal);
        }

        debug!(
            namespace = %self.namespace,
            structural,
            content,
            removed,
            "built change trail"
        );
        trail
    }

    /// Pre-order walk collecting every entity with pending changes
    fn build_path_of_changes(&self) -> Vec<EntityId> {
        let mut path = Vec::new();
        let mut stack: Vec<&EntityId> = self.root_entities.iter().rev().collect();

        while let Some(id) = stack.pop() {
            let Some(entry) = self.entities.get(id) else {
                continue;
            };
            if entry.changes.has_changes() {
                path.push(id.clone());
            }
            stack.extend(entry.children.iter().rev());
        }

        path
    }

    fn insert_root(&mut self, id: &EntityId) {
        let order = order_in(&self.entities, id);
        insert_ordered(&mut self.root_entities, id.clone(), order, |id| {
            order_in(&self.entities, id)
        });
    }
}

/// Shared handle to the view space of one namespace
#[derive(Debug, Clone)]
pub struct ViewSpace {
    namespace: Namespace,
    inner: Arc<Mutex<EntityViewSpace>>,
}

impl ViewSpace {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EntityViewSpace::new(namespace.clone()))),
            namespace,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn lock(&self) -> MutexGuard<'_, EntityViewSpace> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn build_change_trails(&self) -> ChangeTrail {
        self.lock().build_change_trails()
    }

    pub fn clear(&self) {
        self.lock().clear()
    }

    pub fn ptr_eq(&self, other: &ViewSpace) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

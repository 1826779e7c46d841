//! # Entity View
//!
//! The authoring-side proxy of an entity. A view is a cheap handle (id,
//! token and the owning space); all state lives in the `EntityViewSpace`,
//! and every mutation is forwarded there. Nothing a view does is visible to a
//! consumer before the next trail build.
//!
//! Operations on a view whose entity was destroyed are no-ops.

use crate::changes::PropertyEq;
use crate::space::{normalize_order, ViewSpace};
use entityverse_common::{generate_uuid, EntityError, EntityId, EntityResult, Namespace};
use serde_json::Value;
use std::fmt;

#[derive(Clone)]
pub struct EntityView {
    id: EntityId,
    token: String,
    space: ViewSpace,
}

/// Options for creating an `EntityView`
pub struct EntityViewBuilder<'a> {
    token: String,
    id: Option<EntityId>,
    parent: Option<&'a EntityView>,
    order: f64,
}

impl<'a> EntityViewBuilder<'a> {
    pub fn parent(mut self, parent: &'a EntityView) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn order(mut self, order: f64) -> Self {
        self.order = order;
        self
    }

    /// Use an explicit id instead of a fresh uuid
    pub fn id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Register the entity with `space`
    pub fn build(self, space: &ViewSpace) -> EntityResult<EntityView> {
        if let Some(parent) = self.parent {
            if parent.namespace() != space.namespace() {
                return Err(EntityError::NamespaceMismatch {
                    expected: space.namespace().clone(),
                    found: parent.namespace().clone(),
                });
            }
            if !parent.space.ptr_eq(space) {
                return Err(EntityError::ForeignSpace(parent.id.clone()));
            }
        }

        let id = self.id.unwrap_or_else(generate_uuid);
        space.lock().add_entity(
            id.clone(),
            self.token.clone(),
            self.parent.map(|parent| &parent.id),
            normalize_order(self.order),
        )?;

        Ok(EntityView {
            id,
            token: self.token,
            space: space.clone(),
        })
    }
}

impl EntityView {
    pub fn builder<'a>(token: impl Into<String>) -> EntityViewBuilder<'a> {
        EntityViewBuilder {
            token: token.into(),
            id: None,
            parent: None,
            order: 0.0,
        }
    }

    /// Create a root entity with default order
    pub fn new(space: &ViewSpace, token: impl Into<String>) -> EntityResult<Self> {
        Self::builder(token).build(space)
    }

    /// Create an entity below `parent`, in the parent's namespace
    pub fn child_of(parent: &EntityView, token: impl Into<String>) -> EntityResult<Self> {
        Self::builder(token).parent(parent).build(&parent.space)
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn namespace(&self) -> &Namespace {
        self.space.namespace()
    }

    pub fn space(&self) -> &ViewSpace {
        &self.space
    }

    /// Still registered with its space
    pub fn exists(&self) -> bool {
        self.space.lock().has_entity(&self.id)
    }

    fn view_of(&self, id: &EntityId, token: &str) -> EntityView {
        EntityView {
            id: id.clone(),
            token: token.to_string(),
            space: self.space.clone(),
        }
    }

    pub fn parent(&self) -> Option<EntityView> {
        let space = self.space.lock();
        let parent = space.parent_of(&self.id)?;
        let token = space.token_of(parent)?;
        Some(self.view_of(parent, token))
    }

    /// `Some` reparents, `None` makes the entity a root
    pub fn set_parent(&self, parent: Option<&EntityView>) -> EntityResult<()> {
        match parent {
            Some(parent) => parent.add_child(self),
            None => {
                self.remove_from_parent();
                Ok(())
            }
        }
    }

    /// Children in sibling order
    pub fn children(&self) -> Vec<EntityView> {
        let space = self.space.lock();
        space
            .children_of(&self.id)
            .iter()
            .filter_map(|id| space.token_of(id).map(|token| self.view_of(id, token)))
            .collect()
    }

    pub fn is_child_of(&self, parent: &EntityView) -> bool {
        self.space.ptr_eq(&parent.space) && self.space.lock().is_child_of(&self.id, &parent.id)
    }

    /// Items in a children list are sorted by ascending order, then by
    /// insertion order. Destroyed entities report 0.
    pub fn order(&self) -> f64 {
        self.space.lock().order_of(&self.id).unwrap_or(0.0)
    }

    pub fn set_order(&self, order: f64) {
        self.space.lock().change_order(&self.id, order);
    }

    pub fn add_child(&self, child: &EntityView) -> EntityResult<()> {
        if child.namespace() != self.namespace() {
            return Err(EntityError::NamespaceMismatch {
                expected: self.namespace().clone(),
                found: child.namespace().clone(),
            });
        }
        // same namespace does not mean same space
        if !self.space.ptr_eq(&child.space) {
            return Err(EntityError::ForeignSpace(child.id.clone()));
        }
        self.space.lock().add_child(&self.id, &child.id)
    }

    pub fn remove_from_parent(&self) {
        self.space.lock().remove_from_parent(&self.id);
    }

    pub fn set_property(&self, name: &str, value: impl Into<Value>) {
        self.space
            .lock()
            .set_property(&self.id, name, value.into(), None);
    }

    /// Like `set_property`, but `is_equal` decides whether the value changed
    ///
    /// `is_equal` runs against a copy of the current value with the space
    /// unlocked, so it may use other views of the same space.
    pub fn set_property_with<F>(&self, name: &str, value: impl Into<Value>, is_equal: F)
    where
        F: Fn(&Value, &Value) -> bool,
    {
        let value = value.into();
        loop {
            let current = self.property(name);
            if let Some(current) = &current {
                if is_equal(current, &value) {
                    return;
                }
            }

            let mut space = self.space.lock();
            // written while `is_equal` ran, compare again
            if space.property_of(&self.id, name) != current.as_ref() {
                continue;
            }
            let unequal: PropertyEq<'_> = &|_, _| false;
            space.set_property(&self.id, name, value, Some(unequal));
            return;
        }
    }

    pub fn remove_property(&self, name: &str) {
        self.space.lock().remove_property(&self.id, name);
    }

    /// Latest staged or known value of a property
    pub fn property(&self, name: &str) -> Option<Value> {
        self.space.lock().property_of(&self.id, name).cloned()
    }

    /// Detach from the parent and remove the entity; children become roots
    pub fn destroy(&self) {
        let mut space = self.space.lock();
        space.remove_from_parent(&self.id);
        space.remove_entity(&self.id);
    }

    /// Remove the entity and all of its descendants
    pub fn destroy_subtree(&self) {
        let mut space = self.space.lock();
        space.remove_from_parent(&self.id);
        space.remove_entity_sub_tree(&self.id);
    }
}

impl PartialEq for EntityView {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.space.ptr_eq(&other.space)
    }
}

impl fmt::Debug for EntityView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityView")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("namespace", self.namespace())
            .finish()
    }
}

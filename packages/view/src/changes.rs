//! # Change Accumulator
//!
//! Every live entity owns one `EntityChanges`. It records what happened to
//! the entity since the last trail build and nothing more:
//!
//! - the creation record, until the first build consumes it
//! - a parent and/or order change
//! - property upserts and removals, deduplicated against the values the
//!   consumer already knows
//! - the destroyed flag
//!
//! The owning view space asks it to write its entries phase by phase and
//! clears it afterwards.

use crate::trail::{ChangeTrail, ChangeTrailEntry, ChangeTrailPhase, PropertyChange};
use entityverse_common::EntityId;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::HashMap;

/// Custom equality used to suppress property writes that change nothing
pub type PropertyEq<'a> = &'a dyn Fn(&Value, &Value) -> bool;

#[derive(Debug)]
pub struct EntityChanges {
    id: EntityId,
    token: String,

    parent: Option<EntityId>,
    order: f64,

    /// Creation not yet emitted
    create_pending: bool,
    parent_changed: bool,
    order_changed: bool,

    properties: IndexMap<String, Value>,
    removed_properties: IndexSet<String>,

    /// Property values as of the last build
    known_properties: HashMap<String, Value>,

    destroyed: bool,
}

impl EntityChanges {
    pub fn new(id: EntityId, token: impl Into<String>, order: f64) -> Self {
        Self {
            id,
            token: token.into(),
            parent: None,
            order,
            create_pending: true,
            parent_changed: false,
            order_changed: false,
            properties: IndexMap::new(),
            removed_properties: IndexSet::new(),
            known_properties: HashMap::new(),
            destroyed: false,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_create_pending(&self) -> bool {
        self.create_pending
    }

    pub fn set_parent(&mut self, parent: Option<EntityId>) {
        if self.destroyed {
            return;
        }
        self.parent = parent;
        if !self.create_pending {
            self.parent_changed = true;
        }
    }

    pub fn change_order(&mut self, order: f64) {
        if self.destroyed {
            return;
        }
        self.order = order;
        if !self.create_pending {
            self.order_changed = true;
        }
    }

    /// Stage a property write
    ///
    /// Without `is_equal`, values are compared structurally.
    pub fn change_property(&mut self, name: &str, value: Value, is_equal: Option<PropertyEq<'_>>) {
        if self.destroyed {
            return;
        }

        let same = |a: &Value, b: &Value| match is_equal {
            Some(eq) => eq(a, b),
            None => a == b,
        };

        if let Some(current) = self.current_property(name) {
            if same(current, &value) {
                return;
            }
        }

        self.removed_properties.shift_remove(name);

        match self.known_properties.get(name) {
            // back to what the consumer already has
            Some(known) if same(known, &value) => {
                self.properties.shift_remove(name);
            }
            _ => {
                self.properties.insert(name.to_string(), value);
            }
        }
    }

    pub fn remove_property(&mut self, name: &str) {
        if self.destroyed {
            return;
        }
        self.properties.shift_remove(name);
        if self.known_properties.contains_key(name) {
            self.removed_properties.insert(name.to_string());
        }
    }

    /// Latest staged or known value of a property
    pub fn current_property(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.properties.get(name) {
            return Some(value);
        }
        if self.removed_properties.contains(name) {
            return None;
        }
        self.known_properties.get(name)
    }

    pub fn has_property_changes(&self) -> bool {
        !self.properties.is_empty() || !self.removed_properties.is_empty()
    }

    /// Anything to emit besides destruction
    pub fn has_changes(&self) -> bool {
        self.create_pending || self.parent_changed || self.order_changed || self.has_property_changes()
    }

    pub fn destroy_entity(&mut self) {
        self.destroyed = true;
    }

    pub fn build_change_trail(&mut self, trail: &mut ChangeTrail, phase: ChangeTrailPhase) {
        match phase {
            ChangeTrailPhase::StructuralChanges => self.build_structural_changes(trail),
            ChangeTrailPhase::ContentUpdates => self.build_content_updates(trail),
            ChangeTrailPhase::Removal => {
                if self.destroyed {
                    trail.push(ChangeTrailEntry::DestroyEntity { id: self.id.clone() });
                }
            }
        }
    }

    fn build_structural_changes(&mut self, trail: &mut ChangeTrail) {
        if self.create_pending {
            // staged properties travel with the creation
            let properties: Vec<(String, Value)> = self.properties.drain(..).collect();
            for (name, value) in &properties {
                self.known_properties.insert(name.clone(), value.clone());
            }
            self.removed_properties.clear();

            trail.push(ChangeTrailEntry::CreateEntity {
                id: self.id.clone(),
                token: self.token.clone(),
                parent_id: self.parent.clone(),
                order: (self.order != 0.0).then_some(self.order),
                properties: (!properties.is_empty()).then_some(properties),
            });
        } else if self.parent_changed {
            trail.push(ChangeTrailEntry::SetParent {
                id: self.id.clone(),
                parent_id: self.parent.clone(),
                order: self.order_changed.then_some(self.order),
            });
        } else if self.order_changed {
            trail.push(ChangeTrailEntry::UpdateOrder {
                id: self.id.clone(),
                order: self.order,
            });
        }
    }

    fn build_content_updates(&mut self, trail: &mut ChangeTrail) {
        if !self.has_property_changes() {
            return;
        }

        let properties = self
            .properties
            .iter()
            .map(|(name, value)| PropertyChange::Set {
                name: name.clone(),
                value: value.clone(),
            })
            .chain(
                self.removed_properties
                    .iter()
                    .map(|name| PropertyChange::Remove { name: name.clone() }),
            )
            .collect();

        trail.push(ChangeTrailEntry::ChangeProperties {
            id: self.id.clone(),
            properties,
        });
    }

    /// Forget everything emitted; the entity stays live
    pub fn clear(&mut self) {
        self.create_pending = false;
        self.parent_changed = false;
        self.order_changed = false;

        for (name, value) in self.properties.drain(..) {
            self.known_properties.insert(name, value);
        }
        for name in self.removed_properties.drain(..) {
            self.known_properties.remove(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(changes: &mut EntityChanges) -> ChangeTrail {
        let mut trail = Vec::new();
        changes.build_change_trail(&mut trail, ChangeTrailPhase::StructuralChanges);
        changes.build_change_trail(&mut trail, ChangeTrailPhase::ContentUpdates);
        changes.clear();
        trail
    }

    #[test]
    fn test_creation_folds_parent_order_and_properties() {
        let mut changes = EntityChanges::new(EntityId::new("b"), "b", 2.0);
        changes.set_parent(Some(EntityId::new("a")));
        changes.change_property("foo", json!("bar"), None);
        changes.change_property("plah", json!(42), None);
        changes.remove_property("plah");

        assert_eq!(
            build(&mut changes),
            vec![ChangeTrailEntry::CreateEntity {
                id: EntityId::new("b"),
                token: "b".to_string(),
                parent_id: Some(EntityId::new("a")),
                order: Some(2.0),
                properties: Some(vec![("foo".to_string(), json!("bar"))]),
            }]
        );
        assert!(!changes.has_changes());
    }

    #[test]
    fn test_unchanged_values_are_suppressed() {
        let mut changes = EntityChanges::new(EntityId::new("a"), "a", 0.0);
        changes.change_property("foo", json!("bar"), None);
        build(&mut changes);

        changes.change_property("foo", json!("bar"), None);
        assert!(!changes.has_changes());

        // a detour that ends at the known value is no change either
        changes.change_property("foo", json!("baz"), None);
        changes.change_property("foo", json!("bar"), None);
        assert!(!changes.has_changes());
    }

    #[test]
    fn test_custom_equality() {
        let mut changes = EntityChanges::new(EntityId::new("a"), "a", 0.0);
        changes.change_property("pos", json!(1.0), None);
        build(&mut changes);

        let close = |a: &Value, b: &Value| match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < 0.01,
            _ => a == b,
        };
        let eq: PropertyEq = &close;
        changes.change_property("pos", json!(1.001), Some(eq));
        assert!(!changes.has_changes());

        changes.change_property("pos", json!(2.0), Some(eq));
        assert!(changes.has_property_changes());
    }

    #[test]
    fn test_set_and_remove_cancel_each_other() {
        let mut changes = EntityChanges::new(EntityId::new("a"), "a", 0.0);
        changes.change_property("foo", json!(1), None);
        build(&mut changes);

        changes.change_property("foo", json!(2), None);
        changes.remove_property("foo");
        assert_eq!(
            build(&mut changes),
            vec![ChangeTrailEntry::ChangeProperties {
                id: EntityId::new("a"),
                properties: vec![PropertyChange::Remove { name: "foo".to_string() }],
            }]
        );

        // never known to the consumer: nothing to remove
        changes.remove_property("foo");
        assert!(!changes.has_changes());

        changes.change_property("foo", json!(3), None);
        changes.remove_property("foo");
        changes.change_property("foo", json!(4), None);
        assert_eq!(changes.current_property("foo"), Some(&json!(4)));
        assert_eq!(
            build(&mut changes),
            vec![ChangeTrailEntry::ChangeProperties {
                id: EntityId::new("a"),
                properties: vec![PropertyChange::Set { name: "foo".to_string(), value: json!(4) }],
            }]
        );
    }

    #[test]
    fn test_parent_change_subsumes_order_change() {
        let mut changes = EntityChanges::new(EntityId::new("c"), "c", 3.0);
        changes.set_parent(Some(EntityId::new("a")));
        build(&mut changes);

        changes.set_parent(None);
        changes.change_order(15.0);

        assert_eq!(
            build(&mut changes),
            vec![ChangeTrailEntry::SetParent {
                id: EntityId::new("c"),
                parent_id: None,
                order: Some(15.0),
            }]
        );

        changes.change_order(1.0);
        assert_eq!(
            build(&mut changes),
            vec![ChangeTrailEntry::UpdateOrder { id: EntityId::new("c"), order: 1.0 }]
        );
    }

    #[test]
    fn test_destroyed_accepts_no_mutations() {
        let mut changes = EntityChanges::new(EntityId::new("a"), "a", 0.0);
        build(&mut changes);
        changes.destroy_entity();

        changes.change_property("foo", json!(1), None);
        changes.change_order(4.0);
        changes.set_parent(Some(EntityId::new("x")));
        assert!(!changes.has_changes());

        let mut trail = Vec::new();
        changes.build_change_trail(&mut trail, ChangeTrailPhase::Removal);
        assert_eq!(trail, vec![ChangeTrailEntry::DestroyEntity { id: EntityId::new("a") }]);
    }
}

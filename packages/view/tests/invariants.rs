//! Property-based tests for topology and trail invariants.
//!
//! Random mutation sequences are applied to a view space. After every
//! mutation the sibling lists must be sorted and partition the live ids.
//! Every built trail is replayed into a small replica, which must end up
//! with exactly the same tree and properties as the authoring side.

use entityverse_common::insert_ordered;
use entityverse_view::{
    ChangeTrail, ChangeTrailEntry, EntityId, EntityView, EntityViewSpace, PropertyChange,
    ViewSpace, ViewSpaceRegistry,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

const PROPERTY_NAMES: [&str; 3] = ["a", "b", "c"];

#[derive(Debug, Clone)]
enum Op {
    Create { parent: Option<usize>, order: i8 },
    SetParent { node: usize, parent: Option<usize> },
    SetOrder { node: usize, order: i8 },
    SetProperty { node: usize, name: usize, value: i8 },
    RemoveProperty { node: usize, name: usize },
    Destroy { node: usize },
    DestroySubtree { node: usize },
    Build,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let index = 0usize..64;
    let order = -1i8..3;
    prop_oneof![
        3 => (proptest::option::of(index.clone()), order.clone())
            .prop_map(|(parent, order)| Op::Create { parent, order }),
        2 => (index.clone(), proptest::option::of(index.clone()))
            .prop_map(|(node, parent)| Op::SetParent { node, parent }),
        2 => (index.clone(), order).prop_map(|(node, order)| Op::SetOrder { node, order }),
        2 => (index.clone(), 0usize..3, 0i8..3)
            .prop_map(|(node, name, value)| Op::SetProperty { node, name, value }),
        1 => (index.clone(), 0usize..3).prop_map(|(node, name)| Op::RemoveProperty { node, name }),
        1 => index.clone().prop_map(|node| Op::Destroy { node }),
        1 => index.prop_map(|node| Op::DestroySubtree { node }),
        1 => Just(Op::Build),
    ]
}

#[derive(Debug, Default)]
struct ReplicaNode {
    parent: Option<EntityId>,
    order: f64,
    children: Vec<EntityId>,
    properties: HashMap<String, Value>,
}

/// Minimal consumer: applies trail entries strictly in order
#[derive(Debug, Default)]
struct Replica {
    nodes: HashMap<EntityId, ReplicaNode>,
    roots: Vec<EntityId>,
}

impl Replica {
    fn order_of(&self, id: &EntityId) -> f64 {
        self.nodes.get(id).map(|node| node.order).unwrap_or(0.0)
    }

    fn attach(&mut self, id: &EntityId, parent: Option<EntityId>) {
        let order = self.order_of(id);
        let mut list = match &parent {
            Some(parent) => std::mem::take(&mut self.nodes.get_mut(parent).expect("parent replicated").children),
            None => std::mem::take(&mut self.roots),
        };
        insert_ordered(&mut list, id.clone(), order, |id| self.order_of(id));
        match &parent {
            Some(parent) => self.nodes.get_mut(parent).unwrap().children = list,
            None => self.roots = list,
        }
        self.nodes.get_mut(id).unwrap().parent = parent;
    }

    fn detach(&mut self, id: &EntityId) {
        let parent = self.nodes[id].parent.clone();
        let list = match parent {
            Some(parent) => &mut self.nodes.get_mut(&parent).unwrap().children,
            None => &mut self.roots,
        };
        list.retain(|x| x != id);
    }

    fn apply(&mut self, trail: &ChangeTrail) {
        for entry in trail {
            match entry {
                ChangeTrailEntry::CreateEntity { id, parent_id, order, properties, .. } => {
                    assert!(!self.nodes.contains_key(id), "created twice");
                    self.nodes.insert(
                        id.clone(),
                        ReplicaNode {
                            order: order.unwrap_or(0.0),
                            properties: properties.clone().unwrap_or_default().into_iter().collect(),
                            ..Default::default()
                        },
                    );
                    self.attach(id, parent_id.clone());
                }
                ChangeTrailEntry::SetParent { id, parent_id, order } => {
                    assert!(self.nodes.contains_key(id), "reparenting unknown entity");
                    self.detach(id);
                    if let Some(order) = order {
                        self.nodes.get_mut(id).unwrap().order = *order;
                    }
                    self.attach(id, parent_id.clone());
                }
                ChangeTrailEntry::UpdateOrder { id, order } => {
                    assert!(self.nodes.contains_key(id), "ordering unknown entity");
                    self.detach(id);
                    let parent = self.nodes[id].parent.clone();
                    self.nodes.get_mut(id).unwrap().order = *order;
                    self.attach(id, parent);
                }
                ChangeTrailEntry::ChangeProperties { id, properties } => {
                    let node = self.nodes.get_mut(id).expect("changing unknown entity");
                    for change in properties {
                        match change {
                            PropertyChange::Set { name, value } => {
                                node.properties.insert(name.clone(), value.clone());
                            }
                            PropertyChange::Remove { name } => {
                                node.properties.remove(name);
                            }
                        }
                    }
                }
                ChangeTrailEntry::DestroyEntity { id } => {
                    // created and destroyed within one interval: never seen
                    if !self.nodes.contains_key(id) {
                        continue;
                    }
                    for child in self.nodes[id].children.clone() {
                        self.detach(&child);
                        self.attach(&child, None);
                    }
                    self.detach(id);
                    self.nodes.remove(id);
                }
            }
        }
    }

    fn assert_mirrors(&self, space: &EntityViewSpace) {
        assert_eq!(self.roots.as_slice(), space.root_entities());
        assert_eq!(self.nodes.len(), space.len());
        for (id, node) in &self.nodes {
            assert_eq!(node.children.as_slice(), space.children_of(id));
            assert_eq!(node.parent.as_ref(), space.parent_of(id));
            for name in PROPERTY_NAMES {
                assert_eq!(node.properties.get(name), space.property_of(id, name));
            }
        }
    }
}

fn assert_topology(space: &EntityViewSpace) {
    let mut seen = HashSet::new();
    let lists = std::iter::once(space.root_entities())
        .chain(space.entity_ids().map(|id| space.children_of(id)));

    for list in lists {
        let orders: Vec<f64> = list.iter().map(|id| space.order_of(id).unwrap()).collect();
        assert!(orders.windows(2).all(|w| w[0] <= w[1]), "unsorted siblings: {:?}", orders);
        for id in list {
            assert!(seen.insert(id.clone()), "{} listed twice", id);
        }
    }

    let live: HashSet<EntityId> = space.entity_ids().cloned().collect();
    assert_eq!(seen, live);

    for id in space.root_entities() {
        assert!(space.parent_of(id).is_none());
    }
    for id in space.entity_ids() {
        for child in space.children_of(id) {
            assert_eq!(space.parent_of(child), Some(id));
        }
    }
}

fn assert_phases(trail: &ChangeTrail) {
    let phases: Vec<_> = trail.iter().map(|entry| entry.phase()).collect();
    assert!(phases.windows(2).all(|w| w[0] <= w[1]), "phases out of order");

    let mut destroyed = HashSet::new();
    for entry in trail {
        match entry {
            ChangeTrailEntry::DestroyEntity { id } => {
                destroyed.insert(id.clone());
            }
            other => assert!(!destroyed.contains(other.id()), "mutation after destroy"),
        }
    }
}

fn pick<'a>(views: &'a [EntityView], index: usize) -> Option<&'a EntityView> {
    if views.is_empty() {
        None
    } else {
        Some(&views[index % views.len()])
    }
}

fn run(space: &ViewSpace, ops: &[Op]) {
    let mut views: Vec<EntityView> = Vec::new();
    let mut replica = Replica::default();

    let build = |replica: &mut Replica| {
        let trail = space.build_change_trails();
        assert_phases(&trail);
        replica.apply(&trail);
        let locked = space.lock();
        replica.assert_mirrors(&locked);
        assert!(!locked.has_pending_changes());
    };

    for op in ops {
        match op {
            Op::Create { parent, order } => {
                let parent = parent.and_then(|index| pick(&views, index)).filter(|view| view.exists());
                let mut builder = EntityView::builder("node").order(f64::from(*order));
                if let Some(parent) = parent {
                    builder = builder.parent(parent);
                }
                let view = builder.build(space).unwrap();
                views.push(view);
            }
            Op::SetParent { node, parent } => {
                if let Some(view) = pick(&views, *node) {
                    let parent = parent.and_then(|index| pick(&views, index)).filter(|view| view.exists());
                    // cycles are rejected and leave the tree untouched
                    let _ = view.set_parent(parent);
                }
            }
            Op::SetOrder { node, order } => {
                if let Some(view) = pick(&views, *node) {
                    view.set_order(f64::from(*order));
                }
            }
            Op::SetProperty { node, name, value } => {
                if let Some(view) = pick(&views, *node) {
                    view.set_property(PROPERTY_NAMES[*name], json!(value));
                }
            }
            Op::RemoveProperty { node, name } => {
                if let Some(view) = pick(&views, *node) {
                    view.remove_property(PROPERTY_NAMES[*name]);
                }
            }
            Op::Destroy { node } => {
                if let Some(view) = pick(&views, *node) {
                    view.destroy();
                }
            }
            Op::DestroySubtree { node } => {
                if let Some(view) = pick(&views, *node) {
                    view.destroy_subtree();
                }
            }
            Op::Build => build(&mut replica),
        }
        assert_topology(&space.lock());
    }

    build(&mut replica);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn trails_replay_into_identical_tree(ops in proptest::collection::vec(op_strategy(), 1..80)) {
        let registry = ViewSpaceRegistry::new();
        run(&registry.global(), &ops);
    }
}

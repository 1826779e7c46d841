//! Consumer that mirrors the authoring tree from the trails it receives

use entityverse_common::insert_ordered;
use entityverse_env::{ChangeTrailConsumer, SyncEvent};
use entityverse_view::{ChangeTrailEntry, EntityId, PropertyChange};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ReplicaEntity {
    pub token: String,
    pub parent: Option<EntityId>,
    pub order: f64,
    pub children: Vec<EntityId>,
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct Replica {
    pub entities: HashMap<EntityId, ReplicaEntity>,
    pub roots: Vec<EntityId>,
    pub events: usize,
}

impl Replica {
    pub fn get(&self, id: &EntityId) -> Option<&ReplicaEntity> {
        self.entities.get(id)
    }

    pub fn children_of(&self, id: &EntityId) -> Vec<EntityId> {
        self.entities
            .get(id)
            .map(|entity| entity.children.clone())
            .unwrap_or_default()
    }

    fn order_of(&self, id: &EntityId) -> f64 {
        self.entities.get(id).map(|entity| entity.order).unwrap_or(0.0)
    }

    fn attach(&mut self, id: &EntityId, parent: Option<EntityId>) {
        let order = self.order_of(id);
        let mut list = match &parent {
            Some(parent) => std::mem::take(&mut self.entities.get_mut(parent).unwrap().children),
            None => std::mem::take(&mut self.roots),
        };
        insert_ordered(&mut list, id.clone(), order, |id| self.order_of(id));
        match &parent {
            Some(parent) => self.entities.get_mut(parent).unwrap().children = list,
            None => self.roots = list,
        }
        self.entities.get_mut(id).unwrap().parent = parent;
    }

    fn detach(&mut self, id: &EntityId) {
        let parent = self.entities[id].parent.clone();
        let list = match parent {
            Some(parent) => &mut self.entities.get_mut(&parent).unwrap().children,
            None => &mut self.roots,
        };
        list.retain(|x| x != id);
    }
}

impl ChangeTrailConsumer for Replica {
    fn apply(&mut self, event: &SyncEvent) {
        self.events += 1;

        for entry in &event.change_trail {
            match entry {
                ChangeTrailEntry::CreateEntity {
                    id,
                    token,
                    parent_id,
                    order,
                    properties,
                } => {
                    self.entities.insert(
                        id.clone(),
                        ReplicaEntity {
                            token: token.clone(),
                            order: order.unwrap_or(0.0),
                            properties: properties
                                .clone()
                                .unwrap_or_default()
                                .into_iter()
                                .collect(),
                            ..Default::default()
                        },
                    );
                    self.attach(id, parent_id.clone());
                }
                ChangeTrailEntry::SetParent { id, parent_id, order } => {
                    self.detach(id);
                    if let Some(order) = order {
                        self.entities.get_mut(id).unwrap().order = *order;
                    }
                    self.attach(id, parent_id.clone());
                }
                ChangeTrailEntry::UpdateOrder { id, order } => {
                    self.detach(id);
                    let parent = self.entities[id].parent.clone();
                    self.entities.get_mut(id).unwrap().order = *order;
                    self.attach(id, parent);
                }
                ChangeTrailEntry::ChangeProperties { id, properties } => {
                    let entity = self.entities.get_mut(id).unwrap();
                    for change in properties {
                        match change {
                            PropertyChange::Set { name, value } => {
                                entity.properties.insert(name.clone(), value.clone());
                            }
                            PropertyChange::Remove { name } => {
                                entity.properties.remove(name);
                            }
                        }
                    }
                }
                ChangeTrailEntry::DestroyEntity { id } => {
                    if !self.entities.contains_key(id) {
                        continue;
                    }
                    for child in self.entities[id].children.clone() {
                        self.detach(&child);
                        self.attach(&child, None);
                    }
                    self.detach(id);
                    self.entities.remove(id);
                }
            }
        }
    }
}

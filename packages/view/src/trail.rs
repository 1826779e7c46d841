//! # Change Trail
//!
//! The ordered, replayable log produced by a trail build. Entries only carry
//! owned data (ids, tokens, JSON values), so a trail can be copied across any
//! execution boundary as-is.

use entityverse_common::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered list of change entries produced by one build
pub type ChangeTrail = Vec<ChangeTrailEntry>;

/// One step a consumer has to apply, strictly in trail order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeTrailEntry {
    #[serde(rename_all = "camelCase")]
    CreateEntity {
        id: EntityId,
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<EntityId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<Vec<(String, Value)>>,
    },

    /// Reparenting; `parent_id: None` makes the entity a root
    #[serde(rename_all = "camelCase")]
    SetParent {
        id: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<EntityId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<f64>,
    },

    UpdateOrder { id: EntityId, order: f64 },

    ChangeProperties {
        id: EntityId,
        properties: Vec<PropertyChange>,
    },

    DestroyEntity { id: EntityId },
}

impl ChangeTrailEntry {
    pub fn id(&self) -> &EntityId {
        match self {
            ChangeTrailEntry::CreateEntity { id, .. }
            | ChangeTrailEntry::SetParent { id, .. }
            | ChangeTrailEntry::UpdateOrder { id, .. }
            | ChangeTrailEntry::ChangeProperties { id, .. }
            | ChangeTrailEntry::DestroyEntity { id } => id,
        }
    }

    pub fn phase(&self) -> ChangeTrailPhase {
        match self {
            ChangeTrailEntry::CreateEntity { .. }
            | ChangeTrailEntry::SetParent { .. }
            | ChangeTrailEntry::UpdateOrder { .. } => ChangeTrailPhase::StructuralChanges,
            ChangeTrailEntry::ChangeProperties { .. } => ChangeTrailPhase::ContentUpdates,
            ChangeTrailEntry::DestroyEntity { .. } => ChangeTrailPhase::Removal,
        }
    }
}

/// A single property upsert or removal inside a `ChangeProperties` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PropertyChange {
    Set { name: String, value: Value },
    Remove { name: String },
}

impl PropertyChange {
    pub fn name(&self) -> &str {
        match self {
            PropertyChange::Set { name, .. } | PropertyChange::Remove { name } => name,
        }
    }
}

/// Build phases, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeTrailPhase {
    StructuralChanges,
    ContentUpdates,
    Removal,
}

use entityverse_view::{ChangeTrail, Namespace};
use serde::{Deserialize, Serialize};

/// One completed sync cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub namespace: Namespace,
    /// 1-based, increases by one per emitted event
    pub sequence: u64,
    pub change_trail: ChangeTrail,
}

impl SyncEvent {
    pub fn is_empty(&self) -> bool {
        self.change_trail.is_empty()
    }
}

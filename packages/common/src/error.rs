use crate::{EntityId, Namespace};
use thiserror::Error;

/// Errors raised synchronously by view space operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityError {
    #[error("Entity with id {0} already exists")]
    DuplicateIdentity(EntityId),

    #[error("Could not add child entity to parent! Parent entity with id {0} does not exist")]
    UnknownParent(EntityId),

    #[error("Entity belongs to namespace {found}, expected {expected}")]
    NamespaceMismatch { expected: Namespace, found: Namespace },

    #[error("Entity {0} belongs to another view space")]
    ForeignSpace(EntityId),

    #[error("Adding {child} below {parent} would create a cycle")]
    CycleDetected { parent: EntityId, child: EntityId },
}

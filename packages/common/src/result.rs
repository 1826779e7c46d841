use crate::error::EntityError;

/// Common Result type alias
pub type EntityResult<T> = Result<T, EntityError>;

use thiserror::Error;
use uuid::Uuid;

use crate::model::ModelError;

/// Errors that can occur during scope graph operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// The addressed object is not in this scope's uuid index
    #[error("Object {uuid} is not present in this scope")]
    UnknownObject { uuid: Uuid },

    /// Attempted to insert an object whose uuid is already indexed
    #[error("Object {uuid} is already present in this scope")]
    DuplicateObject { uuid: Uuid },

    /// A local edit referenced an object that was never inserted
    #[error("Reference target {uuid} is not present in this scope")]
    UnknownReference { uuid: Uuid },

    /// Schema-level failure (unknown property, type mismatch, ...)
    #[error(transparent)]
    Model(#[from] ModelError),
}

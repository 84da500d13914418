use uuid::Uuid;

use crate::value::PropertyValue;

/// Observation payload for a single property change on one object.
///
/// For composite properties `old` and `new` are `None`; the derived value is
/// recomputed lazily on the next read.
#[derive(Debug, Clone)]
pub struct PropertyChange {
    pub object: Uuid,
    pub property: String,
    pub old: Option<PropertyValue>,
    pub new: Option<PropertyValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionChangeKind {
    Added,
    Removed,
}

/// Observation payload for membership changes on a collection-of-references
/// property.
#[derive(Debug, Clone)]
pub struct CollectionChange {
    pub object: Uuid,
    pub property: String,
    pub kind: CollectionChangeKind,
    pub member: Uuid,
}

/// Fired when an object becomes unreachable and leaves its scope.
#[derive(Debug, Clone)]
pub struct DetachEvent {
    pub object: Uuid,
    pub class_name: String,
}

/// Scope-level observations fired at batch boundaries.
#[derive(Debug, Clone)]
pub enum ScopeEvent {
    /// An inbound batch finished applying.
    RemoteBatchApplied { fragment_count: usize },
    /// Local changes were coalesced into an outbound fragment batch.
    ChangesFlushed { fragment_count: usize },
}

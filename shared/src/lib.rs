//! # Jetstream Shared
//! Model object layer, sync fragments & protocol messages shared between
//! the jetstream-client crate and test tooling.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod fragment;
mod model;
mod scope;
mod signal;
mod value;

pub mod messages;

pub use fragment::{FragmentKind, SyncFragment};
pub use messages::{
    decode_payload, encode_message, ErrorBody, Message, MessageError, PROTOCOL_VERSION,
};
pub use model::{
    CompositeDef, ModelError, ModelObject, ModelSchema, ParentLink, PropertyDef, PropertyReader,
    SchemaBuilder, SchemaRegistry,
};
pub use scope::{
    CollectionChange, CollectionChangeKind, DetachEvent, ObjectMut, PropertyChange, Scope,
    ScopeError, ScopeEvent,
};
pub use signal::{ListenerKey, Signal};
pub use value::{decode_value, encode_value, PropertyValue, ValueError, ValueType};

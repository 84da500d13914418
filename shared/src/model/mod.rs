mod error;
mod object;
mod schema;

pub use error::ModelError;
pub use object::{ModelObject, ParentLink};
pub use schema::{
    CompositeDef, ModelSchema, PropertyDef, PropertyReader, SchemaBuilder, SchemaRegistry,
};

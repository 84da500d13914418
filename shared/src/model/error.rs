use thiserror::Error;

/// Errors that can occur during model schema and object operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Attempted to register a class name twice
    #[error("Model class {class} is already registered")]
    DuplicateClass { class: String },

    /// An inbound fragment or caller referenced a class name with no schema
    #[error("Unknown model class: {class}")]
    UnknownClass { class: String },

    /// A property name is not part of the class schema
    #[error("Unknown property {property} on class {class}")]
    UnknownProperty { class: String, property: String },

    /// A value does not match the property's declared type tag
    #[error("Property {property} on class {class} expects {expected}, got {found}")]
    TypeMismatch {
        class: String,
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Composite properties derive their value and cannot be assigned
    #[error("Property {property} on class {class} is a composite and cannot be set")]
    CompositeNotWritable { class: String, property: String },
}

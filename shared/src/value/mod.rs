mod codec;
mod error;

pub use codec::{decode_value, encode_value};
pub use error::ValueError;

use uuid::Uuid;

/// Wire-level type tag for a model property. The set is closed; unknown tags
/// on inbound fragments are skipped with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    UInt,
    Float,
    Bool,
    String,
    /// Seconds since the Unix epoch, as a JSON number.
    Date,
    /// RGBA packed 0xRRGGBBAA, as a JSON number.
    Color,
    /// UUID string referencing another model object in the same scope.
    Ref,
    /// Ordered list of UUID strings.
    RefList,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::UInt => "uint",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Color => "color",
            ValueType::Ref => "modelObjectRef",
            ValueType::RefList => "arrayOfRefs",
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, ValueType::Ref | ValueType::RefList)
    }

    /// Value a freshly constructed object carries for a property of this
    /// type. Collections of references are empty lists, never null.
    pub fn default_value(&self) -> PropertyValue {
        match self {
            ValueType::Int => PropertyValue::Int(0),
            ValueType::UInt => PropertyValue::UInt(0),
            ValueType::Float => PropertyValue::Float(0.0),
            ValueType::Bool => PropertyValue::Bool(false),
            ValueType::String => PropertyValue::String(String::new()),
            ValueType::Date => PropertyValue::Null,
            ValueType::Color => PropertyValue::Color(0),
            ValueType::Ref => PropertyValue::Null,
            ValueType::RefList => PropertyValue::RefList(Vec::new()),
        }
    }
}

/// Runtime shape of a model property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Cleared / absent. Any property may be null on the wire.
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    /// Seconds since the Unix epoch.
    Date(f64),
    /// RGBA packed 0xRRGGBBAA.
    Color(u32),
    Ref(Uuid),
    RefList(Vec<Uuid>),
}

impl PropertyValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Int(_) => "int",
            PropertyValue::UInt(_) => "uint",
            PropertyValue::Float(_) => "float",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::String(_) => "string",
            PropertyValue::Date(_) => "date",
            PropertyValue::Color(_) => "color",
            PropertyValue::Ref(_) => "modelObjectRef",
            PropertyValue::RefList(_) => "arrayOfRefs",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Whether this runtime value is admissible for the given type tag.
    /// Null is admissible everywhere.
    pub fn matches(&self, value_type: ValueType) -> bool {
        match (self, value_type) {
            (PropertyValue::Null, _) => true,
            (PropertyValue::Int(_), ValueType::Int) => true,
            (PropertyValue::UInt(_), ValueType::UInt) => true,
            (PropertyValue::Float(_), ValueType::Float) => true,
            (PropertyValue::Bool(_), ValueType::Bool) => true,
            (PropertyValue::String(_), ValueType::String) => true,
            (PropertyValue::Date(_), ValueType::Date) => true,
            (PropertyValue::Color(_), ValueType::Color) => true,
            (PropertyValue::Ref(_), ValueType::Ref) => true,
            (PropertyValue::RefList(_), ValueType::RefList) => true,
            _ => false,
        }
    }

    /// UUIDs this value points at. Used for reachability walks and parent
    /// back-pointer maintenance.
    pub fn referenced_uuids(&self) -> Vec<Uuid> {
        match self {
            PropertyValue::Ref(uuid) => vec![*uuid],
            PropertyValue::RefList(uuids) => uuids.clone(),
            _ => Vec::new(),
        }
    }

    // Typed accessors

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            PropertyValue::UInt(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<f64> {
        match self {
            PropertyValue::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<u32> {
        match self {
            PropertyValue::Color(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_ref_uuid(&self) -> Option<Uuid> {
        match self {
            PropertyValue::Ref(uuid) => Some(*uuid),
            _ => None,
        }
    }

    pub fn as_ref_list(&self) -> Option<&[Uuid]> {
        match self {
            PropertyValue::RefList(uuids) => Some(uuids),
            _ => None,
        }
    }
}

use serde_json::{Number, Value};
use uuid::Uuid;

use super::{PropertyValue, ValueError, ValueType};

/// Encodes a runtime value into its wire representation. Loss-free for the
/// closed tag set; collections of references serialize as arrays of UUID
/// strings even when empty.
pub fn encode_value(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Int(int) => Value::Number(Number::from(*int)),
        PropertyValue::UInt(uint) => Value::Number(Number::from(*uint)),
        PropertyValue::Float(float) => Number::from_f64(*float)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PropertyValue::Bool(boolean) => Value::Bool(*boolean),
        PropertyValue::String(string) => Value::String(string.clone()),
        PropertyValue::Date(seconds) => Number::from_f64(*seconds)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PropertyValue::Color(rgba) => Value::Number(Number::from(*rgba)),
        PropertyValue::Ref(uuid) => Value::String(uuid.to_string()),
        PropertyValue::RefList(uuids) => Value::Array(
            uuids
                .iter()
                .map(|uuid| Value::String(uuid.to_string()))
                .collect(),
        ),
    }
}

/// Decodes a wire value under the given type tag. JSON null decodes to
/// [`PropertyValue::Null`] for every tag ("absent or null means clear").
pub fn decode_value(value_type: ValueType, raw: &Value) -> Result<PropertyValue, ValueError> {
    if raw.is_null() {
        return Ok(PropertyValue::Null);
    }
    match value_type {
        ValueType::Int => raw
            .as_i64()
            .map(PropertyValue::Int)
            .ok_or_else(|| mismatch(value_type, "integer", raw)),
        ValueType::UInt => raw
            .as_u64()
            .map(PropertyValue::UInt)
            .ok_or_else(|| mismatch(value_type, "unsigned integer", raw)),
        ValueType::Float => raw
            .as_f64()
            .map(PropertyValue::Float)
            .ok_or_else(|| mismatch(value_type, "number", raw)),
        ValueType::Bool => raw
            .as_bool()
            .map(PropertyValue::Bool)
            .ok_or_else(|| mismatch(value_type, "boolean", raw)),
        ValueType::String => raw
            .as_str()
            .map(|string| PropertyValue::String(string.to_string()))
            .ok_or_else(|| mismatch(value_type, "string", raw)),
        ValueType::Date => raw
            .as_f64()
            .map(PropertyValue::Date)
            .ok_or_else(|| mismatch(value_type, "number", raw)),
        ValueType::Color => {
            let packed = raw
                .as_u64()
                .ok_or_else(|| mismatch(value_type, "unsigned integer", raw))?;
            u32::try_from(packed)
                .map(PropertyValue::Color)
                .map_err(|_| ValueError::ColorOutOfRange { value: packed })
        }
        ValueType::Ref => {
            let string = raw
                .as_str()
                .ok_or_else(|| mismatch(value_type, "UUID string", raw))?;
            parse_uuid(string).map(PropertyValue::Ref)
        }
        ValueType::RefList => {
            let array = raw
                .as_array()
                .ok_or_else(|| mismatch(value_type, "array of UUID strings", raw))?;
            let mut uuids = Vec::with_capacity(array.len());
            for element in array {
                let string = element
                    .as_str()
                    .ok_or_else(|| mismatch(value_type, "UUID string", element))?;
                uuids.push(parse_uuid(string)?);
            }
            Ok(PropertyValue::RefList(uuids))
        }
    }
}

fn parse_uuid(string: &str) -> Result<Uuid, ValueError> {
    Uuid::parse_str(string).map_err(|_| ValueError::InvalidUuid {
        value: string.to_string(),
    })
}

fn mismatch(value_type: ValueType, expected: &'static str, raw: &Value) -> ValueError {
    ValueError::ShapeMismatch {
        tag: value_type.name(),
        expected,
        found: json_kind(raw),
    }
}

fn json_kind(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use uuid::Uuid;

use crate::value::{encode_value, PropertyValue};

use super::error::ModelError;
use super::schema::{ModelSchema, PropertyReader};

/// Back-reference from a child object to one live `(parent, property)` link.
/// Stored as weak handles (UUID + name), never as pointers, so cyclic graphs
/// are inert data; reachability from the scope root governs lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub parent: Uuid,
    pub property: String,
}

/// A node in a synchronized object graph: stable 128-bit identity, a shared
/// class schema, and the current concrete property values.
///
/// Objects are owned by their scope's `uuid -> object` index. A detached
/// object can be seeded with [`ModelObject::set_initial`] before insertion;
/// once inside a scope, all mutation goes through the scope so changes are
/// captured.
pub struct ModelObject {
    uuid: Uuid,
    schema: Arc<ModelSchema>,
    values: HashMap<String, PropertyValue>,
    parents: Vec<ParentLink>,
}

impl ModelObject {
    pub fn new(schema: &Arc<ModelSchema>) -> Self {
        Self::with_uuid(schema, Uuid::new_v4())
    }

    /// Constructs an object under a caller-supplied identity. Used when
    /// instantiating from an inbound fragment that names the UUID.
    pub fn with_uuid(schema: &Arc<ModelSchema>, uuid: Uuid) -> Self {
        let values = schema
            .properties()
            .iter()
            .map(|def| (def.name.clone(), def.default.clone()))
            .collect();
        Self {
            uuid,
            schema: Arc::clone(schema),
            values,
            parents: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn class_name(&self) -> &str {
        self.schema.class_name()
    }

    /// Current value of a concrete property.
    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Reads a property by name: concrete values directly, composites
    /// re-evaluated lazily.
    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        self.schema
            .composite(name)
            .map(|composite| composite.evaluate(self))
    }

    /// Seeds a property on a detached object: type-checked, but no change
    /// capture and no observations. Scope-owned objects are mutated through
    /// the scope instead.
    pub fn set_initial(&mut self, name: &str, value: PropertyValue) -> Result<(), ModelError> {
        self.check_writable(name, &value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Validates that `name` is a writable concrete property and `value`
    /// matches its declared tag.
    pub(crate) fn check_writable(
        &self,
        name: &str,
        value: &PropertyValue,
    ) -> Result<(), ModelError> {
        if self.schema.composite(name).is_some() {
            return Err(ModelError::CompositeNotWritable {
                class: self.class_name().to_string(),
                property: name.to_string(),
            });
        }
        let def = self
            .schema
            .property(name)
            .ok_or_else(|| ModelError::UnknownProperty {
                class: self.class_name().to_string(),
                property: name.to_string(),
            })?;
        if !value.matches(def.value_type) {
            return Err(ModelError::TypeMismatch {
                class: self.class_name().to_string(),
                property: name.to_string(),
                expected: def.value_type.name(),
                found: value.kind_name(),
            });
        }
        Ok(())
    }

    /// Stores a validated value, returning the previous one.
    pub(crate) fn set_value(&mut self, name: &str, value: PropertyValue) -> PropertyValue {
        self.values
            .insert(name.to_string(), value)
            .unwrap_or(PropertyValue::Null)
    }

    pub fn parents(&self) -> &[ParentLink] {
        &self.parents
    }

    pub(crate) fn add_parent(&mut self, parent: Uuid, property: &str) {
        self.parents.push(ParentLink {
            parent,
            property: property.to_string(),
        });
    }

    /// Removes exactly one matching back-reference entry; a second live link
    /// through the same property keeps its own entry.
    pub(crate) fn remove_parent(&mut self, parent: Uuid, property: &str) {
        if let Some(position) = self
            .parents
            .iter()
            .position(|link| link.parent == parent && link.property == property)
        {
            self.parents.swap_remove(position);
        }
    }

    /// UUIDs of every object this one references, in schema declaration
    /// order. Drives reachability walks.
    pub fn referenced_uuids(&self) -> Vec<Uuid> {
        let mut uuids = Vec::new();
        for def in self.schema.properties() {
            if let Some(value) = self.values.get(&def.name) {
                uuids.extend(value.referenced_uuids());
            }
        }
        uuids
    }

    /// Full encoded snapshot of every concrete property, in a deterministic
    /// order. Used for `add` fragments.
    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        self.schema
            .properties()
            .iter()
            .map(|def| {
                let value = self.values.get(&def.name).unwrap_or(&PropertyValue::Null);
                (def.name.clone(), encode_value(value))
            })
            .collect()
    }
}

impl PropertyReader for ModelObject {
    fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use crate::value::{PropertyValue, ValueType};

use super::error::ModelError;
use super::object::ModelObject;

/// Read-only view over an object's concrete property values, handed to
/// composite evaluation functions.
pub trait PropertyReader {
    fn value(&self, name: &str) -> Option<&PropertyValue>;
}

type CompositeEval = Arc<dyn Fn(&dyn PropertyReader) -> PropertyValue + Send + Sync>;

/// Declared concrete property: name, wire type tag, construction default.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub value_type: ValueType,
    pub default: PropertyValue,
}

/// Declared composite property: derived name, the concrete source names that
/// invalidate it, and the evaluation function run lazily on read.
#[derive(Clone)]
pub struct CompositeDef {
    pub name: String,
    pub sources: Vec<String>,
    eval: CompositeEval,
}

impl CompositeDef {
    pub fn evaluate(&self, reader: &dyn PropertyReader) -> PropertyValue {
        (self.eval)(reader)
    }

    pub fn depends_on(&self, source: &str) -> bool {
        self.sources.iter().any(|name| name == source)
    }
}

/// Per-class property schema, declared once at type definition and shared by
/// every instance of the class.
pub struct ModelSchema {
    class_name: String,
    properties: Vec<PropertyDef>,
    composites: Vec<CompositeDef>,
}

impl ModelSchema {
    /// Starts declaring a new class schema.
    pub fn build(class_name: &str) -> SchemaBuilder {
        SchemaBuilder {
            class_name: class_name.to_string(),
            properties: Vec::new(),
            composites: Vec::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Concrete properties in declaration order. Declaration order governs
    /// snapshot layout and reachability walks.
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|def| def.name == name)
    }

    pub fn composite(&self, name: &str) -> Option<&CompositeDef> {
        self.composites.iter().find(|def| def.name == name)
    }

    /// Composites invalidated by a change to the given concrete property.
    pub fn composites_for_source(&self, source: &str) -> Vec<&CompositeDef> {
        self.composites
            .iter()
            .filter(|def| def.depends_on(source))
            .collect()
    }
}

/// Builder for [`ModelSchema`].
///
/// # Panics
///
/// Declaring the same name twice is a programmer error and panics.
pub struct SchemaBuilder {
    class_name: String,
    properties: Vec<PropertyDef>,
    composites: Vec<CompositeDef>,
}

impl SchemaBuilder {
    pub fn property(self, name: &str, value_type: ValueType) -> Self {
        let default = value_type.default_value();
        self.property_with_default(name, value_type, default)
    }

    pub fn property_with_default(
        mut self,
        name: &str,
        value_type: ValueType,
        default: PropertyValue,
    ) -> Self {
        self.assert_fresh_name(name);
        self.properties.push(PropertyDef {
            name: name.to_string(),
            value_type,
            default,
        });
        self
    }

    /// Declares a reference to another model object.
    pub fn reference(self, name: &str) -> Self {
        self.property(name, ValueType::Ref)
    }

    /// Declares an ordered collection of references.
    pub fn reference_list(self, name: &str) -> Self {
        self.property(name, ValueType::RefList)
    }

    /// Declares a derived property recomputed lazily on read; changes to any
    /// source fire a change observation for the derived name.
    pub fn composite<F>(mut self, name: &str, sources: &[&str], eval: F) -> Self
    where
        F: Fn(&dyn PropertyReader) -> PropertyValue + Send + Sync + 'static,
    {
        self.assert_fresh_name(name);
        self.composites.push(CompositeDef {
            name: name.to_string(),
            sources: sources.iter().map(|source| source.to_string()).collect(),
            eval: Arc::new(eval),
        });
        self
    }

    pub fn finish(self) -> Arc<ModelSchema> {
        Arc::new(ModelSchema {
            class_name: self.class_name,
            properties: self.properties,
            composites: self.composites,
        })
    }

    fn assert_fresh_name(&self, name: &str) {
        let taken = self.properties.iter().any(|def| def.name == name)
            || self.composites.iter().any(|def| def.name == name);
        if taken {
            panic!(
                "property {} declared twice on class {}",
                name, self.class_name
            );
        }
    }
}

/// Class-name to schema table consulted when inbound fragments instantiate
/// objects by name.
pub struct SchemaRegistry {
    classes: HashMap<String, Arc<ModelSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    pub fn add(&mut self, schema: Arc<ModelSchema>) -> Result<(), ModelError> {
        let class = schema.class_name().to_string();
        if self.classes.contains_key(&class) {
            return Err(ModelError::DuplicateClass { class });
        }
        self.classes.insert(class, schema);
        Ok(())
    }

    pub fn get(&self, class_name: &str) -> Option<&Arc<ModelSchema>> {
        self.classes.get(class_name)
    }

    /// Instantiates a fresh object of the named class with default values.
    pub fn instantiate(&self, class_name: &str) -> Result<ModelObject, ModelError> {
        let schema = self.get(class_name).ok_or_else(|| ModelError::UnknownClass {
            class: class_name.to_string(),
        })?;
        Ok(ModelObject::new(schema))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

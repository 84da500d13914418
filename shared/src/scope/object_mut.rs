use uuid::Uuid;

use crate::value::PropertyValue;

use super::{Scope, ScopeError};

/// Mutable accessor for one scope-owned object. Every write goes through
/// the scope's capture rule; reads see composites re-evaluated lazily.
pub struct ObjectMut<'scope> {
    scope: &'scope mut Scope,
    uuid: Uuid,
}

impl<'scope> ObjectMut<'scope> {
    pub(super) fn new(scope: &'scope mut Scope, uuid: Uuid) -> Self {
        Self { scope, uuid }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn class_name(&self) -> &str {
        self.scope
            .objects
            .get(&self.uuid)
            .map(|object| object.class_name())
            .unwrap_or("")
    }

    pub fn get(&self, property: &str) -> Option<PropertyValue> {
        self.scope
            .objects
            .get(&self.uuid)
            .and_then(|object| object.get(property))
    }

    pub fn set(&mut self, property: &str, value: PropertyValue) -> Result<(), ScopeError> {
        self.scope.set_property(self.uuid, property, value)
    }

    /// Sets or clears a single-object reference.
    pub fn set_ref(&mut self, property: &str, target: Option<Uuid>) -> Result<(), ScopeError> {
        let value = target.map(PropertyValue::Ref).unwrap_or(PropertyValue::Null);
        self.set(property, value)
    }

    /// Appends one member to a collection of references.
    pub fn push_ref(&mut self, property: &str, target: Uuid) -> Result<(), ScopeError> {
        let mut members = self.current_members(property);
        members.push(target);
        self.set(property, PropertyValue::RefList(members))
    }

    /// Removes the first occurrence of one member from a collection of
    /// references.
    pub fn remove_ref(&mut self, property: &str, target: Uuid) -> Result<(), ScopeError> {
        let mut members = self.current_members(property);
        if let Some(position) = members.iter().position(|member| *member == target) {
            members.remove(position);
        }
        self.set(property, PropertyValue::RefList(members))
    }

    fn current_members(&self, property: &str) -> Vec<Uuid> {
        self.get(property)
            .and_then(|value| value.as_ref_list().map(<[Uuid]>::to_vec))
            .unwrap_or_default()
    }
}

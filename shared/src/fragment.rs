use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ModelObject;

/// Kind of delta a [`SyncFragment`] describes. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// A newly reachable object, carrying its full property snapshot.
    Add,
    /// A pre-existing object, carrying only the changed properties.
    Change,
    /// Root replacement, naming the new root's UUID and class.
    Root,
}

/// Wire record describing one object's delta within a sync batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncFragment {
    #[serde(rename = "type")]
    pub kind: FragmentKind,
    pub uuid: Uuid,
    /// Class name; required on `add` and `root`, optional on `change`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cls: Option<String>,
    /// Encoded property values; an absent or null entry clears the property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, serde_json::Value>>,
}

impl SyncFragment {
    /// Builds an `add` fragment with the object's full current snapshot.
    pub fn add(object: &ModelObject) -> Self {
        Self {
            kind: FragmentKind::Add,
            uuid: object.uuid(),
            cls: Some(object.class_name().to_string()),
            properties: Some(object.snapshot()),
        }
    }

    /// Builds a `change` fragment carrying only the given encoded values.
    pub fn change(uuid: Uuid, properties: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            kind: FragmentKind::Change,
            uuid,
            cls: None,
            properties: Some(properties),
        }
    }

    /// Builds a `root` fragment naming the new root.
    pub fn root(object: &ModelObject) -> Self {
        Self {
            kind: FragmentKind::Root,
            uuid: object.uuid(),
            cls: Some(object.class_name().to_string()),
            properties: None,
        }
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties
            .as_ref()
            .map(|properties| properties.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

/// Locally captured mutations accumulated between flushes: which objects
/// were touched (in first-touch order), which of their properties changed,
/// and whether the root was reassigned.
pub struct ChangeSet {
    touched: Vec<Uuid>,
    changed: HashMap<Uuid, BTreeSet<String>>,
    root_changed: bool,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self {
            touched: Vec::new(),
            changed: HashMap::new(),
            root_changed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty() && !self.root_changed
    }

    pub fn record(&mut self, object: Uuid, property: &str) {
        let properties = self.changed.entry(object).or_insert_with(|| {
            self.touched.push(object);
            BTreeSet::new()
        });
        properties.insert(property.to_string());
    }

    pub fn record_root_change(&mut self) {
        self.root_changed = true;
    }

    pub fn root_changed(&self) -> bool {
        self.root_changed
    }

    pub fn changed_properties(&self, object: &Uuid) -> Option<&BTreeSet<String>> {
        self.changed.get(object)
    }

    /// Drains the set, returning `(object, changed property names)` pairs in
    /// first-touch order plus the root-reassignment flag.
    pub fn take(&mut self) -> (Vec<(Uuid, BTreeSet<String>)>, bool) {
        let root_changed = self.root_changed;
        self.root_changed = false;
        let mut changed = std::mem::take(&mut self.changed);
        let drained = std::mem::take(&mut self.touched)
            .into_iter()
            .filter_map(|uuid| changed.remove(&uuid).map(|properties| (uuid, properties)))
            .collect();
        (drained, root_changed)
    }
}

impl Default for ChangeSet {
    fn default() -> Self {
        Self::new()
    }
}

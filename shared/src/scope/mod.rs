mod change_set;
mod error;
mod event;
mod object_mut;

pub use error::ScopeError;
pub use event::{
    CollectionChange, CollectionChangeKind, DetachEvent, PropertyChange, ScopeEvent,
};
pub use object_mut::ObjectMut;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::warn;
use uuid::Uuid;

use crate::fragment::{FragmentKind, SyncFragment};
use crate::model::{ModelObject, SchemaRegistry};
use crate::signal::{ListenerKey, Signal};
use crate::value::{decode_value, encode_value, PropertyValue};

use change_set::ChangeSet;
use event::CollectionChangeKind::{Added, Removed};

#[derive(Default)]
struct ObjectObservers {
    property: HashMap<String, Signal<PropertyChange>>,
    collection: HashMap<String, Signal<CollectionChange>>,
    detach: Signal<DetachEvent>,
}

enum QueuedObservation {
    Property(PropertyChange),
    Collection(CollectionChange),
    Detach(DetachEvent),
}

/// A named, remotely attachable container for a connected sub-graph of model
/// objects. The scope owns every object in its `uuid -> object` index,
/// captures local edits into pending changes, and applies inbound fragments
/// under the remote-apply guard so they are never re-captured.
pub struct Scope {
    name: String,
    registry: Arc<SchemaRegistry>,
    root: Option<Uuid>,
    objects: HashMap<Uuid, ModelObject>,
    /// Objects already announced to the server; membership decides whether a
    /// flush emits `add` or `change` for a reachable object.
    synced: HashSet<Uuid>,
    /// Reachable set as of the last flush. Only objects that lose previously
    /// established reachability are detached; an announced object the root
    /// never pointed at stays addressable.
    last_reachable: HashSet<Uuid>,
    pending: ChangeSet,
    remote_applying: u32,
    observers: HashMap<Uuid, ObjectObservers>,
    scope_observers: Signal<ScopeEvent>,
    /// Observations held back while a remote batch applies; fired when the
    /// outermost remote-apply interval ends.
    queued: Vec<QueuedObservation>,
}

impl Scope {
    pub fn new(name: impl Into<String>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
            root: None,
            objects: HashMap::new(),
            synced: HashSet::new(),
            last_reachable: HashSet::new(),
            pending: ChangeSet::new(),
            remote_applying: 0,
            observers: HashMap::new(),
            scope_observers: Signal::new(),
            queued: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<Uuid> {
        self.root
    }

    pub fn root_model(&self) -> Option<&ModelObject> {
        self.root.and_then(|uuid| self.objects.get(&uuid))
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.objects.contains_key(uuid)
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&ModelObject> {
        self.objects.get(uuid)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Mutable accessor for a scope-owned object; edits made through it are
    /// captured.
    pub fn object_mut(&mut self, uuid: Uuid) -> Option<ObjectMut<'_>> {
        if self.objects.contains_key(&uuid) {
            Some(ObjectMut::new(self, uuid))
        } else {
            None
        }
    }

    // Graph membership

    /// Adopts a detached object into the uuid index. The object stays
    /// unannounced until a flush finds it reachable from the root.
    pub fn insert(&mut self, object: ModelObject) -> Result<Uuid, ScopeError> {
        let uuid = object.uuid();
        if self.objects.contains_key(&uuid) {
            return Err(ScopeError::DuplicateObject { uuid });
        }

        // wire back-pointers for any references the seeded object already
        // carries toward objects that are present
        let mut links = Vec::new();
        for def in object.schema().properties() {
            if let Some(value) = object.value(&def.name) {
                for target in value.referenced_uuids() {
                    links.push((def.name.clone(), target));
                }
            }
        }
        self.objects.insert(uuid, object);
        for (property, target) in links {
            if let Some(child) = self.objects.get_mut(&target) {
                child.add_parent(uuid, &property);
            }
        }
        Ok(uuid)
    }

    /// Inserts `object` and makes it the scope root.
    pub fn attach_root(&mut self, object: ModelObject) -> Result<Uuid, ScopeError> {
        let uuid = self.insert(object)?;
        self.set_root(uuid)?;
        Ok(uuid)
    }

    /// Reassigns the root to an already-inserted object.
    pub fn set_root(&mut self, uuid: Uuid) -> Result<(), ScopeError> {
        if !self.objects.contains_key(&uuid) {
            return Err(ScopeError::UnknownObject { uuid });
        }
        if self.root == Some(uuid) {
            return Ok(());
        }
        self.root = Some(uuid);
        if self.remote_applying == 0 {
            self.pending.record_root_change();
        }
        Ok(())
    }

    /// Clears the root; the whole graph becomes unreachable and is evicted
    /// on the next flush.
    pub fn detach_root(&mut self) {
        if self.root.take().is_some() && self.remote_applying == 0 {
            self.pending.record_root_change();
        }
    }

    // Remote-apply guard

    /// Enters remote-apply mode: capture is disabled and observations are
    /// held back until the outermost interval ends.
    pub fn start_applying_remote(&mut self) {
        self.remote_applying += 1;
    }

    /// Exits remote-apply mode.
    ///
    /// # Panics
    ///
    /// Panics when unpaired; an unbalanced guard leaves the scope state
    /// inconsistent and is a programmer error.
    pub fn end_applying_remote(&mut self) {
        if self.remote_applying == 0 {
            panic!("end_applying_remote called without a matching start_applying_remote");
        }
        self.remote_applying -= 1;
        if self.remote_applying == 0 {
            let queued = std::mem::take(&mut self.queued);
            for observation in queued {
                self.dispatch(observation);
            }
        }
    }

    pub fn is_applying_remote(&self) -> bool {
        self.remote_applying > 0
    }

    // Observer registration

    pub fn observe_property<F>(&mut self, object: Uuid, property: &str, key: ListenerKey, listener: F)
    where
        F: FnMut(&PropertyChange) + 'static,
    {
        self.observers
            .entry(object)
            .or_default()
            .property
            .entry(property.to_string())
            .or_default()
            .listen(key, listener);
    }

    pub fn observe_collection<F>(
        &mut self,
        object: Uuid,
        property: &str,
        key: ListenerKey,
        listener: F,
    ) where
        F: FnMut(&CollectionChange) + 'static,
    {
        self.observers
            .entry(object)
            .or_default()
            .collection
            .entry(property.to_string())
            .or_default()
            .listen(key, listener);
    }

    pub fn observe_detach<F>(&mut self, object: Uuid, key: ListenerKey, listener: F)
    where
        F: FnMut(&DetachEvent) + 'static,
    {
        self.observers
            .entry(object)
            .or_default()
            .detach
            .listen(key, listener);
    }

    /// Batch-boundary observations: remote batches applied, local flushes.
    pub fn observe_scope<F>(&mut self, key: ListenerKey, listener: F)
    where
        F: FnMut(&ScopeEvent) + 'static,
    {
        self.scope_observers.listen(key, listener);
    }

    /// Drops every listener registered under `key`, across all objects.
    pub fn remove_observer(&mut self, key: ListenerKey) {
        for observers in self.observers.values_mut() {
            for signal in observers.property.values_mut() {
                signal.remove_listener(key);
            }
            for signal in observers.collection.values_mut() {
                signal.remove_listener(key);
            }
            observers.detach.remove_listener(key);
        }
        self.scope_observers.remove_listener(key);
    }

    // Change capture

    /// Sets one property, running the full capture rule: equality
    /// short-circuit, back-pointer maintenance, observations, composite
    /// fan-out, and pending-change recording unless a remote batch is
    /// applying.
    pub(crate) fn set_property(
        &mut self,
        uuid: Uuid,
        property: &str,
        value: PropertyValue,
    ) -> Result<(), ScopeError> {
        let object = self
            .objects
            .get(&uuid)
            .ok_or(ScopeError::UnknownObject { uuid })?;
        object.check_writable(property, &value)?;
        let schema = Arc::clone(object.schema());
        let old = object
            .value(property)
            .cloned()
            .unwrap_or(PropertyValue::Null);

        // scalars compare by value, references by identity (uuid)
        if old == value {
            return Ok(());
        }

        let is_reference = schema
            .property(property)
            .map(|def| def.value_type.is_reference())
            .unwrap_or(false);
        let is_collection = matches!(old, PropertyValue::RefList(_))
            || matches!(value, PropertyValue::RefList(_));

        if is_reference && self.remote_applying == 0 {
            for target in value.referenced_uuids() {
                if !self.objects.contains_key(&target) {
                    return Err(ScopeError::UnknownReference { uuid: target });
                }
            }
        }

        let (added, removed) = if is_reference {
            diff_references(&old, &value)
        } else {
            (Vec::new(), Vec::new())
        };
        for target in &removed {
            if let Some(child) = self.objects.get_mut(target) {
                child.remove_parent(uuid, property);
            }
        }
        for target in &added {
            if let Some(child) = self.objects.get_mut(target) {
                child.add_parent(uuid, property);
            }
        }

        if let Some(object) = self.objects.get_mut(&uuid) {
            object.set_value(property, value.clone());
        }

        self.notify(QueuedObservation::Property(PropertyChange {
            object: uuid,
            property: property.to_string(),
            old: Some(old),
            new: Some(value),
        }));
        if is_collection {
            for member in removed {
                self.notify(QueuedObservation::Collection(CollectionChange {
                    object: uuid,
                    property: property.to_string(),
                    kind: Removed,
                    member,
                }));
            }
            for member in added {
                self.notify(QueuedObservation::Collection(CollectionChange {
                    object: uuid,
                    property: property.to_string(),
                    kind: Added,
                    member,
                }));
            }
        }
        for composite in schema.composites_for_source(property) {
            self.notify(QueuedObservation::Property(PropertyChange {
                object: uuid,
                property: composite.name.clone(),
                old: None,
                new: None,
            }));
        }

        if self.remote_applying == 0 {
            self.pending.record(uuid, property);
        }
        Ok(())
    }

    // Local flush

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Coalesces pending local changes into an ordered fragment batch:
    /// reachability walk, detach of objects that fell out of reach, `add`
    /// fragments for newly reachable objects (full snapshot), `change`
    /// fragments for touched pre-announced objects, and a leading `root`
    /// fragment when the root was reassigned.
    pub fn flush_changes(&mut self) -> Vec<SyncFragment> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let (touched, root_changed) = self.pending.take();
        let (order, reachable) = self.reachable_set();

        let stale: Vec<Uuid> = self
            .last_reachable
            .iter()
            .filter(|uuid| !reachable.contains(uuid))
            .cloned()
            .collect();
        for uuid in stale {
            self.evict(uuid);
        }
        self.last_reachable = reachable;

        let mut fragments = Vec::new();
        if root_changed {
            if let Some(root_model) = self.root_model() {
                fragments.push(SyncFragment::root(root_model));
            }
        }

        let mut fresh = HashSet::new();
        for uuid in &order {
            if self.synced.contains(uuid) {
                continue;
            }
            if let Some(object) = self.objects.get(uuid) {
                fragments.push(SyncFragment::add(object));
                self.synced.insert(*uuid);
                fresh.insert(*uuid);
            }
        }

        for (uuid, properties) in touched {
            if fresh.contains(&uuid) || !self.synced.contains(&uuid) {
                continue;
            }
            if let Some(object) = self.objects.get(&uuid) {
                let mut encoded = BTreeMap::new();
                for property in properties {
                    let value = object.value(&property).unwrap_or(&PropertyValue::Null);
                    encoded.insert(property, encode_value(value));
                }
                if !encoded.is_empty() {
                    fragments.push(SyncFragment::change(uuid, encoded));
                }
            }
        }

        self.scope_observers.fire(&ScopeEvent::ChangesFlushed {
            fragment_count: fragments.len(),
        });
        fragments
    }

    // Remote apply

    /// Installs or reconciles a full state dump: the root fragment first,
    /// then the extras under the two-pass add/change rule. The whole batch
    /// runs inside one remote-apply interval.
    pub fn apply_root_fragment(&mut self, root_fragment: &SyncFragment, extras: &[SyncFragment]) {
        let mut batch: Vec<&SyncFragment> = Vec::with_capacity(1 + extras.len());
        batch.push(root_fragment);
        batch.extend(extras.iter());

        self.start_applying_remote();
        self.apply_batch(&batch);
        self.end_applying_remote();
        self.scope_observers.fire(&ScopeEvent::RemoteBatchApplied {
            fragment_count: batch.len(),
        });
    }

    /// Applies an incremental inbound batch in list order, under the
    /// two-pass add/change rule, inside one remote-apply interval.
    pub fn apply_sync_fragments(&mut self, fragments: &[SyncFragment]) {
        let batch: Vec<&SyncFragment> = fragments.iter().collect();

        self.start_applying_remote();
        self.apply_batch(&batch);
        self.end_applying_remote();
        self.scope_observers.fire(&ScopeEvent::RemoteBatchApplied {
            fragment_count: batch.len(),
        });
    }

    /// Two passes: instantiate every `add`/`root` first so references wire
    /// up regardless of order within the batch, then set properties in list
    /// order.
    fn apply_batch(&mut self, batch: &[&SyncFragment]) {
        for fragment in batch {
            match fragment.kind {
                FragmentKind::Add => self.instantiate_add(fragment),
                FragmentKind::Root => self.install_root(fragment),
                FragmentKind::Change => {}
            }
        }
        for fragment in batch {
            match fragment.kind {
                FragmentKind::Add | FragmentKind::Root => {
                    self.apply_fragment_properties(fragment);
                }
                FragmentKind::Change => {
                    if !self.objects.contains_key(&fragment.uuid) {
                        warn!(
                            "Dropping change fragment for unknown object {}",
                            fragment.uuid
                        );
                        continue;
                    }
                    self.apply_fragment_properties(fragment);
                }
            }
        }
    }

    /// Duplicate adds are idempotent; an add for a present uuid degrades to
    /// a change in the wiring pass.
    fn instantiate_add(&mut self, fragment: &SyncFragment) {
        if self.objects.contains_key(&fragment.uuid) {
            return;
        }
        let Some(cls) = fragment.cls.as_deref() else {
            warn!("Dropping add fragment for {} without a class name", fragment.uuid);
            return;
        };
        let Some(schema) = self.registry.get(cls) else {
            warn!("Dropping add fragment for unknown class {}", cls);
            return;
        };
        let object = ModelObject::with_uuid(schema, fragment.uuid);
        self.objects.insert(fragment.uuid, object);
        self.synced.insert(fragment.uuid);
    }

    fn install_root(&mut self, fragment: &SyncFragment) {
        if !self.objects.contains_key(&fragment.uuid) {
            let Some(cls) = fragment.cls.as_deref() else {
                warn!("Dropping root fragment for {} without a class name", fragment.uuid);
                return;
            };
            let Some(schema) = self.registry.get(cls) else {
                warn!("Dropping root fragment for unknown class {}", cls);
                return;
            };
            let object = ModelObject::with_uuid(schema, fragment.uuid);
            self.objects.insert(fragment.uuid, object);
            self.synced.insert(fragment.uuid);
        }
        self.root = Some(fragment.uuid);
    }

    /// Sets each listed property on the addressed object. Unknown property
    /// names and undecodable values are skipped per field; references that
    /// do not resolve after the instantiation pass become null.
    fn apply_fragment_properties(&mut self, fragment: &SyncFragment) {
        let Some(properties) = &fragment.properties else {
            return;
        };
        let Some(schema) = self
            .objects
            .get(&fragment.uuid)
            .map(|object| Arc::clone(object.schema()))
        else {
            return;
        };
        for (name, raw) in properties {
            let Some(def) = schema.property(name) else {
                warn!(
                    "Skipping unknown property {} on class {}",
                    name,
                    schema.class_name()
                );
                continue;
            };
            let decoded = match decode_value(def.value_type, raw) {
                Ok(value) => value,
                Err(err) => {
                    warn!("Skipping property {} on {}: {}", name, fragment.uuid, err);
                    continue;
                }
            };
            let resolved = self.resolve_references(decoded, name, fragment.uuid);
            if let Err(err) = self.set_property(fragment.uuid, name, resolved) {
                warn!("Failed to apply property {} on {}: {}", name, fragment.uuid, err);
            }
        }
    }

    fn resolve_references(
        &self,
        value: PropertyValue,
        property: &str,
        owner: Uuid,
    ) -> PropertyValue {
        match value {
            PropertyValue::Ref(target) if !self.objects.contains_key(&target) => {
                warn!(
                    "Reference {} on {}.{} does not resolve, treating as null",
                    target, owner, property
                );
                PropertyValue::Null
            }
            PropertyValue::RefList(members) => PropertyValue::RefList(
                members
                    .into_iter()
                    .filter(|member| {
                        let present = self.objects.contains_key(member);
                        if !present {
                            warn!(
                                "Reference {} on {}.{} does not resolve, dropping member",
                                member, owner, property
                            );
                        }
                        present
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    // Reachability & lifetime

    /// Walks the graph from the root over reference values in schema
    /// declaration order. Returns visit order (parents before the children
    /// they announce) and the reachable set.
    fn reachable_set(&self) -> (Vec<Uuid>, HashSet<Uuid>) {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if let Some(root) = self.root {
            if self.objects.contains_key(&root) {
                seen.insert(root);
                queue.push_back(root);
            }
        }
        while let Some(uuid) = queue.pop_front() {
            order.push(uuid);
            if let Some(object) = self.objects.get(&uuid) {
                for target in object.referenced_uuids() {
                    if self.objects.contains_key(&target) && seen.insert(target) {
                        queue.push_back(target);
                    }
                }
            }
        }
        (order, seen)
    }

    /// Removes an object from the index, unwinding back-pointers on both
    /// sides of its links and firing a detach observation.
    fn evict(&mut self, uuid: Uuid) {
        let Some(object) = self.objects.remove(&uuid) else {
            return;
        };
        self.synced.remove(&uuid);
        self.last_reachable.remove(&uuid);

        for def in object.schema().properties() {
            if let Some(value) = object.value(&def.name) {
                for target in value.referenced_uuids() {
                    if let Some(child) = self.objects.get_mut(&target) {
                        child.remove_parent(uuid, &def.name);
                    }
                }
            }
        }

        // a parent still holding a link here is itself unreachable or the
        // link was already cleared; null any stale entry
        for link in object.parents() {
            if let Some(parent) = self.objects.get_mut(&link.parent) {
                let current = parent.value(&link.property).cloned();
                match current {
                    Some(PropertyValue::Ref(target)) if target == uuid => {
                        parent.set_value(&link.property, PropertyValue::Null);
                    }
                    Some(PropertyValue::RefList(mut members)) => {
                        if let Some(position) = members.iter().position(|member| *member == uuid) {
                            members.remove(position);
                            parent.set_value(&link.property, PropertyValue::RefList(members));
                        }
                    }
                    _ => {}
                }
            }
        }

        self.notify(QueuedObservation::Detach(DetachEvent {
            object: uuid,
            class_name: object.class_name().to_string(),
        }));
    }

    // Observation dispatch

    fn notify(&mut self, observation: QueuedObservation) {
        if self.remote_applying > 0 {
            self.queued.push(observation);
        } else {
            self.dispatch(observation);
        }
    }

    fn dispatch(&mut self, observation: QueuedObservation) {
        match observation {
            QueuedObservation::Property(change) => {
                if let Some(observers) = self.observers.get_mut(&change.object) {
                    if let Some(signal) = observers.property.get_mut(&change.property) {
                        signal.fire(&change);
                    }
                }
            }
            QueuedObservation::Collection(change) => {
                if let Some(observers) = self.observers.get_mut(&change.object) {
                    if let Some(signal) = observers.collection.get_mut(&change.property) {
                        signal.fire(&change);
                    }
                }
            }
            QueuedObservation::Detach(event) => {
                if let Some(mut observers) = self.observers.remove(&event.object) {
                    observers.detach.fire(&event);
                }
            }
        }
    }
}

/// Multiset diff over the uuids two reference values point at.
fn diff_references(old: &PropertyValue, new: &PropertyValue) -> (Vec<Uuid>, Vec<Uuid>) {
    let mut removed = old.referenced_uuids();
    let mut added = Vec::new();
    for target in new.referenced_uuids() {
        if let Some(position) = removed.iter().position(|member| *member == target) {
            removed.remove(position);
        } else {
            added.push(target);
        }
    }
    (added, removed)
}

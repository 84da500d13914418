use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Deregistration token for [`Signal`] listeners. One caller can reuse a
/// single key across many registrations and drop them all atomically with
/// one `remove_listener` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(u64);

impl ListenerKey {
    pub fn new() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer registry for a single subject. Listeners fire in registration
/// order.
pub struct Signal<T> {
    listeners: Vec<(ListenerKey, Box<dyn FnMut(&T)>)>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register a listener under the given key. Multiple listeners may share
    /// a key.
    pub fn listen<F: FnMut(&T) + 'static>(&mut self, key: ListenerKey, listener: F) {
        self.listeners.push((key, Box::new(listener)));
    }

    /// Remove every listener registered under the given key.
    pub fn remove_listener(&mut self, key: ListenerKey) {
        self.listeners.retain(|(other, _)| *other != key);
    }

    /// Invoke every listener, in registration order.
    pub fn fire(&mut self, event: &T) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

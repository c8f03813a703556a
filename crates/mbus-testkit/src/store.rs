use anyhow::Result;
use serde_json::Value;
use std::cell::{Cell, RefCell};

use mbus_catchup::ports::{Clock, KeyValueStore};
use mbus_catchup::{CatchUpPublisher, KeyLayout, RecordTimestamp};
use mbus_store::MemoryStore;

/// Wraps a store and counts every call the reconciler makes.
pub struct CountingStore<S> {
    inner: S,
    list_calls: Cell<usize>,
    get_calls: Cell<usize>,
    patterns: RefCell<Vec<String>>,
}

impl<S: KeyValueStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            list_calls: Cell::new(0),
            get_calls: Cell::new(0),
            patterns: RefCell::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.get()
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls() + self.get_calls()
    }

    /// Patterns passed to `list_keys`, in call order.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.borrow().clone()
    }
}

impl<S: KeyValueStore> KeyValueStore for CountingStore<S> {
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.list_calls.set(self.list_calls.get() + 1);
        self.patterns.borrow_mut().push(pattern.to_string());
        self.inner.list_keys(pattern)
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.get_calls.set(self.get_calls.get() + 1);
        self.inner.get_value(key)
    }
}

/// Write one catch-up record through the publishing path with a fixed timestamp.
pub fn seed_record<C: Clock>(
    store: &MemoryStore<C>,
    layout: &KeyLayout,
    timestamp: &str,
    channel: &str,
    identifier: &str,
    message: &Value,
) -> Result<String> {
    let at = RecordTimestamp::parse(timestamp)
        .ok_or_else(|| anyhow::anyhow!("bad fixture timestamp '{timestamp}'"))?;
    CatchUpPublisher::new(layout.clone(), store).record_at(channel, identifier, message, &at)
}

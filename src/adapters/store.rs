use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::adapters::PersistenceAdapter;
use crate::selection::PersistedRange;

/// A change to one attribute of the store, delivered to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub attribute: String,
    pub value: Value,
}

#[derive(Debug)]
struct Attribute {
    default: Value,
    value: Value,
    subscribers: Vec<Sender<AttributeChange>>,
}

impl Attribute {
    fn new(default: Value) -> Self {
        Self {
            value: default.clone(),
            default,
            subscribers: Vec::new(),
        }
    }
}

/// Named-attribute state shared by every filter on a page. It is the part
/// that survives navigation: [`StateStore::snapshot`] yields what would be
/// put in a shareable URL and [`StateStore::restore`] applies one back.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<IndexMap<String, Attribute>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` with its default. Registering twice keeps the current
    /// value.
    pub fn register(&self, name: &str, default: Value) {
        let mut attributes = self.inner.lock();
        attributes
            .entry(name.to_string())
            .or_insert_with(|| Attribute::new(default));
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.lock().get(name).map(|attr| attr.value.clone())
    }

    /// Stores `value`, notifying subscribers only when it differs from what
    /// was there. Returns whether anything changed.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let mut attributes = self.inner.lock();
        let attribute = attributes.entry(name.to_string()).or_insert_with(|| {
            tracing::warn!(attribute = name, "setting unregistered attribute");
            Attribute::new(Value::Null)
        });
        if attribute.value == value {
            return false;
        }
        attribute.value = value;
        notify(name, attribute);
        true
    }

    /// Puts every attribute back to its default, as a "clear all filters"
    /// action would.
    pub fn reset_all(&self) {
        let mut attributes = self.inner.lock();
        for (name, attribute) in attributes.iter_mut() {
            if attribute.value != attribute.default {
                attribute.value = attribute.default.clone();
                notify(name, attribute);
            }
        }
    }

    pub fn subscribe(&self, name: &str) -> Receiver<AttributeChange> {
        let (tx, rx) = unbounded();
        let mut attributes = self.inner.lock();
        attributes
            .entry(name.to_string())
            .or_insert_with(|| Attribute::new(Value::Null))
            .subscribers
            .push(tx);
        rx
    }

    /// Attributes that differ from their defaults, in registration order.
    pub fn snapshot(&self) -> Value {
        let attributes = self.inner.lock();
        let map: Map<String, Value> = attributes
            .iter()
            .filter(|(_, attr)| attr.value != attr.default)
            .map(|(name, attr)| (name.clone(), attr.value.clone()))
            .collect();
        Value::Object(map)
    }

    /// Applies a snapshot the way navigating to a saved URL does: listed
    /// attributes take the given value, the rest return to their defaults.
    pub fn restore(&self, snapshot: &Value) {
        let empty = Map::new();
        let listed = snapshot.as_object().unwrap_or(&empty);
        let names: Vec<String> = self.inner.lock().keys().cloned().collect();
        for name in names {
            match listed.get(&name) {
                Some(value) => {
                    self.set(&name, value.clone());
                }
                None => {
                    let default = self.inner.lock().get(&name).map(|attr| attr.default.clone());
                    if let Some(default) = default {
                        self.set(&name, default);
                    }
                }
            }
        }
        for (name, value) in listed {
            if !self.inner.lock().contains_key(name) {
                tracing::debug!(attribute = %name, "restoring attribute nobody registered");
                self.set(name, value.clone());
            }
        }
    }
}

fn notify(name: &str, attribute: &mut Attribute) {
    let change = AttributeChange {
        attribute: name.to_string(),
        value: attribute.value.clone(),
    };
    attribute
        .subscribers
        .retain(|subscriber| subscriber.send(change.clone()).is_ok());
}

/// Persistence for one range filter: the `<id>:rangePicker` attribute.
#[derive(Debug, Clone)]
pub struct StoreBinding {
    store: StateStore,
    attribute: String,
}

impl StoreBinding {
    pub fn register(store: StateStore, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        store.register(&attribute, PersistedRange::default().to_value());
        Self { store, attribute }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn subscribe(&self) -> Receiver<AttributeChange> {
        self.store.subscribe(&self.attribute)
    }
}

impl PersistenceAdapter for StoreBinding {
    fn get(&self) -> Option<Value> {
        self.store.get(&self.attribute)
    }

    fn set(&mut self, state: &PersistedRange) {
        self.store.set(&self.attribute, state.to_value());
    }
}

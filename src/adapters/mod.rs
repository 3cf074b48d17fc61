use serde_json::Value;
use thiserror::Error;

use crate::reconciler::QueryRequest;
use crate::selection::{PersistedRange, PresetId, Timestamp};

pub mod memory;
pub mod store;

pub use memory::{ControlEvent, ControlEvents, DateInput, PresetSelector, RecordingPipeline};
pub use store::{AttributeChange, StateStore, StoreBinding};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("{control} input is not rendered")]
    Unavailable { control: &'static str },
}

/// Whether a write into an adapter should be reported back as a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    Emit,
    Suppress,
}

/// One date-entry control ("from" or "to").
pub trait InputAdapter {
    /// Text currently displayed by the control, empty when nothing is picked.
    fn value(&self) -> Result<String, AdapterError>;

    fn set_value(&mut self, timestamp: Timestamp, notify: Notify);

    fn set_value_silently(&mut self, timestamp: Timestamp) {
        self.set_value(timestamp, Notify::Suppress);
    }

    /// Clears the control without reporting a change.
    fn reset(&mut self);
}

/// The quick-select control.
pub trait PresetAdapter {
    fn selected_index(&self) -> Option<PresetId>;

    fn set_selected_index(&mut self, index: PresetId, notify: Notify);

    fn set_selected_index_silently(&mut self, index: PresetId) {
        self.set_selected_index(index, Notify::Suppress);
    }

    /// Clears the highlight without reporting a change.
    fn reset(&mut self);

    /// Concrete `(from, to)` bounds the preset stands for right now.
    fn resolve_range(&self, index: PresetId) -> Option<(Timestamp, Timestamp)>;

    fn is_valid(&self, index: PresetId) -> bool;
}

/// The widget's slot in the shared, navigation-surviving state store.
pub trait PersistenceAdapter {
    fn get(&self) -> Option<Value>;

    fn set(&mut self, state: &PersistedRange);
}

/// Fire-and-forget access to whatever runs searches.
pub trait SearchPipeline {
    fn request_query_run(&mut self, request: QueryRequest);
}

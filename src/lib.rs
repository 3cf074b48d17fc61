pub mod adapters;
pub mod cli;
pub mod config;
pub mod dates;
pub mod expression;
pub mod presets;
pub mod reconciler;
pub mod selection;
pub mod summary;
pub mod widget;

pub use config::{ConfigLoader, ConfigPaths, PickerConfig};
pub use expression::compile;
pub use reconciler::{ActionCause, Outcome, QueryRequest, Reconciler};
pub use selection::{PersistedRange, PresetId, RangeSelection, Timestamp};
pub use summary::summarize;
pub use widget::RangePicker;

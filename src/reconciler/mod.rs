use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use strum::Display;

use crate::adapters::{InputAdapter, PersistenceAdapter, PresetAdapter, SearchPipeline};
use crate::config::PickerConfig;
use crate::dates::parse_input_text;
use crate::expression::compile;
use crate::selection::{PersistedRange, PresetId, RangeSelection, Timestamp};
use crate::summary::{summarize, BoundText};

/// Why a search was requested; also the analytics cause name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ActionCause {
    FacetRangeInputChange,
    FacetRangeRadioSelect,
    FacetRangeClear,
}

/// What the search pipeline receives when a reconciliation needs new
/// results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub cause: ActionCause,
    pub expression: Option<String>,
    pub state: PersistedRange,
}

/// Where a reconciliation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Source {
    Input,
    Preset,
    Persisted,
    Reset,
    BreadcrumbClear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub source: Source,
    pub previous: RangeSelection,
    pub selection: RangeSelection,
    pub query: Option<ActionCause>,
}

impl Outcome {
    pub fn changed(&self) -> bool {
        self.previous != self.selection
    }

    pub fn requested_query(&self) -> bool {
        self.query.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub title: String,
    pub caption: String,
}

impl std::fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.caption)
    }
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    From,
    To,
}

/// Owns the canonical [`RangeSelection`] and keeps the two inputs, the preset
/// selector and the persisted state in agreement with it.
///
/// Every write the reconciler makes into an adapter is silent, so its own
/// propagation never comes back as a user event. Within one reconciliation the
/// adapters are written first, then the persisted state, then the search is
/// requested.
pub struct Reconciler<I, P, S, Q> {
    config: Arc<PickerConfig>,
    from_input: I,
    to_input: I,
    presets: P,
    store: S,
    pipeline: Q,
    selection: RangeSelection,
}

impl<I, P, S, Q> Reconciler<I, P, S, Q>
where
    I: InputAdapter,
    P: PresetAdapter,
    S: PersistenceAdapter,
    Q: SearchPipeline,
{
    pub fn new(
        config: Arc<PickerConfig>,
        from_input: I,
        to_input: I,
        presets: P,
        store: S,
        pipeline: Q,
    ) -> Self {
        Self {
            config,
            from_input,
            to_input,
            presets,
            store,
            pipeline,
            selection: RangeSelection::EMPTY,
        }
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    pub fn selection(&self) -> RangeSelection {
        self.selection
    }

    pub fn has_empty_state(&self) -> bool {
        self.selection.is_empty()
    }

    pub fn from_input(&self) -> &I {
        &self.from_input
    }

    pub fn from_input_mut(&mut self) -> &mut I {
        &mut self.from_input
    }

    pub fn to_input(&self) -> &I {
        &self.to_input
    }

    pub fn to_input_mut(&mut self) -> &mut I {
        &mut self.to_input
    }

    pub fn presets(&self) -> &P {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut P {
        &mut self.presets
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pipeline(&self) -> &Q {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Q {
        &mut self.pipeline
    }

    /// Loads whatever the store already holds into a freshly built widget.
    pub fn restore(&mut self) -> Outcome {
        match self.store.get() {
            Some(value) => self.external_changed(&value),
            None => self.outcome(Source::Persisted, self.selection, None),
        }
    }

    /// One of the inputs was edited by the user.
    pub fn input_changed(&mut self) -> Outcome {
        let next = RangeSelection {
            from: self.read_input(Bound::From),
            to: self.read_input(Bound::To),
            preset: None,
        };
        let execute_query = next.bounds_differ(&self.selection);
        tracing::debug!(
            from = ?next.from,
            to = ?next.to,
            execute_query,
            "input change"
        );
        if self.config.enable_presets {
            self.presets.reset();
        }
        self.commit(
            Source::Input,
            next,
            execute_query.then_some(ActionCause::FacetRangeInputChange),
        )
    }

    /// The user picked preset `index`.
    pub fn preset_selected(&mut self, index: PresetId) -> Outcome {
        if !self.config.enable_presets {
            tracing::warn!(index, "preset selected while presets are disabled");
            return self.outcome(Source::Preset, self.selection, None);
        }
        let range = if self.presets.is_valid(index) {
            self.presets.resolve_range(index)
        } else {
            None
        };
        let Some((from, to)) = range else {
            tracing::warn!(index, "preset does not resolve to a range, ignoring");
            return self.outcome(Source::Preset, self.selection, None);
        };
        tracing::info!(index, from = from.millis(), to = to.millis(), "preset selected");

        self.from_input.set_value_silently(from);
        self.to_input.set_value_silently(to);
        self.presets.set_selected_index_silently(index);
        self.commit(
            Source::Preset,
            RangeSelection::new(Some(from), Some(to), Some(index)),
            Some(ActionCause::FacetRangeRadioSelect),
        )
    }

    /// The persisted value changed, from this widget or from outside
    /// (navigation, another component). The store is authoritative: fields
    /// that do not parse become unset. No search is requested because the
    /// event that moved the store already caused one.
    pub fn external_changed(&mut self, value: &Value) -> Outcome {
        let presets = &self.presets;
        let next = RangeSelection::from_persisted_value(value, |idx| presets.is_valid(idx));
        if next.to_persisted().to_value() != *value {
            tracing::debug!(%value, normalized = ?next, "normalized persisted range");
        }
        self.push_to_adapters(next);
        let previous = std::mem::replace(&mut self.selection, next);
        self.outcome(Source::Persisted, previous, None)
    }

    /// Clears everything. `execute_query` is false when the clear is itself a
    /// reaction to something that already runs a search.
    pub fn reset(&mut self, execute_query: bool) -> Outcome {
        self.clear(Source::Reset, execute_query)
    }

    /// The breadcrumb was cleared, usually by a "clear all" that runs its
    /// own search.
    pub fn breadcrumb_cleared(&mut self) -> Outcome {
        self.clear(Source::BreadcrumbClear, false)
    }

    /// Brings the controls back in line with canonical state once a search
    /// has completed.
    pub fn query_succeeded(&mut self) {
        self.push_to_adapters(self.selection);
    }

    pub fn expression(&self) -> Option<String> {
        compile(&self.selection, &self.config.field_from, &self.config.field_to)
    }

    /// Adds this filter's expression while the pipeline assembles a query.
    pub fn building_query(&self, expressions: &mut Vec<String>) {
        if let Some(expression) = self.expression() {
            expressions.push(expression);
        }
    }

    pub fn summary(&self) -> Option<String> {
        summarize(
            &self.selection,
            BoundText::new(&self.config.from_label, self.from_input.value()),
            BoundText::new(&self.config.to_label, self.to_input.value()),
        )
    }

    pub fn breadcrumb(&self) -> Option<Breadcrumb> {
        self.summary().map(|caption| Breadcrumb {
            title: self.config.title.clone(),
            caption,
        })
    }

    fn clear(&mut self, source: Source, execute_query: bool) -> Outcome {
        tracing::info!(%source, execute_query, "reset");
        self.from_input.reset();
        self.to_input.reset();
        if self.config.enable_presets {
            self.presets.reset();
        }
        self.commit(
            source,
            RangeSelection::EMPTY,
            execute_query.then_some(ActionCause::FacetRangeClear),
        )
    }

    fn commit(&mut self, source: Source, next: RangeSelection, query: Option<ActionCause>) -> Outcome {
        let previous = std::mem::replace(&mut self.selection, next);
        self.store.set(&next.to_persisted());
        if let Some(cause) = query {
            self.request_query(cause);
        }
        self.outcome(source, previous, query)
    }

    fn request_query(&mut self, cause: ActionCause) {
        let request = QueryRequest {
            cause,
            expression: self.expression(),
            state: self.selection.to_persisted(),
        };
        tracing::info!(
            %cause,
            field_from = %self.config.field_from,
            field_to = %self.config.field_to,
            title = %self.config.title,
            state = ?request.state,
            "requesting query"
        );
        self.pipeline.request_query_run(request);
    }

    fn push_to_adapters(&mut self, selection: RangeSelection) {
        push_bound(&mut self.from_input, selection.from);
        push_bound(&mut self.to_input, selection.to);
        match selection.preset {
            Some(index) => self.presets.set_selected_index_silently(index),
            None => self.presets.reset(),
        }
    }

    fn read_input(&self, bound: Bound) -> Option<Timestamp> {
        let (input, current) = match bound {
            Bound::From => (&self.from_input, self.selection.from),
            Bound::To => (&self.to_input, self.selection.to),
        };
        match input.value() {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => {
                let parsed = parse_input_text(&text);
                if parsed.is_none() {
                    tracing::warn!(?bound, %text, "input text is not a date, treating as unset");
                }
                parsed
            }
            Err(err) => {
                tracing::warn!(%err, ?bound, "input unreadable, keeping current bound");
                current
            }
        }
    }

    fn outcome(&self, source: Source, previous: RangeSelection, query: Option<ActionCause>) -> Outcome {
        Outcome {
            source,
            previous,
            selection: self.selection,
            query,
        }
    }
}

fn push_bound<I: InputAdapter>(input: &mut I, bound: Option<Timestamp>) {
    match bound {
        Some(timestamp) => input.set_value_silently(timestamp),
        None => input.reset(),
    }
}

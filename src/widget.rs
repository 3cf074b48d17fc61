use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::adapters::{
    AttributeChange, ControlEvent, ControlEvents, DateInput, PresetSelector, RecordingPipeline,
    StateStore, StoreBinding,
};
use crate::config::PickerConfig;
use crate::reconciler::{Breadcrumb, Outcome, QueryRequest, Reconciler};
use crate::selection::RangeSelection;

const MAX_PUMP_ROUNDS: usize = 16;

pub type StandardReconciler = Reconciler<DateInput, PresetSelector, StoreBinding, RecordingPipeline>;

/// A date-range filter wired to in-memory controls and a shared
/// [`StateStore`]. [`RangePicker::pump`] stands in for the event loop: it
/// hands queued notifications to the reconciler until nothing is left.
pub struct RangePicker {
    reconciler: StandardReconciler,
    events: ControlEvents,
    changes: Receiver<AttributeChange>,
}

impl RangePicker {
    pub fn new(config: Arc<PickerConfig>, store: StateStore) -> Self {
        let presets = PresetSelector::new(config.catalog(), config.week_start());
        Self::with_presets(config, store, presets)
    }

    pub fn with_presets(config: Arc<PickerConfig>, store: StateStore, presets: PresetSelector) -> Self {
        let binding = StoreBinding::register(store, config.state_attribute());
        let changes = binding.subscribe();
        let events = ControlEvents::new();
        let mut reconciler = Reconciler::new(
            config,
            DateInput::new("from").with_events(events.clone()),
            DateInput::new("to").with_events(events.clone()),
            presets.with_events(events.clone()),
            binding,
            RecordingPipeline::default(),
        );
        reconciler.restore();
        Self {
            reconciler,
            events,
            changes,
        }
    }

    pub fn reconciler(&self) -> &StandardReconciler {
        &self.reconciler
    }

    pub fn selection(&self) -> RangeSelection {
        self.reconciler.selection()
    }

    pub fn from_input(&mut self) -> &mut DateInput {
        self.reconciler.from_input_mut()
    }

    pub fn to_input(&mut self) -> &mut DateInput {
        self.reconciler.to_input_mut()
    }

    pub fn presets(&mut self) -> &mut PresetSelector {
        self.reconciler.presets_mut()
    }

    /// Delivers pending notifications: control events in the order they
    /// happened, then store changes, repeating while any of them produced
    /// new ones.
    pub fn pump(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for _ in 0..MAX_PUMP_ROUNDS {
            let before = outcomes.len();

            for event in self.events.drain() {
                let outcome = match event {
                    ControlEvent::InputEdited { control, text } => {
                        // A click handled before this edit may have overwritten the field.
                        self.input_named(control).restore_text(&text);
                        self.reconciler.input_changed()
                    }
                    ControlEvent::PresetClicked(index) => self.reconciler.preset_selected(index),
                };
                outcomes.push(outcome);
            }
            let changes: Vec<AttributeChange> = self.changes.try_iter().collect();
            for change in changes {
                outcomes.push(self.reconciler.external_changed(&change.value));
            }

            if outcomes.len() == before {
                return outcomes;
            }
        }
        tracing::warn!(
            rounds = MAX_PUMP_ROUNDS,
            "notifications kept arriving, leaving the rest for the next pump"
        );
        outcomes
    }

    fn input_named(&mut self, control: &str) -> &mut DateInput {
        if self.reconciler.from_input().control() == control {
            self.reconciler.from_input_mut()
        } else {
            self.reconciler.to_input_mut()
        }
    }

    /// The eraser in the header.
    pub fn clear(&mut self) -> Outcome {
        self.reconciler.reset(true)
    }

    pub fn breadcrumb_clear(&mut self) -> Outcome {
        self.reconciler.breadcrumb_cleared()
    }

    pub fn query_succeeded(&mut self) {
        self.reconciler.query_succeeded();
    }

    /// Drives the "active" appearance and the eraser's visibility.
    pub fn is_active(&self) -> bool {
        !self.reconciler.has_empty_state()
    }

    pub fn breadcrumb(&self) -> Option<Breadcrumb> {
        self.reconciler.breadcrumb()
    }

    pub fn building_query(&self, expressions: &mut Vec<String>) {
        self.reconciler.building_query(expressions);
    }

    pub fn take_requests(&mut self) -> Vec<QueryRequest> {
        self.reconciler.pipeline_mut().take_requests()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::PresetAdapter;
    use crate::presets::{PresetCatalog, PresetKind};
    use crate::reconciler::{ActionCause, Source};
    use serde_json::json;
    use time::macros::date;
    use time::Weekday;

    fn picker(store: &StateStore) -> RangePicker {
        let mut config = PickerConfig {
            id: "date".into(),
            field_from: "field_from".into(),
            field_to: "field_to".into(),
            enable_presets: true,
            ..PickerConfig::default()
        };
        config.post_load();
        let presets = PresetSelector::new(PresetCatalog::default(), Weekday::Sunday)
            .with_today(date!(2024 - 02 - 14));
        RangePicker::with_presets(Arc::new(config), store.clone(), presets)
    }

    #[test]
    fn each_user_action_runs_exactly_one_query() {
        let store = StateStore::new();
        let mut picker = picker(&store);

        picker.from_input().pick(date!(2024 - 01 - 01));
        picker.pump();
        picker.to_input().pick(date!(2024 - 01 - 31));
        let outcomes = picker.pump();
        // The reconciler's own store write comes back once and changes nothing.
        assert!(outcomes
            .iter()
            .any(|outcome| outcome.source == Source::Persisted && !outcome.changed()));
        let requests = picker.take_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].expression.as_deref(),
            Some("field_from >= 2024-01-01 AND field_to <= 2024-01-31")
        );

        let this_week = PresetCatalog::default()
            .position(PresetKind::ThisWeek)
            .expect("this week");
        picker.presets().click(this_week);
        picker.pump();
        let requests = picker.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].cause, ActionCause::FacetRangeRadioSelect);
        assert_eq!(picker.selection().preset, Some(this_week));
        assert_eq!(
            requests[0].expression.as_deref(),
            Some("field_from >= 2024-02-11 AND field_to <= 2024-02-17")
        );
        assert!(picker.pump().is_empty());
    }

    #[test]
    fn navigation_updates_controls_without_querying() {
        let store = StateStore::new();
        let mut picker = picker(&store);
        picker.from_input().type_text("2024-01-01");
        picker.pump();
        let bookmark = store.snapshot();
        picker.take_requests();

        picker.clear();
        picker.pump();
        assert!(!picker.is_active());
        assert_eq!(picker.take_requests().len(), 1);

        // Back button: the store goes back to the bookmarked state.
        store.restore(&bookmark);
        picker.pump();
        assert!(picker.is_active());
        assert_eq!(picker.from_input().text(), "2024-01-01");
        assert!(picker.take_requests().is_empty());

        // Same navigation again is a no-op.
        store.restore(&bookmark);
        assert!(picker.pump().is_empty());
    }

    #[test]
    fn clear_all_filters_resets_without_extra_query() {
        let store = StateStore::new();
        let mut picker = picker(&store);
        picker.presets().click(0);
        picker.pump();
        picker.take_requests();

        store.reset_all();
        picker.pump();
        assert!(!picker.is_active());
        assert_eq!(picker.reconciler().presets().selected_index(), None);

        picker.breadcrumb_clear();
        assert!(picker.take_requests().is_empty());
        assert_eq!(picker.breadcrumb(), None);
    }

    #[test]
    fn rebuilt_widget_restores_shared_state() {
        let store = StateStore::new();
        store.register("date:rangePicker", json!({ "from": -1, "to": -1, "radio": -1 }));
        store.set(
            "date:rangePicker",
            json!({ "from": "1706659200000", "to": -1, "radio": 3 }),
        );
        let mut picker = picker(&store);
        assert_eq!(picker.from_input().text(), "2024-01-31");
        assert_eq!(picker.reconciler().presets().selected_index(), Some(3));
        let mut expressions = Vec::new();
        picker.building_query(&mut expressions);
        assert_eq!(expressions, ["field_from >= 2024-01-31"]);
        assert_eq!(
            picker.breadcrumb().map(|crumb| crumb.to_string()).as_deref(),
            Some("Date: from 2024-01-31")
        );
    }

    #[test]
    fn query_success_resyncs_controls() {
        let store = StateStore::new();
        let mut picker = picker(&store);
        picker.to_input().type_text("next tuesday");
        picker.pump();
        assert_eq!(picker.selection(), RangeSelection::EMPTY);
        picker.query_succeeded();
        assert_eq!(picker.to_input().text(), "");
    }

    #[test]
    fn typed_edit_after_click_wins() {
        let store = StateStore::new();
        let mut picker = picker(&store);
        let this_week = PresetCatalog::default()
            .position(PresetKind::ThisWeek)
            .expect("this week");

        picker.presets().click(this_week);
        picker.from_input().type_text("2024-01-05");
        picker.pump();

        assert_eq!(picker.selection().preset, None);
        assert_eq!(picker.from_input().text(), "2024-01-05");
        assert_eq!(
            picker.reconciler().expression().as_deref(),
            Some("field_from >= 2024-01-05 AND field_to <= 2024-02-17")
        );
        let causes: Vec<ActionCause> = picker.take_requests().into_iter().map(|req| req.cause).collect();
        assert_eq!(
            causes,
            [ActionCause::FacetRangeRadioSelect, ActionCause::FacetRangeInputChange]
        );
    }

    #[test]
    fn days_before_1970_filter_like_any_other() {
        let store = StateStore::new();
        let mut picker = picker(&store);

        picker.from_input().pick(date!(1950 - 01 - 01));
        picker.pump();

        assert!(picker.is_active());
        assert_eq!(
            picker.reconciler().expression().as_deref(),
            Some("field_from >= 1950-01-01")
        );
        assert_eq!(picker.take_requests().len(), 1);
        assert_eq!(
            store.get("date:rangePicker"),
            Some(json!({ "from": -631_152_000_000_i64, "to": -1, "radio": -1 }))
        );
    }

    #[test]
    fn instant_typed_into_input_settles_on_its_day() {
        let store = StateStore::new();
        let mut picker = picker(&store);

        picker.to_input().type_text("2024-01-31T12:00:00Z");
        picker.pump();
        assert_eq!(picker.take_requests().len(), 1);
        let settled = picker.selection();
        assert_eq!(settled.to.map(|to| to.date()), Some(date!(2024 - 01 - 31)));

        // Committing the untouched field again must not move the bound.
        picker.from_input().type_text("");
        picker.pump();
        assert_eq!(picker.selection(), settled);
        assert!(picker.take_requests().is_empty());
    }
}

use crossbeam_channel::{unbounded, Receiver, Sender};
use time::{Date, Weekday};

use crate::adapters::{AdapterError, InputAdapter, Notify, PresetAdapter, SearchPipeline};
use crate::dates::{format_date, start_of_day, today_utc};
use crate::presets::PresetCatalog;
use crate::reconciler::QueryRequest;
use crate::selection::{PresetId, Timestamp};

/// A user interaction waiting to be handed to the reconciler. Edits carry
/// the text the user left in the field at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    InputEdited { control: &'static str, text: String },
    PresetClicked(PresetId),
}

/// Arrival-ordered queue of [`ControlEvent`]s. Clones share one queue, so
/// every control of a widget reports into a single stream.
#[derive(Debug, Clone)]
pub struct ControlEvents {
    sender: Sender<ControlEvent>,
    receiver: Receiver<ControlEvent>,
}

impl Default for ControlEvents {
    fn default() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }
}

impl ControlEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ControlEvent) {
        // The queue owns its receiver, so the channel cannot be disconnected.
        if let Err(err) = self.sender.send(event) {
            tracing::warn!(event = ?err.0, "control event queue closed, dropping event");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Takes every queued event, oldest first.
    pub fn drain(&self) -> Vec<ControlEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Date input backed by plain text, the way a calendar-enhanced text field
/// behaves. User edits queue a change notification; silent writes do not.
#[derive(Debug, Clone)]
pub struct DateInput {
    control: &'static str,
    text: String,
    rendered: bool,
    events: ControlEvents,
}

impl DateInput {
    pub fn new(control: &'static str) -> Self {
        Self {
            control,
            text: String::new(),
            rendered: true,
            events: ControlEvents::new(),
        }
    }

    /// Reports edits into `events` instead of a queue of its own.
    pub fn with_events(mut self, events: ControlEvents) -> Self {
        self.events = events;
        self
    }

    pub fn control(&self) -> &'static str {
        self.control
    }

    pub fn events(&self) -> &ControlEvents {
        &self.events
    }

    /// A user typing into the field. Empty text clears it.
    pub fn type_text(&mut self, text: &str) {
        self.text = text.trim().to_string();
        self.notify_edit();
    }

    /// A user picking a day from the calendar pop-up.
    pub fn pick(&mut self, date: Date) {
        self.text = format_date(date);
        self.notify_edit();
    }

    /// Puts back text the user entered earlier without reporting an edit.
    pub fn restore_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn notify_edit(&self) {
        self.events.push(ControlEvent::InputEdited {
            control: self.control,
            text: self.text.clone(),
        });
    }

    pub fn set_rendered(&mut self, rendered: bool) {
        self.rendered = rendered;
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl InputAdapter for DateInput {
    fn value(&self) -> Result<String, AdapterError> {
        if !self.rendered {
            return Err(AdapterError::Unavailable {
                control: self.control,
            });
        }
        Ok(self.text.clone())
    }

    fn set_value(&mut self, timestamp: Timestamp, notify: Notify) {
        self.text = format_date(timestamp.date());
        if notify == Notify::Emit {
            self.notify_edit();
        }
    }

    fn reset(&mut self) {
        self.text.clear();
    }
}

/// Mutually-exclusive preset buttons over a [`PresetCatalog`].
#[derive(Debug, Clone)]
pub struct PresetSelector {
    catalog: PresetCatalog,
    week_start: Weekday,
    today: Option<Date>,
    selected: Option<PresetId>,
    events: ControlEvents,
}

impl PresetSelector {
    pub fn new(catalog: PresetCatalog, week_start: Weekday) -> Self {
        Self {
            catalog,
            week_start,
            today: None,
            selected: None,
            events: ControlEvents::new(),
        }
    }

    /// Reports clicks into `events` instead of a queue of its own.
    pub fn with_events(mut self, events: ControlEvents) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &ControlEvents {
        &self.events
    }

    /// Pins the reference day used to resolve presets instead of the clock.
    pub fn with_today(mut self, today: Date) -> Self {
        self.today = Some(today);
        self
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn today(&self) -> Date {
        self.today.unwrap_or_else(today_utc)
    }

    /// A user clicking a preset button.
    pub fn click(&mut self, index: PresetId) {
        self.set_selected_index(index, Notify::Emit);
    }

}

impl PresetAdapter for PresetSelector {
    fn selected_index(&self) -> Option<PresetId> {
        self.selected
    }

    fn set_selected_index(&mut self, index: PresetId, notify: Notify) {
        if !self.catalog.is_valid(index) {
            tracing::warn!(index, "ignoring unknown preset index");
            return;
        }
        self.selected = Some(index);
        if notify == Notify::Emit {
            self.events.push(ControlEvent::PresetClicked(index));
        }
    }

    fn reset(&mut self) {
        self.selected = None;
    }

    fn resolve_range(&self, index: PresetId) -> Option<(Timestamp, Timestamp)> {
        let entry = self.catalog.get(index)?;
        let (first, last) = entry.kind.resolve(self.today(), self.week_start)?;
        Some((start_of_day(first)?, start_of_day(last)?))
    }

    fn is_valid(&self, index: PresetId) -> bool {
        self.catalog.is_valid(index)
    }
}

/// Keeps every search request it is handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingPipeline {
    requests: Vec<QueryRequest>,
}

impl RecordingPipeline {
    pub fn requests(&self) -> &[QueryRequest] {
        &self.requests
    }

    pub fn take_requests(&mut self) -> Vec<QueryRequest> {
        std::mem::take(&mut self.requests)
    }
}

impl SearchPipeline for RecordingPipeline {
    fn request_query_run(&mut self, request: QueryRequest) {
        self.requests.push(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::PresetKind;
    use time::macros::date;

    #[test]
    fn silent_writes_do_not_queue_changes() {
        let mut input = DateInput::new("from");
        let ts = start_of_day(date!(2024 - 01 - 01)).expect("ts");
        input.set_value_silently(ts);
        assert_eq!(input.value().as_deref(), Ok("2024-01-01"));
        assert!(input.events().is_empty());

        input.set_value(ts, Notify::Emit);
        input.type_text("");
        assert_eq!(input.events().drain().len(), 2);
        assert_eq!(input.value().as_deref(), Ok(""));
        assert!(input.events().is_empty());
    }

    #[test]
    fn unrendered_input_is_unavailable() {
        let mut input = DateInput::new("to");
        input.pick(date!(2024 - 05 - 01));
        input.set_rendered(false);
        assert_eq!(input.value(), Err(AdapterError::Unavailable { control: "to" }));
    }

    #[test]
    fn selector_resolves_against_pinned_day() {
        let mut selector = PresetSelector::new(PresetCatalog::default(), Weekday::Sunday)
            .with_today(date!(2024 - 01 - 17));
        let this_month = selector
            .catalog()
            .position(PresetKind::ThisMonth)
            .expect("this month");
        let (from, to) = selector.resolve_range(this_month).expect("range");
        assert_eq!(from.date(), date!(2024 - 01 - 01));
        assert_eq!(to.date(), date!(2024 - 01 - 31));
        assert_eq!(selector.resolve_range(9), None);

        selector.click(this_month);
        selector.set_selected_index_silently(0);
        assert_eq!(selector.selected_index(), Some(0));
        assert_eq!(
            selector.events().drain(),
            vec![ControlEvent::PresetClicked(this_month)]
        );
    }

    #[test]
    fn selector_ignores_unknown_indices() {
        let mut selector = PresetSelector::new(PresetCatalog::default(), Weekday::Sunday);
        selector.click(42);
        assert_eq!(selector.selected_index(), None);
        assert!(selector.events().is_empty());
    }

    #[test]
    fn shared_queue_keeps_arrival_order() {
        let events = ControlEvents::new();
        let mut from = DateInput::new("from").with_events(events.clone());
        let mut selector =
            PresetSelector::new(PresetCatalog::default(), Weekday::Sunday).with_events(events.clone());

        selector.click(1);
        from.type_text("2024-03-01");
        selector.click(0);
        assert_eq!(
            events.drain(),
            vec![
                ControlEvent::PresetClicked(1),
                ControlEvent::InputEdited {
                    control: "from",
                    text: "2024-03-01".into(),
                },
                ControlEvent::PresetClicked(0),
            ]
        );
        assert!(from.events().is_empty());
    }
}

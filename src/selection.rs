use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};

/// Serialized stand-in for an unset bound or preset.
pub const UNSET: i64 = -1;

/// Position of a preset in the ordered preset catalog.
pub type PresetId = usize;

/// Milliseconds since the Unix epoch, negative for instants before 1970.
/// Any instant the calendar can represent is constructible except the `-1`
/// sentinel, which is reserved for an unset bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Option<Self> {
        if millis == UNSET {
            return None;
        }
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .ok()
            .map(|_| Self(millis))
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    /// Calendar day of this instant in UTC.
    pub fn date(self) -> Date {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000_000)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
            .date()
    }
}

/// The canonical range value owned by the reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RangeSelection {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub preset: Option<PresetId>,
}

impl RangeSelection {
    pub const EMPTY: RangeSelection = RangeSelection {
        from: None,
        to: None,
        preset: None,
    };

    pub fn new(from: Option<Timestamp>, to: Option<Timestamp>, preset: Option<PresetId>) -> Self {
        Self { from, to, preset }
    }

    /// No bound is set. The preset marker alone does not make a filter.
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn bounds_differ(&self, other: &RangeSelection) -> bool {
        self.from != other.from || self.to != other.to
    }

    pub fn to_persisted(&self) -> PersistedRange {
        PersistedRange {
            from: self.from.map_or(UNSET, Timestamp::millis),
            to: self.to.map_or(UNSET, Timestamp::millis),
            radio: self
                .preset
                .and_then(|idx| i64::try_from(idx).ok())
                .unwrap_or(UNSET),
        }
    }

    /// Reads a value from the state store. Every field is checked on its own
    /// and anything that is not a well-formed timestamp or a preset accepted
    /// by `is_known_preset` becomes unset.
    pub fn from_persisted_value(value: &Value, is_known_preset: impl Fn(PresetId) -> bool) -> Self {
        let Some(fields) = value.as_object() else {
            tracing::debug!(%value, "persisted range is not an object, treating as empty");
            return Self::EMPTY;
        };
        let from = parse_bound(fields.get("from"));
        let to = parse_bound(fields.get("to"));
        let preset = parse_preset(fields.get("radio")).filter(|idx| is_known_preset(*idx));
        Self { from, to, preset }
    }
}

/// Wire form kept in the state store: `{ "from": .., "to": .., "radio": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistedRange {
    pub from: i64,
    pub to: i64,
    pub radio: i64,
}

impl Default for PersistedRange {
    fn default() -> Self {
        Self {
            from: UNSET,
            to: UNSET,
            radio: UNSET,
        }
    }
}

impl PersistedRange {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "from": self.from,
            "to": self.to,
            "radio": self.radio,
        })
    }
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_bound(value: Option<&Value>) -> Option<Timestamp> {
    let number = numeric(value)?;
    // Sub-millisecond parts are dropped, like a browser Date would.
    Timestamp::from_millis(number.trunc() as i64)
}

fn parse_preset(value: Option<&Value>) -> Option<PresetId> {
    let number = numeric(value)?;
    if number < 0.0 || number.fract() != 0.0 {
        return None;
    }
    Some(number as PresetId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis).expect("timestamp")
    }

    fn five_presets(idx: PresetId) -> bool {
        idx < 5
    }

    #[test]
    fn malformed_fields_degrade_to_unset() {
        let value = json!({ "from": "not-a-date", "to": -1, "radio": 99 });
        let selection = RangeSelection::from_persisted_value(&value, five_presets);
        assert_eq!(selection, RangeSelection::EMPTY);
    }

    #[test]
    fn string_and_numeric_sentinels_normalize_alike() {
        let strings = json!({ "from": "-1", "to": "-1", "radio": "-1" });
        let numbers = json!({ "from": -1, "to": -1, "radio": -1 });
        assert_eq!(
            RangeSelection::from_persisted_value(&strings, five_presets),
            RangeSelection::from_persisted_value(&numbers, five_presets)
        );
    }

    #[test]
    fn accepts_numeric_strings_and_truncates_fractions() {
        let value = json!({ "from": "1704067200000", "to": 1706659200000.75, "radio": "2" });
        let selection = RangeSelection::from_persisted_value(&value, five_presets);
        assert_eq!(selection.from, Some(ts(1_704_067_200_000)));
        assert_eq!(selection.to, Some(ts(1_706_659_200_000)));
        assert_eq!(selection.preset, Some(2));
    }

    #[test]
    fn rejects_sentinel_huge_and_fractional_values() {
        let value = json!({ "from": "-1.0", "to": 1e20, "radio": 1.5 });
        let selection = RangeSelection::from_persisted_value(&value, five_presets);
        assert_eq!(selection, RangeSelection::EMPTY);
        let value = json!({ "from": 0, "to": 0, "radio": -2 });
        assert_eq!(
            RangeSelection::from_persisted_value(&value, five_presets).preset,
            None
        );
        let value = json!({ "from": null, "to": true, "radio": "" });
        assert_eq!(
            RangeSelection::from_persisted_value(&value, five_presets),
            RangeSelection::EMPTY
        );
    }

    #[test]
    fn keeps_bounds_before_1970() {
        // 1950-01-01T00:00:00Z
        let value = json!({ "from": -631_152_000_000_i64, "to": "-86400000", "radio": -1 });
        let selection = RangeSelection::from_persisted_value(&value, five_presets);
        assert_eq!(selection.from, Some(ts(-631_152_000_000)));
        assert_eq!(selection.to.map(Timestamp::date), Some(time::macros::date!(1969 - 12 - 31)));
        assert_eq!(selection.to_persisted().from, -631_152_000_000);
        assert!(Timestamp::from_millis(UNSET).is_none());
    }

    #[test]
    fn non_object_values_are_empty() {
        let selection = RangeSelection::from_persisted_value(&json!("garbage"), five_presets);
        assert!(selection.is_empty());
    }

    #[test]
    fn persisted_form_uses_sentinel_for_unset_fields() {
        let selection = RangeSelection::new(Some(ts(0)), None, Some(3));
        assert_eq!(
            selection.to_persisted(),
            PersistedRange {
                from: 0,
                to: UNSET,
                radio: 3
            }
        );
        assert_eq!(RangeSelection::EMPTY.to_persisted(), PersistedRange::default());
    }

    #[test]
    fn preset_without_bounds_is_still_empty() {
        let selection = RangeSelection::new(None, None, Some(1));
        assert!(selection.is_empty());
        assert!(!RangeSelection::new(None, Some(ts(10)), None).is_empty());
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use time::{Date, Duration, Weekday};

use crate::selection::PresetId;

/// Quick-select ranges a preset button can stand for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PresetKind {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
}

impl PresetKind {
    pub fn default_caption(self) -> &'static str {
        match self {
            PresetKind::Today => "Today",
            PresetKind::Yesterday => "Yesterday",
            PresetKind::ThisWeek => "This Week",
            PresetKind::LastWeek => "Last Week",
            PresetKind::ThisMonth => "This Month",
            PresetKind::LastMonth => "Last Month",
            PresetKind::ThisYear => "This Year",
        }
    }

    /// First and last calendar day (both inclusive) of the period containing
    /// `today`, with weeks starting on `week_start`.
    pub fn resolve(self, today: Date, week_start: Weekday) -> Option<(Date, Date)> {
        match self {
            PresetKind::Today => Some((today, today)),
            PresetKind::Yesterday => {
                let day = today.previous_day()?;
                Some((day, day))
            }
            PresetKind::ThisWeek => {
                let start = week_start_of(today, week_start)?;
                Some((start, start.checked_add(Duration::days(6))?))
            }
            PresetKind::LastWeek => {
                let start = week_start_of(today, week_start)?.checked_sub(Duration::days(7))?;
                Some((start, start.checked_add(Duration::days(6))?))
            }
            PresetKind::ThisMonth => month_bounds(today),
            PresetKind::LastMonth => {
                let last_month = today.replace_day(1).ok()?.previous_day()?;
                month_bounds(last_month)
            }
            PresetKind::ThisYear => {
                let year = today.year();
                let start = Date::from_ordinal_date(year, 1).ok()?;
                let end = Date::from_ordinal_date(year, time::util::days_in_year(year)).ok()?;
                Some((start, end))
            }
        }
    }
}

fn week_start_of(day: Date, week_start: Weekday) -> Option<Date> {
    let offset = (7 + day.weekday().number_days_from_sunday() - week_start.number_days_from_sunday()) % 7;
    day.checked_sub(Duration::days(i64::from(offset)))
}

fn month_bounds(day: Date) -> Option<(Date, Date)> {
    let start = day.replace_day(1).ok()?;
    let end = day
        .replace_day(time::util::days_in_year_month(day.year(), day.month()))
        .ok()?;
    Some((start, end))
}

/// Calendar convention for the first day of the week: 0 is Sunday, 6 is
/// Saturday.
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    let weekday = match index {
        0 => Weekday::Sunday,
        1 => Weekday::Monday,
        2 => Weekday::Tuesday,
        3 => Weekday::Wednesday,
        4 => Weekday::Thursday,
        5 => Weekday::Friday,
        6 => Weekday::Saturday,
        _ => return None,
    };
    Some(weekday)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub kind: PresetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl PresetEntry {
    pub fn caption(&self) -> &str {
        self.caption
            .as_deref()
            .unwrap_or_else(|| self.kind.default_caption())
    }
}

impl From<PresetKind> for PresetEntry {
    fn from(kind: PresetKind) -> Self {
        Self {
            kind,
            caption: None,
        }
    }
}

/// Ordered list of presets; a [`PresetId`] is an index into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetCatalog {
    entries: Vec<PresetEntry>,
}

impl PresetCatalog {
    pub fn new(entries: Vec<PresetEntry>) -> Self {
        Self { entries }
    }

    pub fn from_kinds(kinds: &[PresetKind]) -> Self {
        Self::new(kinds.iter().copied().map(PresetEntry::from).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_valid(&self, index: PresetId) -> bool {
        index < self.entries.len()
    }

    pub fn get(&self, index: PresetId) -> Option<&PresetEntry> {
        self.entries.get(index)
    }

    pub fn position(&self, kind: PresetKind) -> Option<PresetId> {
        self.entries.iter().position(|entry| entry.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PresetId, &PresetEntry)> {
        self.entries.iter().enumerate()
    }

    pub fn entries(&self) -> &[PresetEntry] {
        &self.entries
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::from_kinds(&[
            PresetKind::Today,
            PresetKind::ThisWeek,
            PresetKind::LastWeek,
            PresetKind::ThisMonth,
        ])
    }
}

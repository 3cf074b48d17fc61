use once_cell::sync::Lazy;
use time::format_description::{self, well_known::Rfc3339, FormatItem};
use time::{Date, OffsetDateTime, Time, UtcOffset};

use crate::selection::Timestamp;

static QUERY_DATE_FORMAT: Lazy<Vec<FormatItem<'static>>> = Lazy::new(|| {
    format_description::parse("[year]-[month]-[day]").expect("valid date format description")
});

/// Calendar-date literal used in filter expressions and as the summary
/// fallback. Always computed in UTC so the output does not depend on the host.
pub fn format_query_date(timestamp: Timestamp) -> String {
    format_date(timestamp.date())
}

pub fn format_date(date: Date) -> String {
    date.format(&*QUERY_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_query_date(input: &str) -> Option<Date> {
    Date::parse(input.trim(), &*QUERY_DATE_FORMAT).ok()
}

/// Parses the text shown by a date input. Accepts the `YYYY-MM-DD` form the
/// inputs display, and an RFC 3339 instant which is cut down to its UTC day
/// so the bound matches what the input shows once re-rendered.
pub fn parse_input_text(input: &str) -> Option<Timestamp> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(date) = parse_query_date(trimmed) {
        return start_of_day(date);
    }
    let instant = OffsetDateTime::parse(trimmed, &Rfc3339).ok()?;
    start_of_day(instant.to_offset(UtcOffset::UTC).date())
}

/// UTC midnight of `date`. Days before 1970 give negative timestamps.
pub fn start_of_day(date: Date) -> Option<Timestamp> {
    let seconds = date.with_time(Time::MIDNIGHT).assume_utc().unix_timestamp();
    Timestamp::from_millis(seconds.checked_mul(1_000)?)
}

pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

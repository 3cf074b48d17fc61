use crate::adapters::AdapterError;
use crate::dates::format_query_date;
use crate::selection::{RangeSelection, Timestamp};

pub const CLAUSE_SEPARATOR: &str = " - ";

/// A bound's label together with whatever its input currently displays.
#[derive(Debug, Clone)]
pub struct BoundText<'a> {
    pub label: &'a str,
    pub displayed: Result<String, AdapterError>,
}

impl<'a> BoundText<'a> {
    pub fn new(label: &'a str, displayed: Result<String, AdapterError>) -> Self {
        Self { label, displayed }
    }
}

/// Human-readable description of `selection` for the breadcrumb, or `None`
/// when the selection is empty.
///
/// Each clause prefers the text the input shows so the breadcrumb matches the
/// control. When that text cannot be read, or is blank because the control
/// has not rendered, the clause falls back to the query date literal.
pub fn summarize(selection: &RangeSelection, from: BoundText<'_>, to: BoundText<'_>) -> Option<String> {
    if selection.is_empty() {
        return None;
    }
    let mut clauses = Vec::with_capacity(2);
    if let Some(timestamp) = selection.from {
        clauses.push(clause(timestamp, from));
    }
    if let Some(timestamp) = selection.to {
        clauses.push(clause(timestamp, to));
    }
    Some(clauses.join(CLAUSE_SEPARATOR))
}

fn clause(timestamp: Timestamp, bound: BoundText<'_>) -> String {
    let value = match bound.displayed {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!(label = bound.label, "input shows no text, summarizing from timestamp");
            format_query_date(timestamp)
        }
        Err(err) => {
            tracing::warn!(%err, label = bound.label, "input unreadable, summarizing from timestamp");
            format_query_date(timestamp)
        }
    };
    format!("{} {}", bound.label, value)
}

use crate::dates::format_query_date;
use crate::selection::RangeSelection;

/// Builds the advanced query expression for `selection`, or `None` when no
/// bound is set. The lower bound is compared against `field_from` and the
/// upper bound against `field_to`, both inclusive.
pub fn compile(selection: &RangeSelection, field_from: &str, field_to: &str) -> Option<String> {
    if selection.is_empty() {
        return None;
    }
    let mut clauses = Vec::with_capacity(2);
    if let Some(from) = selection.from {
        clauses.push(format!("{field_from} >= {}", format_query_date(from)));
    }
    if let Some(to) = selection.to {
        clauses.push(format!("{field_to} <= {}", format_query_date(to)));
    }
    Some(clauses.join(" AND "))
}

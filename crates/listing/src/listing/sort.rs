//! Sort resolution.
//!
//! Requested sort fields are checked against the listing's whitelist; anything
//! else falls back to the default ordering parsed from the entity type's
//! intrinsic ordering expression.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::types::{Sort, SortDirection};

/// Matches `"Field" ASC` / `Field desc` anywhere in an ordering expression.
#[allow(clippy::expect_used)]
static DEFAULT_SORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""?([a-zA-Z_][a-zA-Z0-9_]*)"? ([Aa][Ss][Cc]|[Dd][Ee][Ss][Cc])"#)
        .expect("valid regex literal")
});

/// Parse an intrinsic ordering expression into a default sort.
///
/// An expression without a recognisable direction keyword is taken whole as
/// the field name (quotes trimmed) and sorted descending.
pub fn parse_default_sort(expression: &str) -> Sort {
    if let Some(caps) = DEFAULT_SORT_RE.captures(expression) {
        let direction = if caps[2].eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        return Sort::new(&caps[1], direction);
    }

    Sort::new(expression.trim().trim_matches('"'), SortDirection::Desc)
}

/// Resolve the requested sort against the whitelist.
///
/// A whitelisted field sorts `DESC` only when the requested direction is
/// `desc` in any case, `ASC` otherwise. Any other field yields `default`.
pub fn resolve_sort(
    requested: Option<&str>,
    direction: Option<&str>,
    sortable: &BTreeSet<String>,
    default: &Sort,
) -> Sort {
    match requested {
        Some(field) if sortable.contains(field) => {
            let direction = match direction {
                Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            Sort::new(field, direction)
        }
        _ => default.clone(),
    }
}

/// Direction a column header links to: the column currently sorted
/// ascending toggles to descending, everything else links ascending.
pub fn link_direction(current: &Sort, field: &str) -> SortDirection {
    if current.field == field && current.direction == SortDirection::Asc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    }
}

/// CSS classes for a column header.
pub fn css_classes(current: &Sort, field: &str, sortable: bool) -> String {
    if !sortable {
        return "listing-not-sortable".to_string();
    }

    if current.field == field {
        format!(
            "listing-sortable listing-sorted listing-sort-{}",
            current.direction.as_str().to_ascii_lowercase()
        )
    } else {
        "listing-sortable listing-sort-asc".to_string()
    }
}

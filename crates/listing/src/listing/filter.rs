//! Facet filter kinds.
//!
//! Each facet applies exactly one filter kind to its grouping column. The
//! kind is selected in configuration by a string tag:
//!
//! | tag                  | value format        | condition                 |
//! |----------------------|---------------------|---------------------------|
//! | `exact` (default)    | any                 | equality                  |
//! | `range`              | `lo..hi`, `lo..`, `..hi`, `v` | inclusive range |
//! | `substring`          | any                 | case-insensitive contains |
//! | `custom:starts_with` | any                 | case-insensitive prefix   |
//! | `custom:ends_with`   | any                 | case-insensitive suffix   |
//! | `custom:at_least`    | any                 | `>=`                      |
//! | `custom:at_most`     | any                 | `<=`                      |
//! | `custom:not_equal`   | any                 | `<>`                      |
//! | `custom:any_of`      | `a,b,c`             | `IN (...)`                |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::query::{ColumnRef, Condition};

/// Separator between range bounds.
const RANGE_SEPARATOR: &str = "..";

/// Named predicates available through the `custom:` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomPredicate {
    StartsWith,
    EndsWith,
    AtLeast,
    AtMost,
    NotEqual,
    AnyOf,
}

impl CustomPredicate {
    fn as_str(&self) -> &'static str {
        match self {
            CustomPredicate::StartsWith => "starts_with",
            CustomPredicate::EndsWith => "ends_with",
            CustomPredicate::AtLeast => "at_least",
            CustomPredicate::AtMost => "at_most",
            CustomPredicate::NotEqual => "not_equal",
            CustomPredicate::AnyOf => "any_of",
        }
    }

    fn apply(&self, column: &ColumnRef, value: &str) -> Option<Condition> {
        let column = column.clone();
        let value = value.to_string();
        match self {
            CustomPredicate::StartsWith => Some(Condition::StartsWith(column, value)),
            CustomPredicate::EndsWith => Some(Condition::EndsWith(column, value)),
            CustomPredicate::AtLeast => Some(Condition::Between {
                column,
                min: Some(value),
                max: None,
            }),
            CustomPredicate::AtMost => Some(Condition::Between {
                column,
                min: None,
                max: Some(value),
            }),
            CustomPredicate::NotEqual => Some(Condition::NotEquals(column, value)),
            CustomPredicate::AnyOf => {
                let values: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(Condition::AnyOf(column, values))
                }
            }
        }
    }
}

/// How a facet selection constrains the query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterKind {
    #[default]
    Exact,
    Range,
    Substring,
    Custom(CustomPredicate),
}

impl FilterKind {
    /// Build the condition for a selected value.
    ///
    /// Returns `None` when the value does not constrain anything (blank
    /// input, an empty range or an empty list), which is treated as "any".
    pub fn apply(&self, column: &ColumnRef, value: &str) -> Option<Condition> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        match self {
            FilterKind::Exact => Some(Condition::Equals(column.clone(), value.to_string())),
            FilterKind::Range => {
                let (min, max) = match value.split_once(RANGE_SEPARATOR) {
                    Some((lo, hi)) => (non_blank(lo), non_blank(hi)),
                    None => (Some(value.to_string()), Some(value.to_string())),
                };
                if min.is_none() && max.is_none() {
                    return None;
                }
                Some(Condition::Between {
                    column: column.clone(),
                    min,
                    max,
                })
            }
            FilterKind::Substring => Some(Condition::Contains(column.clone(), value.to_string())),
            FilterKind::Custom(predicate) => predicate.apply(column, value),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Error for unrecognised filter kind tags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter kind '{0}'")]
pub struct UnknownFilterKind(String);

impl FromStr for FilterKind {
    type Err = UnknownFilterKind;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let kind = match tag.trim() {
            "exact" => FilterKind::Exact,
            "range" => FilterKind::Range,
            "substring" => FilterKind::Substring,
            "custom:starts_with" => FilterKind::Custom(CustomPredicate::StartsWith),
            "custom:ends_with" => FilterKind::Custom(CustomPredicate::EndsWith),
            "custom:at_least" => FilterKind::Custom(CustomPredicate::AtLeast),
            "custom:at_most" => FilterKind::Custom(CustomPredicate::AtMost),
            "custom:not_equal" => FilterKind::Custom(CustomPredicate::NotEqual),
            "custom:any_of" => FilterKind::Custom(CustomPredicate::AnyOf),
            other => return Err(UnknownFilterKind(other.to_string())),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for FilterKind {
    type Error = UnknownFilterKind;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Exact => f.write_str("exact"),
            FilterKind::Range => f.write_str("range"),
            FilterKind::Substring => f.write_str("substring"),
            FilterKind::Custom(predicate) => write!(f, "custom:{}", predicate.as_str()),
        }
    }
}

impl From<FilterKind> for String {
    fn from(kind: FilterKind) -> Self {
        kind.to_string()
    }
}

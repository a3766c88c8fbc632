//! Per-item view permission.
//!
//! The listing engine only asks a yes/no question before rendering an item;
//! policy lives behind the [`ItemAccess`] trait. Two gates ship built in and
//! are selected per listing in the definitions file:
//!
//! ```yaml
//! access: { type: public }
//! access: { type: field, field: published, equals: true }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decides whether a loaded item may be shown.
pub trait ItemAccess: Send + Sync {
    fn can_view(&self, item: &Value) -> bool;
}

/// Built-in access gates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessRule {
    /// Every item is visible.
    #[default]
    Public,
    /// Visible only when the item's `field` equals `equals`.
    Field { field: String, equals: Value },
}

impl AccessRule {
    /// Column the gate reads, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            AccessRule::Public => None,
            AccessRule::Field { field, .. } => Some(field),
        }
    }
}

impl ItemAccess for AccessRule {
    fn can_view(&self, item: &Value) -> bool {
        match self {
            AccessRule::Public => true,
            AccessRule::Field { field, equals } => {
                item.get(field).is_some_and(|value| loosely_equal(value, equals))
            }
        }
    }
}

/// Compare JSON values, treating numbers and their string forms as equal so
/// that `equals: 1` matches a column the store returned as `"1"`.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim() == n.to_string()
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            s.trim().eq_ignore_ascii_case(if *b { "true" } else { "false" })
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => false,
    }
}

//! Store-agnostic listing query model.
//!
//! The query builder produces these values; each [`EntityStore`] decides how
//! to execute them (SQL for PostgreSQL, direct evaluation for the in-memory
//! store).
//!
//! [`EntityStore`]: crate::store::EntityStore

use super::types::SortDirection;

/// A column reached through a table alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Table alias (the base table name, or a relation path alias).
    pub table: String,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// A to-one relation join.
///
/// Rendered as `LEFT JOIN table AS alias ON from = alias.to_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Alias for the joined table, derived from the relation path.
    pub alias: String,
    /// Joined table.
    pub table: String,
    /// Foreign key column on the parent side.
    pub from: ColumnRef,
    /// Identifier column on the joined table.
    pub to_column: String,
}

/// A single predicate against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact match.
    Equals(ColumnRef, String),
    /// Not equal.
    NotEquals(ColumnRef, String),
    /// Inclusive range; a missing bound is open.
    Between {
        column: ColumnRef,
        min: Option<String>,
        max: Option<String>,
    },
    /// Case-insensitive substring match.
    Contains(ColumnRef, String),
    /// Case-insensitive prefix match.
    StartsWith(ColumnRef, String),
    /// Case-insensitive suffix match.
    EndsWith(ColumnRef, String),
    /// Value in list.
    AnyOf(ColumnRef, Vec<String>),
    /// Store-native keyword match across several columns.
    TextMatch {
        columns: Vec<ColumnRef>,
        keywords: String,
    },
}

/// Numeric reading of a filter or stored value.
///
/// Only finite numbers count: `NaN`, `inf` and friends stay text.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A condition contributed by one facet.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetConstraint {
    /// Facet name the condition belongs to.
    pub facet: String,
    pub condition: Condition,
}

/// An extra column selected alongside the base row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumn {
    pub column: ColumnRef,
    /// Output key in the result row.
    pub alias: String,
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// LIMIT/OFFSET window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u64,
    pub offset: u64,
}

/// Executable listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    /// Base table; also the alias the base row is bound to.
    pub table: String,
    pub joins: Vec<Join>,
    pub columns: Vec<SelectedColumn>,
    pub constraints: Vec<FacetConstraint>,
    pub text_match: Option<Condition>,
    pub order: Option<Ordering>,
    pub window: Option<PageWindow>,
}

impl ListingQuery {
    /// Start a query against a base table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            joins: Vec::new(),
            columns: Vec::new(),
            constraints: Vec::new(),
            text_match: None,
            order: None,
            window: None,
        }
    }

    /// Add joins, skipping aliases that are already joined.
    pub fn add_joins<'a>(&mut self, joins: impl IntoIterator<Item = &'a Join>) {
        for join in joins {
            if !self.joins.iter().any(|j| j.alias == join.alias) {
                self.joins.push(join.clone());
            }
        }
    }

    /// All WHERE conditions, facet constraints first.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.constraints
            .iter()
            .map(|c| &c.condition)
            .chain(self.text_match.iter())
    }

    /// Whether a facet currently contributes a constraint.
    pub fn has_constraint(&self, facet: &str) -> bool {
        self.constraints.iter().any(|c| c.facet == facet)
    }

    /// Copy of the filter state without the given facet's own constraint,
    /// stripped of ordering, paging and display columns.
    pub fn without_facet(&self, facet: &str) -> Self {
        let mut query = self.filter_only();
        query.constraints.retain(|c| c.facet != facet);
        query
    }

    /// Copy of the filter state, stripped of ordering, paging and display
    /// columns. Used for counting.
    pub fn filter_only(&self) -> Self {
        Self {
            table: self.table.clone(),
            joins: self.joins.clone(),
            columns: Vec::new(),
            constraints: self.constraints.clone(),
            text_match: self.text_match.clone(),
            order: None,
            window: None,
        }
    }
}

/// Grouped count query for a single facet.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetQuery {
    pub facet: String,
    /// Filter state with the facet's own constraint removed.
    pub base: ListingQuery,
    /// Grouping identifier (relation id, or the scalar column itself).
    pub group: ColumnRef,
    /// Display field.
    pub display: ColumnRef,
}

/// One grouped row returned by a facet aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetRow {
    pub count: i64,
    pub id: Option<String>,
    pub title: Option<String>,
}

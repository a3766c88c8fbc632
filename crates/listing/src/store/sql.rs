//! SQL rendering for listing queries using SeaQuery.
//!
//! Renders the store-agnostic query model into PostgreSQL:
//! - LEFT JOINs for relation paths, aliased by path
//! - parameter values escaped by SeaQuery, never spliced raw
//! - filter values compared with the text form of a column, so a value
//!   the column type cannot hold filters rows out instead of failing
//! - keyword match through `to_tsvector @@ plainto_tsquery`
//! - grouped facet counts keyed by the grouping identifier

use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, Func, JoinType, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr,
};

use crate::listing::query::{ColumnRef, Condition, FacetQuery, ListingQuery, parse_number};
use crate::listing::types::SortDirection;

/// Text search configuration used for keyword matching.
const TEXT_SEARCH_CONFIG: &str = "simple";

/// POSIX pattern for text that PostgreSQL's `numeric` accepts.
const NUMERIC_PATTERN: &str =
    "^[[:space:]]*[-+]?([0-9]+([.][0-9]*)?|[.][0-9]+)([eE][-+]?[0-9]+)?[[:space:]]*$";

/// Build the page SELECT: every base column plus relation columns under
/// their field path, filtered, ordered and windowed.
pub fn select_page(query: &ListingQuery) -> String {
    let mut select = base_select(query);
    add_columns(&mut select, query);
    add_conditions(&mut select, query);

    if let Some(order) = &query.order {
        select.order_by(
            (Alias::new(&order.column.table), Alias::new(&order.column.column)),
            match order.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            },
        );
    }

    if let Some(window) = query.window {
        select.limit(window.limit);
        select.offset(window.offset);
    }

    select.to_string(PostgresQueryBuilder)
}

/// Build a COUNT query over the same filters.
pub fn select_count(query: &ListingQuery) -> String {
    let mut select = base_select(query);
    select.expr(Expr::col(Asterisk).count());
    add_conditions(&mut select, query);

    select.to_string(PostgresQueryBuilder)
}

/// Build the grouped count query for one facet.
///
/// Grouping and display values are cast to text so every backend column
/// type maps onto the same row shape.
pub fn select_facet(query: &FacetQuery) -> String {
    let group = column_expr(&query.group);
    let display = column_expr(&query.display);

    let mut select = base_select(&query.base);
    select
        .expr_as(Expr::col(Asterisk).count(), Alias::new("count"))
        .expr_as(
            Func::cast_as(group.clone(), Alias::new("text")),
            Alias::new("id"),
        )
        .expr_as(
            Func::cast_as(display.clone(), Alias::new("text")),
            Alias::new("title"),
        );
    add_conditions(&mut select, &query.base);

    select
        .add_group_by([display.clone(), group.clone()])
        .order_by_expr(display, Order::Asc)
        .order_by_expr(group, Order::Asc);

    select.to_string(PostgresQueryBuilder)
}

/// Build a single-row lookup by identifier with the page's columns.
pub fn select_item(query: &ListingQuery, id_column: &ColumnRef, id: i64) -> String {
    let mut select = base_select(query);
    add_columns(&mut select, query);
    select.and_where(column_expr(id_column).eq(id));
    select.limit(1);

    select.to_string(PostgresQueryBuilder)
}

/// FROM and JOIN clauses shared by every statement.
fn base_select(query: &ListingQuery) -> SelectStatement {
    let mut select = Query::select();
    select.from(Alias::new(&query.table));

    for join in &query.joins {
        let on = Expr::col((Alias::new(&join.from.table), Alias::new(&join.from.column)))
            .equals((Alias::new(&join.alias), Alias::new(&join.to_column)));
        select.join_as(
            JoinType::LeftJoin,
            Alias::new(&join.table),
            Alias::new(&join.alias),
            on,
        );
    }

    select
}

fn add_columns(select: &mut SelectStatement, query: &ListingQuery) {
    select.column((Alias::new(&query.table), Asterisk));
    for column in &query.columns {
        select.expr_as(column_expr(&column.column), Alias::new(&column.alias));
    }
}

fn add_conditions(select: &mut SelectStatement, query: &ListingQuery) {
    let mut all = Cond::all();
    for condition in query.conditions() {
        if let Some(expr) = condition_expr(condition) {
            all = all.add(expr);
        }
    }
    if !all.is_empty() {
        select.cond_where(all);
    }
}

fn column_expr(column: &ColumnRef) -> SimpleExpr {
    Expr::col((Alias::new(&column.table), Alias::new(&column.column))).into()
}

/// Text form of a column, the same form facet values are read in.
fn text_expr(column: &ColumnRef) -> SimpleExpr {
    Func::cast_as(column_expr(column), Alias::new("text")).into()
}

/// Case-folded text form of a column, for pattern matching.
fn folded_text(column: &ColumnRef) -> SimpleExpr {
    Func::lower(text_expr(column)).into()
}

/// One side of a range.
///
/// Numeric bounds compare numerically against rows whose text form is a
/// number and as text against the rest; any other bound compares as
/// text. The column is never compared with a raw literal, so the column
/// type cannot reject the request value.
fn bound_expr(column: &ColumnRef, operator: &str, bound: &str) -> SimpleExpr {
    // Identifiers were validated at startup; the bound is bound
    let text = format!("CAST(\"{}\".\"{}\" AS text)", column.table, column.column);
    let bound = bound.trim();
    if parse_number(bound).is_some() {
        Expr::cust_with_values(
            format!(
                "CASE WHEN {text} ~ $1 THEN CAST({text} AS numeric) {operator} CAST($2 AS numeric) ELSE {text} {operator} $2 END"
            ),
            [NUMERIC_PATTERN, bound],
        )
    } else {
        Expr::cust_with_values(format!("{text} {operator} $1"), [bound])
    }
}

/// Build a single WHERE condition.
fn condition_expr(condition: &Condition) -> Option<SimpleExpr> {
    match condition {
        Condition::Equals(column, value) => Some(text_expr(column).eq(value.as_str())),
        Condition::NotEquals(column, value) => Some(text_expr(column).ne(value.as_str())),
        Condition::Between { column, min, max } => {
            let mut cond = Cond::all();
            if let Some(min) = min {
                cond = cond.add(bound_expr(column, ">=", min));
            }
            if let Some(max) = max {
                cond = cond.add(bound_expr(column, "<=", max));
            }
            if cond.is_empty() {
                return None;
            }
            Some(cond.into())
        }
        Condition::Contains(column, value) => Some(folded_text(column).like(format!(
            "%{}%",
            escape_like_wildcards(&value.to_lowercase())
        ))),
        Condition::StartsWith(column, value) => Some(
            folded_text(column)
                .like(format!("{}%", escape_like_wildcards(&value.to_lowercase()))),
        ),
        Condition::EndsWith(column, value) => Some(
            folded_text(column)
                .like(format!("%{}", escape_like_wildcards(&value.to_lowercase()))),
        ),
        Condition::AnyOf(column, values) => {
            if values.is_empty() {
                return None;
            }
            Some(text_expr(column).is_in(values.iter().map(String::as_str)))
        }
        Condition::TextMatch { columns, keywords } => {
            if columns.is_empty() || keywords.trim().is_empty() {
                return None;
            }
            let document = columns
                .iter()
                .map(|c| format!("\"{}\".\"{}\"", c.table, c.column))
                .collect::<Vec<_>>()
                .join(", ");
            // Identifiers were validated at startup; the keywords are bound
            Some(Expr::cust_with_values(
                format!(
                    "to_tsvector('{TEXT_SEARCH_CONFIG}', concat_ws(' ', {document})) @@ plainto_tsquery('{TEXT_SEARCH_CONFIG}', $1)"
                ),
                [keywords.trim()],
            ))
        }
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::query::{FacetConstraint, Join, Ordering, PageWindow, SelectedColumn};

    fn maker_join() -> Join {
        Join {
            alias: "maker".to_string(),
            table: "makers".to_string(),
            from: ColumnRef::new("products", "maker_id"),
            to_column: "id".to_string(),
        }
    }

    fn constrained(condition: Condition) -> ListingQuery {
        let mut query = ListingQuery::new("products");
        query.constraints.push(FacetConstraint {
            facet: "f".to_string(),
            condition,
        });
        query
    }

    #[test]
    fn page_query_selects_relation_columns() {
        let mut query = ListingQuery::new("products");
        query.add_joins(&[maker_join()]);
        query.columns.push(SelectedColumn {
            column: ColumnRef::new("maker", "name"),
            alias: "maker.name".to_string(),
        });
        query.order = Some(Ordering {
            column: ColumnRef::new("products", "price"),
            direction: SortDirection::Desc,
        });
        query.window = Some(PageWindow {
            limit: 20,
            offset: 40,
        });

        let sql = select_page(&query);

        assert!(sql.contains("\"products\".*"), "{sql}");
        assert!(sql.contains("\"maker\".\"name\" AS \"maker.name\""), "{sql}");
        assert!(
            sql.contains(
                "LEFT JOIN \"makers\" AS \"maker\" ON \"products\".\"maker_id\" = \"maker\".\"id\""
            ),
            "{sql}"
        );
        assert!(sql.contains("ORDER BY \"products\".\"price\" DESC"), "{sql}");
        assert!(sql.contains("LIMIT 20"), "{sql}");
        assert!(sql.contains("OFFSET 40"), "{sql}");
    }

    #[test]
    fn count_query_has_no_order_or_limit() {
        let mut query = constrained(Condition::Equals(
            ColumnRef::new("products", "color"),
            "Blue".to_string(),
        ));
        query.window = Some(PageWindow {
            limit: 10,
            offset: 0,
        });

        let sql = select_count(&query.filter_only());

        assert!(sql.contains("COUNT(*)"), "{sql}");
        assert!(
            sql.contains("CAST(\"products\".\"color\" AS text) = 'Blue'"),
            "{sql}"
        );
        assert!(!sql.contains("LIMIT"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
    }

    #[test]
    fn facet_query_groups_by_identifier_and_display() {
        let mut base = ListingQuery::new("products");
        base.add_joins(&[maker_join()]);
        let query = FacetQuery {
            facet: "maker.name".to_string(),
            base,
            group: ColumnRef::new("maker", "id"),
            display: ColumnRef::new("maker", "name"),
        };

        let sql = select_facet(&query);

        assert!(sql.contains("COUNT(*) AS \"count\""), "{sql}");
        assert!(sql.contains("CAST(\"maker\".\"id\" AS text) AS \"id\""), "{sql}");
        assert!(sql.contains("CAST(\"maker\".\"name\" AS text) AS \"title\""), "{sql}");
        assert!(
            sql.contains("GROUP BY \"maker\".\"name\", \"maker\".\"id\""),
            "{sql}"
        );
        assert!(
            sql.contains("ORDER BY \"maker\".\"name\" ASC, \"maker\".\"id\" ASC"),
            "{sql}"
        );
    }

    #[test]
    fn range_renders_inclusive_bounds() {
        let sql = select_count(&constrained(Condition::Between {
            column: ColumnRef::new("products", "price"),
            min: Some("10".to_string()),
            max: None,
        }));
        assert!(
            sql.contains(
                "THEN CAST(CAST(\"products\".\"price\" AS text) AS numeric) >= CAST('10' AS numeric) ELSE CAST(\"products\".\"price\" AS text) >= '10' END"
            ),
            "{sql}"
        );
        assert!(sql.contains("~ '^[[:space:]]*"), "{sql}");
        assert!(!sql.contains("<="), "{sql}");
    }

    #[test]
    fn values_never_meet_typed_columns_raw() {
        let equals = select_count(&constrained(Condition::Equals(
            ColumnRef::new("maker", "id"),
            "abc".to_string(),
        )));
        assert!(
            equals.contains("CAST(\"maker\".\"id\" AS text) = 'abc'"),
            "{equals}"
        );
        assert!(!equals.contains("\"maker\".\"id\" = 'abc'"), "{equals}");

        let not_equal = select_count(&constrained(Condition::NotEquals(
            ColumnRef::new("maker", "id"),
            "abc".to_string(),
        )));
        assert!(
            not_equal.contains("CAST(\"maker\".\"id\" AS text) <> 'abc'"),
            "{not_equal}"
        );

        let at_least = select_count(&constrained(Condition::Between {
            column: ColumnRef::new("products", "price"),
            min: Some("cheap".to_string()),
            max: Some("NaN".to_string()),
        }));
        assert!(
            at_least.contains("CAST(\"products\".\"price\" AS text) >= 'cheap'"),
            "{at_least}"
        );
        assert!(
            at_least.contains("CAST(\"products\".\"price\" AS text) <= 'NaN'"),
            "{at_least}"
        );
        assert!(!at_least.contains("numeric"), "{at_least}");
        assert!(!at_least.contains("\"price\" >= 'cheap'"), "{at_least}");
    }

    #[test]
    fn any_of_renders_in_list() {
        let sql = select_count(&constrained(Condition::AnyOf(
            ColumnRef::new("products", "size"),
            vec!["S".to_string(), "M".to_string()],
        )));
        assert!(
            sql.contains("CAST(\"products\".\"size\" AS text) IN ('S', 'M')"),
            "{sql}"
        );
    }

    #[test]
    fn substring_is_case_insensitive() {
        let sql = select_count(&constrained(Condition::Contains(
            ColumnRef::new("products", "name"),
            "Lamp".to_string(),
        )));
        assert!(
            sql.contains("LOWER(CAST(\"products\".\"name\" AS text)) LIKE '%lamp%'"),
            "{sql}"
        );
    }

    #[test]
    fn like_wildcards_escaped() {
        let sql = select_count(&constrained(Condition::Contains(
            ColumnRef::new("products", "name"),
            "100%_done".to_string(),
        )));
        assert!(
            sql.contains("100\\\\%\\\\_done") || sql.contains("100\\%\\_done"),
            "LIKE wildcards should be escaped: {sql}"
        );
        assert!(!sql.contains("%100%_done%"), "{sql}");
    }

    #[test]
    fn keywords_are_escaped_not_spliced() {
        let mut query = ListingQuery::new("products");
        query.text_match = Some(Condition::TextMatch {
            columns: vec![
                ColumnRef::new("products", "name"),
                ColumnRef::new("products", "description"),
            ],
            keywords: "lamp'; DROP TABLE products; --".to_string(),
        });

        let sql = select_count(&query);

        assert!(
            sql.contains(
                "to_tsvector('simple', concat_ws(' ', \"products\".\"name\", \"products\".\"description\"))"
            ),
            "{sql}"
        );
        assert!(sql.contains("plainto_tsquery('simple', "), "{sql}");
        assert!(
            sql.contains("lamp''; DROP TABLE") || sql.contains("lamp\\'; DROP TABLE"),
            "quote must be escaped: {sql}"
        );
    }

    #[test]
    fn item_lookup_by_id() {
        let sql = select_item(
            &ListingQuery::new("products"),
            &ColumnRef::new("products", "id"),
            42,
        );
        assert!(sql.contains("WHERE \"products\".\"id\" = 42"), "{sql}");
        assert!(sql.contains("LIMIT 1"), "{sql}");
    }

    #[test]
    fn escape_like_wildcards_function() {
        assert_eq!(escape_like_wildcards("hello"), "hello");
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }
}

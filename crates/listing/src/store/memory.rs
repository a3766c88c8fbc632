//! In-process entity store.
//!
//! Holds records per table as JSON objects and evaluates listing queries
//! directly, following the same semantics as the SQL rendering: LEFT JOIN
//! binding, NULL never matching a comparison, nulls sorting last when
//! ascending, and whole-word keyword matching with every term required.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::EntityStore;
use crate::listing::query::{
    ColumnRef, Condition, FacetQuery, FacetRow, ListingQuery, parse_number,
};
use crate::listing::types::SortDirection;

type Record = Map<String, Value>;

/// Alias → bound row for one candidate result. `None` is an unmatched
/// LEFT JOIN.
type Bindings<'a> = HashMap<&'a str, Option<&'a Record>>;

/// Entity store backed by in-memory records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records from a YAML (or JSON) document mapping table names to
    /// lists of records.
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let tables: BTreeMap<String, Vec<Record>> =
            serde_yml::from_str(content).context("invalid seed document")?;
        let mut store = Self::new();
        for (table, records) in tables {
            store.tables.entry(table).or_default().extend(records);
        }
        Ok(store)
    }

    /// Load records from a seed file.
    pub fn from_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("failed to load seed file {}", path.display()))
    }

    /// Add one record. Non-object values are ignored.
    pub fn insert(&mut self, table: impl Into<String>, record: Value) {
        if let Value::Object(record) = record {
            self.tables.entry(table.into()).or_default().push(record);
        }
    }

    /// Number of records in a table.
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }

    fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }

    /// Bind every base row and its joins, in base-table order.
    fn bind<'a>(&'a self, query: &'a ListingQuery) -> Vec<Bindings<'a>> {
        self.rows(&query.table)
            .iter()
            .map(|row| {
                let mut bindings: Bindings<'a> = HashMap::new();
                bindings.insert(query.table.as_str(), Some(row));
                for join in &query.joins {
                    let target = lookup(&bindings, &join.from).and_then(|key| {
                        self.rows(&join.table).iter().find(|candidate| {
                            candidate
                                .get(&join.to_column)
                                .is_some_and(|id| loosely_equal(id, key))
                        })
                    });
                    bindings.insert(join.alias.as_str(), target);
                }
                bindings
            })
            .collect()
    }

    /// Bound rows passing every condition.
    fn matching<'a>(&'a self, query: &'a ListingQuery) -> Vec<Bindings<'a>> {
        self.bind(query)
            .into_iter()
            .filter(|bindings| query.conditions().all(|c| evaluate(bindings, c)))
            .collect()
    }

    fn project(query: &ListingQuery, bindings: &Bindings<'_>) -> Value {
        let mut row = bindings
            .get(query.table.as_str())
            .copied()
            .flatten()
            .cloned()
            .unwrap_or_default();
        for column in &query.columns {
            let value = lookup(bindings, &column.column).cloned().unwrap_or(Value::Null);
            row.insert(column.alias.clone(), value);
        }
        Value::Object(row)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch_page(&self, query: &ListingQuery) -> anyhow::Result<Vec<Value>> {
        let mut rows = self.matching(query);

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_nullable(lookup(a, &order.column), lookup(b, &order.column));
                match order.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let (offset, limit) = match query.window {
            Some(window) => (
                usize::try_from(window.offset).unwrap_or(usize::MAX),
                usize::try_from(window.limit).unwrap_or(usize::MAX),
            ),
            None => (0, usize::MAX),
        };

        Ok(rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|bindings| Self::project(query, bindings))
            .collect())
    }

    async fn count(&self, query: &ListingQuery) -> anyhow::Result<u64> {
        Ok(self.matching(query).len() as u64)
    }

    async fn aggregate(&self, query: &FacetQuery) -> anyhow::Result<Vec<FacetRow>> {
        struct Group<'a> {
            display: Option<&'a Value>,
            group: Option<&'a Value>,
            row: FacetRow,
        }

        let mut groups: Vec<Group<'_>> = Vec::new();
        for bindings in self.matching(&query.base) {
            let group = lookup(&bindings, &query.group);
            let display = lookup(&bindings, &query.display);
            let id = group.and_then(scalar_text);
            let title = display.and_then(scalar_text);

            match groups
                .iter_mut()
                .find(|g| g.row.id == id && g.row.title == title)
            {
                Some(existing) => existing.row.count += 1,
                None => groups.push(Group {
                    display,
                    group,
                    row: FacetRow {
                        count: 1,
                        id,
                        title,
                    },
                }),
            }
        }

        groups.sort_by(|a, b| {
            compare_nullable(a.display, b.display).then_with(|| compare_nullable(a.group, b.group))
        });
        Ok(groups.into_iter().map(|g| g.row).collect())
    }

    async fn find_by_id(
        &self,
        query: &ListingQuery,
        id_column: &ColumnRef,
        id: i64,
    ) -> anyhow::Result<Option<Value>> {
        let id = Value::from(id);
        Ok(self
            .bind(query)
            .iter()
            .find(|bindings| lookup(bindings, id_column).is_some_and(|v| loosely_equal(v, &id)))
            .map(|bindings| Self::project(query, bindings)))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Value of a column in the bound rows; SQL NULL and unbound joins are `None`.
fn lookup<'a>(bindings: &Bindings<'a>, column: &ColumnRef) -> Option<&'a Value> {
    bindings
        .get(column.table.as_str())
        .copied()
        .flatten()
        .and_then(|row| row.get(&column.column))
        .filter(|v| !v.is_null())
}

fn evaluate(bindings: &Bindings<'_>, condition: &Condition) -> bool {
    match condition {
        Condition::Equals(column, expected) => {
            lookup(bindings, column).is_some_and(|v| text_equal(v, expected))
        }
        Condition::NotEquals(column, expected) => {
            lookup(bindings, column).is_some_and(|v| !text_equal(v, expected))
        }
        Condition::Between { column, min, max } => lookup(bindings, column).is_some_and(|v| {
            min.as_deref()
                .is_none_or(|min| compare_text(v, min) != CmpOrdering::Less)
                && max
                    .as_deref()
                    .is_none_or(|max| compare_text(v, max) != CmpOrdering::Greater)
        }),
        Condition::Contains(column, needle) => folded(bindings, column)
            .is_some_and(|text| text.contains(&needle.to_lowercase())),
        Condition::StartsWith(column, prefix) => folded(bindings, column)
            .is_some_and(|text| text.starts_with(&prefix.to_lowercase())),
        Condition::EndsWith(column, suffix) => folded(bindings, column)
            .is_some_and(|text| text.ends_with(&suffix.to_lowercase())),
        Condition::AnyOf(column, values) => {
            lookup(bindings, column).is_some_and(|v| values.iter().any(|e| text_equal(v, e)))
        }
        Condition::TextMatch { columns, keywords } => {
            let document: Vec<String> = columns
                .iter()
                .filter_map(|c| folded(bindings, c))
                .flat_map(|text| words(&text))
                .collect();
            let terms = words(&keywords.to_lowercase());
            !terms.is_empty() && terms.iter().all(|term| document.contains(term))
        }
    }
}

fn folded(bindings: &Bindings<'_>, column: &ColumnRef) -> Option<String> {
    lookup(bindings, column)
        .and_then(scalar_text)
        .map(|text| text.to_lowercase())
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text form of a scalar, as `CAST(x AS text)` would produce it.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Compare a stored value with request text: numerically when both sides
/// are numbers, as text otherwise.
fn compare_text(value: &Value, other: &str) -> CmpOrdering {
    if let (Some(a), Some(b)) = (as_number(value), parse_number(other)) {
        return a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal);
    }
    scalar_text(value)
        .unwrap_or_default()
        .as_str()
        .cmp(other)
}

fn text_equal(value: &Value, other: &str) -> bool {
    compare_text(value, other) == CmpOrdering::Equal
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => scalar_text(a) == scalar_text(b),
    }
}

/// Order two column values with nulls last.
fn compare_nullable(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Greater,
        (Some(_), None) => CmpOrdering::Less,
        (Some(a), Some(b)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal),
            _ => scalar_text(a).cmp(&scalar_text(b)),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::listing::query::{FacetConstraint, Join, Ordering, PageWindow, SelectedColumn};
    use serde_json::json;

    const SEED: &str = r#"
products:
  - { id: 1, name: Desk lamp, color: Blue, price: 30, maker_id: 1 }
  - { id: 2, name: Floor lamp, color: Blue, price: 120, maker_id: 2 }
  - { id: 3, name: Chair, color: Red, price: 80, maker_id: 1 }
  - { id: 4, name: Stool, color: null, price: 15, maker_id: 9 }
makers:
  - { id: 1, name: Acme }
  - { id: 2, name: Lumen }
"#;

    fn store() -> MemoryStore {
        MemoryStore::from_yaml_str(SEED).unwrap()
    }

    fn maker_join() -> Join {
        Join {
            alias: "maker".to_string(),
            table: "makers".to_string(),
            from: ColumnRef::new("products", "maker_id"),
            to_column: "id".to_string(),
        }
    }

    fn col(name: &str) -> ColumnRef {
        ColumnRef::new("products", name)
    }

    fn filtered(condition: Condition) -> ListingQuery {
        let mut query = ListingQuery::new("products");
        query.constraints.push(FacetConstraint {
            facet: "f".to_string(),
            condition,
        });
        query
    }

    fn ids(rows: &[Value]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[tokio::test]
    async fn left_join_keeps_unmatched_rows() {
        let mut query = ListingQuery::new("products");
        query.add_joins(&[maker_join()]);
        query.columns.push(SelectedColumn {
            column: ColumnRef::new("maker", "name"),
            alias: "maker.name".to_string(),
        });

        let rows = store().fetch_page(&query).await.unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["maker.name"], json!("Acme"));
        assert_eq!(rows[3]["maker.name"], Value::Null);
    }

    #[tokio::test]
    async fn ordering_puts_nulls_last_and_windows() {
        let mut query = ListingQuery::new("products");
        query.order = Some(Ordering {
            column: col("color"),
            direction: SortDirection::Asc,
        });
        let rows = store().fetch_page(&query).await.unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3, 4]);

        query.order = Some(Ordering {
            column: col("price"),
            direction: SortDirection::Desc,
        });
        query.window = Some(PageWindow {
            limit: 2,
            offset: 1,
        });
        let rows = store().fetch_page(&query).await.unwrap();
        assert_eq!(ids(&rows), vec![3, 1]);
    }

    #[tokio::test]
    async fn offset_past_end_is_empty() {
        let mut query = ListingQuery::new("products");
        query.window = Some(PageWindow {
            limit: 10,
            offset: 100,
        });
        assert!(store().fetch_page(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conditions_follow_sql_semantics() {
        let store = store();

        let blue = filtered(Condition::Equals(col("color"), "Blue".to_string()));
        assert_eq!(store.count(&blue).await.unwrap(), 2);

        let not_blue = filtered(Condition::NotEquals(col("color"), "Blue".to_string()));
        assert_eq!(store.count(&not_blue).await.unwrap(), 1, "NULL never matches");

        let range = filtered(Condition::Between {
            column: col("price"),
            min: Some("30".to_string()),
            max: Some("100".to_string()),
        });
        assert_eq!(store.count(&range).await.unwrap(), 2);

        let lamps = filtered(Condition::Contains(col("name"), "LAMP".to_string()));
        assert_eq!(store.count(&lamps).await.unwrap(), 2);

        let any = filtered(Condition::AnyOf(
            col("id"),
            vec!["1".to_string(), "4".to_string()],
        ));
        assert_eq!(store.count(&any).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn non_finite_spellings_compare_as_text() {
        let mut store = MemoryStore::new();
        store.insert("products", json!({ "id": 1, "color": "NaN", "price": "inf" }));
        store.insert("products", json!({ "id": 2, "color": "5", "price": 5 }));

        let five = filtered(Condition::Equals(col("color"), "5".to_string()));
        assert_eq!(ids(&store.fetch_page(&five).await.unwrap()), vec![2]);

        let nan = filtered(Condition::Equals(col("color"), "NaN".to_string()));
        assert_eq!(ids(&store.fetch_page(&nan).await.unwrap()), vec![1]);

        let up_to_ten = filtered(Condition::Between {
            column: col("price"),
            min: None,
            max: Some("10".to_string()),
        });
        assert_eq!(ids(&store.fetch_page(&up_to_ten).await.unwrap()), vec![2]);
    }

    #[tokio::test]
    async fn text_match_requires_every_word() {
        let store = store();
        let mut query = ListingQuery::new("products");
        query.text_match = Some(Condition::TextMatch {
            columns: vec![col("name"), col("color")],
            keywords: "lamp blue".to_string(),
        });
        assert_eq!(store.count(&query).await.unwrap(), 2);

        query.text_match = Some(Condition::TextMatch {
            columns: vec![col("name")],
            keywords: "lam".to_string(),
        });
        assert_eq!(store.count(&query).await.unwrap(), 0, "whole words only");
    }

    #[tokio::test]
    async fn aggregate_groups_by_identifier() {
        let mut base = ListingQuery::new("products");
        base.add_joins(&[maker_join()]);
        let query = FacetQuery {
            facet: "maker.name".to_string(),
            base,
            group: ColumnRef::new("maker", "id"),
            display: ColumnRef::new("maker", "name"),
        };

        let rows = store().aggregate(&query).await.unwrap();

        assert_eq!(
            rows,
            vec![
                FacetRow {
                    count: 2,
                    id: Some("1".to_string()),
                    title: Some("Acme".to_string()),
                },
                FacetRow {
                    count: 1,
                    id: Some("2".to_string()),
                    title: Some("Lumen".to_string()),
                },
                FacetRow {
                    count: 1,
                    id: None,
                    title: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn find_by_id_matches_loosely() {
        let store = store();
        let query = ListingQuery::new("products");

        let item = store.find_by_id(&query, &col("id"), 3).await.unwrap();
        assert_eq!(item.unwrap()["name"], json!("Chair"));
        assert!(store.find_by_id(&query, &col("id"), 99).await.unwrap().is_none());
    }

    #[test]
    fn insert_ignores_non_objects() {
        let mut store = MemoryStore::new();
        store.insert("tags", json!({"id": 1}));
        store.insert("tags", json!(42));
        assert_eq!(store.len("tags"), 1);
        assert_eq!(store.len("missing"), 0);
    }
}

//! Faceted listing test utilities.
//!
//! Record builders and a small shirt catalogue used by the integration
//! tests: entity and listing definitions plus a matching seed document.

use serde_json::{Map, Value as JsonValue, json};

/// Create a test record with an id and a name.
pub fn test_record(id: i64, name: &str) -> TestRecord {
    let mut fields = Map::new();
    fields.insert("id".to_string(), json!(id));
    fields.insert("name".to_string(), json!(name));
    TestRecord { fields }
}

/// A test record builder for creating seed rows.
#[derive(Debug, Clone)]
pub struct TestRecord {
    pub fields: Map<String, JsonValue>,
}

impl TestRecord {
    /// Add a single field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Add a text field.
    pub fn with_text(self, name: &str, value: &str) -> Self {
        self.with_field(name, json!(value))
    }

    /// Point a foreign key at a related record.
    pub fn related_to(self, foreign_key: &str, id: i64) -> Self {
        self.with_field(foreign_key, json!(id))
    }

    /// Set as published.
    pub fn published(self) -> Self {
        self.with_field("published", json!(true))
    }

    /// Set as unpublished.
    pub fn unpublished(self) -> Self {
        self.with_field("published", json!(false))
    }

    /// Finish the record.
    pub fn build(self) -> JsonValue {
        JsonValue::Object(self.fields)
    }
}

/// Build a seed document from (table, records) pairs.
///
/// The result is JSON text, which the YAML seed loader also accepts.
pub fn seed_document(tables: &[(&str, Vec<TestRecord>)]) -> String {
    let document: Map<String, JsonValue> = tables
        .iter()
        .map(|(table, records)| {
            (
                table.to_string(),
                JsonValue::Array(records.iter().cloned().map(TestRecord::build).collect()),
            )
        })
        .collect();
    JsonValue::Object(document).to_string()
}

/// Entity and listing definitions for the shirt catalogue.
///
/// The `shirts` listing shows only published shirts on item pages, facets
/// on color, size and maker, and searches name and color.
pub const CATALOGUE_DEFINITIONS: &str = r#"
entities:
  maker:
    table: makers
    title_field: name
    fields: [country]
  shirt:
    table: shirts
    title_field: name
    default_sort: '"name" ASC'
    fields: [color, size, price, published, maker_id]
    relations:
      maker: { entity: maker, foreign_key: maker_id }
listings:
  - id: shirts
    item_type: shirt
    listing_fields:
      - { field: name, title: Name }
      - { field: color, title: Colour }
      - { field: size, title: Size }
      - { field: price, title: Price }
      - { field: maker.name, title: Maker }
    sortable_fields: [name, price, maker.name]
    facetable_fields:
      - { field: color, title: Color }
      - { field: size, title: Size }
      - { field: maker.name, title: Maker }
    fulltext_fields: [name, color]
    allowed_page_sizes: [1, 2, 20, 50]
    default_page_size: 20
    access: { type: field, field: published, equals: true }
  - id: makers
    item_type: maker
    sortable_fields: [name]
"#;

/// Makers of the catalogue.
pub fn catalogue_makers() -> Vec<TestRecord> {
    vec![
        test_record(1, "Acme").with_text("country", "UK"),
        test_record(2, "Bolt").with_text("country", "US"),
    ]
}

/// Shirts of the catalogue: two Blue and one Red; the Red one is
/// unpublished.
pub fn catalogue_shirts() -> Vec<TestRecord> {
    vec![
        test_record(1, "Oxford")
            .with_text("color", "Blue")
            .with_text("size", "M")
            .with_field("price", json!(25))
            .related_to("maker_id", 1)
            .published(),
        test_record(2, "Polo")
            .with_text("color", "Blue")
            .with_text("size", "L")
            .with_field("price", json!(30))
            .related_to("maker_id", 2)
            .published(),
        test_record(3, "Henley")
            .with_text("color", "Red")
            .with_text("size", "M")
            .with_field("price", json!(20))
            .related_to("maker_id", 1)
            .unpublished(),
    ]
}

/// Seed document for the catalogue.
pub fn catalogue_seed() -> String {
    seed_document(&[
        ("makers", catalogue_makers()),
        ("shirts", catalogue_shirts()),
    ])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn record_builder_sets_fields() {
        let record = test_record(7, "Oxford")
            .with_text("color", "Blue")
            .related_to("maker_id", 2)
            .unpublished()
            .build();

        assert_eq!(record["id"], 7);
        assert_eq!(record["color"], "Blue");
        assert_eq!(record["maker_id"], 2);
        assert_eq!(record["published"], false);
    }

    #[test]
    fn catalogue_seed_is_json() {
        let seed: JsonValue = serde_json::from_str(&catalogue_seed()).unwrap();
        assert_eq!(seed["shirts"].as_array().unwrap().len(), 3);
        assert_eq!(seed["makers"].as_array().unwrap().len(), 2);
    }
}

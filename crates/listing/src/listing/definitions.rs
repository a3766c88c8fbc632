//! Listing definitions.
//!
//! Entities and listings are declared in a YAML file and resolved once at
//! startup into immutable [`Listing`]s. Every field reference is checked
//! against the entity schema here, so request handling never meets an
//! unknown field.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::filter::FilterKind;
use super::schema::{EntitySchema, ResolvedField, SchemaRegistry};
use super::sort::parse_default_sort;
use super::types::Sort;
use crate::access::AccessRule;
use crate::error::ConfigError;

/// Page sizes offered when a listing does not declare its own.
pub const DEFAULT_ALLOWED_PAGE_SIZES: [u32; 4] = [10, 20, 50, 100];

/// Page size used when a request does not ask for an allowed one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Root of the definitions file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingDefinitions {
    #[serde(default)]
    pub entities: BTreeMap<String, EntitySchema>,
    #[serde(default)]
    pub listings: Vec<ListingDefinition>,
}

/// A field paired with its display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitledField {
    pub field: String,
    pub title: String,
}

/// One listing as declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDefinition {
    pub id: String,
    pub item_type: String,
    /// Page heading; defaults to the entity's plural name.
    #[serde(default)]
    pub title: Option<String>,
    /// Table columns. Defaults to the entity's title field.
    #[serde(default)]
    pub listing_fields: Vec<TitledField>,
    #[serde(default)]
    pub sortable_fields: Vec<String>,
    #[serde(default)]
    pub facetable_fields: Vec<TitledField>,
    /// Facet name → filter kind. Facets not named here match exactly.
    #[serde(default)]
    pub facet_filters: BTreeMap<String, FilterKind>,
    #[serde(default)]
    pub fulltext_fields: Vec<String>,
    #[serde(default = "default_allowed_page_sizes")]
    pub allowed_page_sizes: Vec<u32>,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Overrides the entity's intrinsic ordering expression.
    #[serde(default)]
    pub default_sort: Option<String>,
    #[serde(default)]
    pub access: AccessRule,
}

fn default_allowed_page_sizes() -> Vec<u32> {
    DEFAULT_ALLOWED_PAGE_SIZES.to_vec()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl ListingDefinitions {
    /// Parse definitions from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        serde_yml::from_str(content).map_err(|e| ConfigError::InvalidDefinitions {
            details: e.to_string(),
        })
    }

    /// Read and parse a definitions file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read listing definitions {}", path.display()))?;
        let definitions = Self::from_yaml_str(&content)
            .with_context(|| format!("failed to parse listing definitions {}", path.display()))?;
        Ok(definitions)
    }

    /// Build the schema registry from the declared entities.
    pub fn schema(&self) -> Result<SchemaRegistry, ConfigError> {
        let mut registry = SchemaRegistry::new();
        for (name, entity) in &self.entities {
            registry.register(name.clone(), entity.clone())?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Resolve every listing against the schema.
    pub fn resolve(&self) -> Result<Vec<Listing>, ConfigError> {
        let schema = self.schema()?;
        let mut seen = HashSet::new();
        let mut listings = Vec::with_capacity(self.listings.len());

        for definition in &self.listings {
            if !seen.insert(definition.id.as_str()) {
                return Err(ConfigError::DuplicateListing {
                    listing: definition.id.clone(),
                });
            }
            listings.push(Listing::resolve(definition, &schema)?);
        }

        Ok(listings)
    }
}

/// A table column of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingColumn {
    pub title: String,
    pub field: ResolvedField,
}

impl ListingColumn {
    /// Field path; also the key of the column's value in result rows.
    pub fn name(&self) -> &str {
        &self.field.path
    }
}

/// A facetable field with its filter kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    /// Facet name as configured (may be a relation path).
    pub name: String,
    pub title: String,
    pub field: ResolvedField,
    pub kind: FilterKind,
    /// Request parameter and client key, e.g. `maker__id`.
    pub identifier: String,
}

/// A resolved, immutable listing configuration.
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub singular_name: String,
    pub item_type: String,
    /// Base table.
    pub table: String,
    /// Identifier column on the base table.
    pub id_column: String,
    /// Field used as an item's title.
    pub title_field: String,
    pub columns: Vec<ListingColumn>,
    pub sortable_fields: BTreeSet<String>,
    /// Resolved columns for every sortable field and the default sort field.
    pub sort_fields: BTreeMap<String, ResolvedField>,
    pub facets: Vec<Facet>,
    pub fulltext_fields: Vec<ResolvedField>,
    pub allowed_page_sizes: Vec<u32>,
    pub default_page_size: u32,
    pub default_sort: Sort,
    pub access: AccessRule,
}

impl Listing {
    /// Resolve one definition against the schema.
    pub fn resolve(
        definition: &ListingDefinition,
        schema: &SchemaRegistry,
    ) -> Result<Self, ConfigError> {
        let id = &definition.id;
        let item_type = &definition.item_type;
        let entity = schema
            .get(item_type)
            .ok_or_else(|| ConfigError::UnknownEntity {
                context: format!("listing '{id}'"),
                entity: item_type.clone(),
            })?;

        validate_page_sizes(definition)?;

        let listing_fields = if definition.listing_fields.is_empty() {
            vec![TitledField {
                field: entity.title_field.clone(),
                title: humanize(&entity.title_field),
            }]
        } else {
            definition.listing_fields.clone()
        };
        let columns = listing_fields
            .iter()
            .map(|f| {
                Ok(ListingColumn {
                    title: f.title.clone(),
                    field: schema.resolve(item_type, &f.field)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        for name in definition.facet_filters.keys() {
            if !definition.facetable_fields.iter().any(|f| &f.field == name) {
                return Err(ConfigError::OverrideWithoutFacet {
                    listing: id.clone(),
                    field: name.clone(),
                });
            }
        }
        let facets = definition
            .facetable_fields
            .iter()
            .map(|f| {
                let field = schema.resolve(item_type, &f.field)?;
                Ok(Facet {
                    name: f.field.clone(),
                    title: f.title.clone(),
                    kind: definition
                        .facet_filters
                        .get(&f.field)
                        .copied()
                        .unwrap_or_default(),
                    identifier: field.identifier(),
                    field,
                })
            })
            .collect::<Result<Vec<Facet>, ConfigError>>()?;

        let mut identifiers = HashSet::new();
        for facet in &facets {
            if !identifiers.insert(facet.identifier.as_str()) {
                return Err(ConfigError::DuplicateFacetIdentifier {
                    listing: id.clone(),
                    identifier: facet.identifier.clone(),
                });
            }
        }

        let fulltext_fields = definition
            .fulltext_fields
            .iter()
            .map(|f| schema.resolve(item_type, f))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let default_sort = match (&definition.default_sort, &entity.default_sort) {
            (Some(expression), _) | (None, Some(expression)) => parse_default_sort(expression),
            (None, None) => parse_default_sort(&format!("\"{}\" ASC", entity.id_column)),
        };

        let mut sort_fields = BTreeMap::new();
        for name in definition
            .sortable_fields
            .iter()
            .chain(std::iter::once(&default_sort.field))
        {
            sort_fields.insert(name.clone(), schema.resolve(item_type, name)?);
        }

        if let Some(field) = definition.access.field()
            && !entity.has_field(field)
        {
            return Err(ConfigError::UnknownField {
                entity: item_type.clone(),
                field: field.to_string(),
                path: field.to_string(),
            });
        }

        let plural = entity
            .plural_name
            .clone()
            .unwrap_or_else(|| humanize(item_type) + "s");

        Ok(Self {
            id: id.clone(),
            title: definition.title.clone().unwrap_or_else(|| plural.clone()),
            singular_name: entity
                .singular_name
                .clone()
                .unwrap_or_else(|| humanize(item_type)),
            item_type: item_type.clone(),
            table: entity.table.clone(),
            id_column: entity.id_column.clone(),
            title_field: entity.title_field.clone(),
            columns,
            sortable_fields: definition.sortable_fields.iter().cloned().collect(),
            sort_fields,
            facets,
            fulltext_fields,
            allowed_page_sizes: definition.allowed_page_sizes.clone(),
            default_page_size: definition.default_page_size,
            default_sort,
            access: definition.access.clone(),
        })
    }

    /// Facet by field identifier.
    pub fn facet_by_identifier(&self, identifier: &str) -> Option<&Facet> {
        self.facets.iter().find(|f| f.identifier == identifier)
    }

    /// Whether keyword search is offered.
    pub fn has_fulltext(&self) -> bool {
        !self.fulltext_fields.is_empty()
    }
}

fn validate_page_sizes(definition: &ListingDefinition) -> Result<(), ConfigError> {
    let sizes = &definition.allowed_page_sizes;
    if sizes.is_empty() || sizes.contains(&0) {
        return Err(ConfigError::InvalidPageSizes {
            listing: definition.id.clone(),
        });
    }
    if !sizes.contains(&definition.default_page_size) {
        return Err(ConfigError::DefaultPageSizeNotAllowed {
            listing: definition.id.clone(),
            size: definition.default_page_size,
        });
    }
    Ok(())
}

/// `maker_name` → `Maker name`.
fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::listing::types::SortDirection;

    const YAML: &str = r#"
entities:
  product:
    table: products
    title_field: name
    default_sort: '"name" ASC'
    singular_name: Product
    plural_name: Products
    fields: [color, size, price, published]
    relations:
      maker: { entity: maker, foreign_key: maker_id }
  maker:
    table: makers
    title_field: name
    fields: [country]
listings:
  - id: products
    item_type: product
    listing_fields:
      - { field: name, title: Name }
      - { field: maker.name, title: Maker }
    sortable_fields: [name, price]
    facetable_fields:
      - { field: color, title: Color }
      - { field: maker.name, title: Maker }
      - { field: price, title: Price }
    facet_filters:
      price: range
    fulltext_fields: [name]
    access: { type: field, field: published, equals: true }
"#;

    fn with_listing(extra: &str) -> String {
        format!("{YAML}  - id: other\n    item_type: product\n{extra}")
    }

    #[test]
    fn resolves_full_listing() {
        let listings = ListingDefinitions::from_yaml_str(YAML)
            .unwrap()
            .resolve()
            .unwrap();
        let listing = &listings[0];

        assert_eq!(listing.title, "Products");
        assert_eq!(listing.singular_name, "Product");
        assert_eq!(listing.allowed_page_sizes, vec![10, 20, 50, 100]);
        assert_eq!(listing.default_page_size, 20);
        assert_eq!(listing.default_sort, Sort::new("name", SortDirection::Asc));
        assert_eq!(listing.columns[1].name(), "maker.name");

        let identifiers: Vec<_> = listing.facets.iter().map(|f| f.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["color", "maker__id", "price"]);
        assert_eq!(listing.facets[2].kind, FilterKind::Range);
        assert_eq!(listing.facets[0].kind, FilterKind::Exact);
        assert!(listing.facet_by_identifier("maker__id").is_some());
        assert!(listing.has_fulltext());
    }

    #[test]
    fn default_listing_columns_use_title_field() {
        let yaml = with_listing("");
        let listings = ListingDefinitions::from_yaml_str(&yaml)
            .unwrap()
            .resolve()
            .unwrap();
        let other = &listings[1];

        assert_eq!(other.columns.len(), 1);
        assert_eq!(other.columns[0].name(), "name");
        assert!(!other.has_fulltext());
    }

    #[test]
    fn unknown_facet_field_is_rejected() {
        let yaml = with_listing("    facetable_fields:\n      - { field: weight, title: Weight }\n");
        let err = ListingDefinitions::from_yaml_str(&yaml)
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { field, .. } if field == "weight"));
    }

    #[test]
    fn default_page_size_must_be_allowed() {
        let yaml = with_listing("    allowed_page_sizes: [10, 50]\n");
        let err = ListingDefinitions::from_yaml_str(&yaml)
            .unwrap()
            .resolve()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DefaultPageSizeNotAllowed {
                listing: "other".to_string(),
                size: 20,
            }
        );
    }

    #[test]
    fn override_needs_a_facet() {
        let yaml = with_listing("    facet_filters:\n      size: substring\n");
        let err = ListingDefinitions::from_yaml_str(&yaml)
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OverrideWithoutFacet { .. }));
    }

    #[test]
    fn one_facet_per_relation_identifier() {
        let yaml = with_listing(
            "    facetable_fields:\n      - { field: maker.name, title: Maker }\n      - { field: maker.country, title: Country }\n",
        );
        let err = ListingDefinitions::from_yaml_str(&yaml)
            .unwrap()
            .resolve()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateFacetIdentifier {
                listing: "other".to_string(),
                identifier: "maker__id".to_string(),
            }
        );
        assert!(err.to_string().contains("maker__id"));
    }

    #[test]
    fn unknown_filter_kind_fails_to_parse() {
        let yaml = with_listing(
            "    facetable_fields:\n      - { field: size, title: Size }\n    facet_filters:\n      size: fuzzy\n",
        );
        let err = ListingDefinitions::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDefinitions { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let yaml = format!("{YAML}  - id: products\n    item_type: product\n");
        let err = ListingDefinitions::from_yaml_str(&yaml)
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateListing { .. }));
    }

    #[test]
    fn unknown_item_type_is_rejected() {
        let yaml = format!("{YAML}  - id: ghosts\n    item_type: ghost\n");
        let err = ListingDefinitions::from_yaml_str(&yaml)
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEntity { entity, .. } if entity == "ghost"));
    }

    #[test]
    fn missing_intrinsic_order_sorts_by_id() {
        let yaml = "entities:\n  tag:\n    table: tags\nlistings:\n  - id: tags\n    item_type: tag\n";
        let listings = ListingDefinitions::from_yaml_str(yaml)
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(listings[0].default_sort, Sort::new("id", SortDirection::Asc));
        assert_eq!(listings[0].title, "Tags");
        assert_eq!(listings[0].singular_name, "Tag");
    }
}

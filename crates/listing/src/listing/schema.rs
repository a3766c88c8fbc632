//! Entity schema and relation path resolution.
//!
//! A field reference such as `maker.country.name` is resolved against the
//! declared schema into a typed path: one join per relation step plus the
//! terminal column. Resolution happens once at startup; any failure is a
//! [`ConfigError`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::query::{ColumnRef, Join};
use crate::error::ConfigError;

/// Separator used in flattened field identifiers.
pub const IDENTIFIER_SEPARATOR: &str = "__";

/// Declared shape of one entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitySchema {
    /// Backing table.
    pub table: String,

    /// Identifier column.
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Field used as the item's display title.
    #[serde(default = "default_title_field")]
    pub title_field: String,

    /// Intrinsic ordering expression, e.g. `"created" DESC`.
    #[serde(default)]
    pub default_sort: Option<String>,

    #[serde(default)]
    pub singular_name: Option<String>,

    #[serde(default)]
    pub plural_name: Option<String>,

    /// Scalar columns. The id and title columns are always implied.
    #[serde(default)]
    pub fields: Vec<String>,

    /// To-one relations by name.
    #[serde(default)]
    pub relations: BTreeMap<String, RelationSchema>,
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_title_field() -> String {
    "title".to_string()
}

impl EntitySchema {
    /// Whether `field` is a column of this entity.
    pub fn has_field(&self, field: &str) -> bool {
        field == self.id_column
            || field == self.title_field
            || self.fields.iter().any(|f| f == field)
    }
}

/// A to-one relation from one entity to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationSchema {
    /// Target entity type.
    pub entity: String,
    /// Column on the owning table holding the target's id.
    pub foreign_key: String,
}

/// A field path resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// Path as configured, e.g. `maker.name`.
    pub path: String,
    /// Relation names traversed, in order.
    pub relations: Vec<String>,
    /// Joins needed to reach the terminal column.
    pub joins: Vec<Join>,
    /// Terminal column.
    pub column: ColumnRef,
    /// Grouping identifier: the last related row's id for relation paths,
    /// the terminal column itself otherwise.
    pub key: ColumnRef,
}

impl ResolvedField {
    /// Whether the path traverses at least one relation.
    pub fn is_relation(&self) -> bool {
        !self.relations.is_empty()
    }

    /// Flattened identifier of the grouping key, safe for use as a form
    /// field name and JSON key: `maker.name` → `maker__id`.
    pub fn identifier(&self) -> String {
        if self.is_relation() {
            let mut parts = self.relations.clone();
            parts.push(self.key.column.clone());
            parts.join(IDENTIFIER_SEPARATOR)
        } else {
            self.path.replace('.', IDENTIFIER_SEPARATOR)
        }
    }
}

/// Registry of entity schemas by type name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, validating its identifiers.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        schema: EntitySchema,
    ) -> Result<(), ConfigError> {
        ensure_identifier(&schema.table)?;
        ensure_identifier(&schema.id_column)?;
        ensure_identifier(&schema.title_field)?;
        for field in &schema.fields {
            ensure_identifier(field)?;
        }
        for (relation, target) in &schema.relations {
            ensure_identifier(relation)?;
            ensure_identifier(&target.foreign_key)?;
        }
        self.entities.insert(name.into(), schema);
        Ok(())
    }

    /// Look up an entity type.
    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    /// Check that every relation targets a registered entity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, schema) in &self.entities {
            for (relation, target) in &schema.relations {
                if !self.entities.contains_key(&target.entity) {
                    return Err(ConfigError::BrokenRelation {
                        entity: name.clone(),
                        relation: relation.clone(),
                        target: target.entity.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve a dotted field path starting at `entity`.
    ///
    /// Every segment but the last must be a relation; the last must be a
    /// field of the entity reached by then.
    pub fn resolve(&self, entity: &str, path: &str) -> Result<ResolvedField, ConfigError> {
        let mut current_name = entity;
        let mut current = self.lookup(current_name, path)?;
        let base_table = current.table.clone();

        let segments: Vec<&str> = path.split('.').collect();
        let (terminal, steps) = match segments.split_last() {
            Some((terminal, steps)) if !terminal.is_empty() => (*terminal, steps),
            _ => {
                return Err(ConfigError::UnknownField {
                    entity: entity.to_string(),
                    field: String::new(),
                    path: path.to_string(),
                });
            }
        };

        let mut relations = Vec::new();
        let mut joins = Vec::new();
        let mut alias = base_table.clone();

        for step in steps {
            let relation = current.relations.get(*step).ok_or_else(|| {
                ConfigError::UnknownRelation {
                    entity: current_name.to_string(),
                    relation: (*step).to_string(),
                    path: path.to_string(),
                }
            })?;
            let target = self.entities.get(&relation.entity).ok_or_else(|| {
                ConfigError::BrokenRelation {
                    entity: current_name.to_string(),
                    relation: (*step).to_string(),
                    target: relation.entity.clone(),
                }
            })?;

            relations.push((*step).to_string());
            let join_alias = relations.join(IDENTIFIER_SEPARATOR);
            if join_alias == base_table {
                return Err(ConfigError::InvalidIdentifier { name: join_alias });
            }

            joins.push(Join {
                alias: join_alias.clone(),
                table: target.table.clone(),
                from: ColumnRef::new(alias.clone(), relation.foreign_key.clone()),
                to_column: target.id_column.clone(),
            });

            alias = join_alias;
            current_name = &relation.entity;
            current = target;
        }

        if !current.has_field(terminal) {
            return Err(ConfigError::UnknownField {
                entity: current_name.to_string(),
                field: terminal.to_string(),
                path: path.to_string(),
            });
        }

        let column = ColumnRef::new(alias.clone(), terminal);
        let key = if relations.is_empty() {
            column.clone()
        } else {
            ColumnRef::new(alias, current.id_column.clone())
        };

        Ok(ResolvedField {
            path: path.to_string(),
            relations,
            joins,
            column,
            key,
        })
    }

    fn lookup(&self, name: &str, path: &str) -> Result<&EntitySchema, ConfigError> {
        self.entities
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEntity {
                context: format!("path '{path}'"),
                entity: name.to_string(),
            })
    }
}

/// Validate a SQL identifier name (table/column names).
/// Allows only `[a-zA-Z_][a-zA-Z0-9_]*` with max 63 chars (PostgreSQL limit).
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

fn ensure_identifier(name: &str) -> Result<(), ConfigError> {
    if is_safe_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn entity(table: &str, fields: &[&str]) -> EntitySchema {
        EntitySchema {
            table: table.to_string(),
            id_column: "id".to_string(),
            title_field: "name".to_string(),
            default_sort: None,
            singular_name: None,
            plural_name: None,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            relations: BTreeMap::new(),
        }
    }

    fn registry() -> SchemaRegistry {
        let mut product = entity("products", &["color", "price"]);
        product.relations.insert(
            "maker".to_string(),
            RelationSchema {
                entity: "maker".to_string(),
                foreign_key: "maker_id".to_string(),
            },
        );
        let mut maker = entity("makers", &[]);
        maker.relations.insert(
            "country".to_string(),
            RelationSchema {
                entity: "country".to_string(),
                foreign_key: "country_id".to_string(),
            },
        );
        let country = entity("countries", &["code"]);

        let mut registry = SchemaRegistry::new();
        registry.register("product", product).unwrap();
        registry.register("maker", maker).unwrap();
        registry.register("country", country).unwrap();
        registry.validate().unwrap();
        registry
    }

    #[test]
    fn scalar_field_resolves_without_joins() {
        let field = registry().resolve("product", "color").unwrap();

        assert!(!field.is_relation());
        assert!(field.joins.is_empty());
        assert_eq!(field.column, ColumnRef::new("products", "color"));
        assert_eq!(field.key, field.column);
        assert_eq!(field.identifier(), "color");
    }

    #[test]
    fn relation_path_groups_by_related_id() {
        let field = registry().resolve("product", "maker.name").unwrap();

        assert!(field.is_relation());
        assert_eq!(field.joins.len(), 1);
        assert_eq!(field.joins[0].alias, "maker");
        assert_eq!(field.joins[0].table, "makers");
        assert_eq!(field.joins[0].from, ColumnRef::new("products", "maker_id"));
        assert_eq!(field.column, ColumnRef::new("maker", "name"));
        assert_eq!(field.key, ColumnRef::new("maker", "id"));
        assert_eq!(field.identifier(), "maker__id");
    }

    #[test]
    fn nested_relation_path_chains_joins() {
        let field = registry().resolve("product", "maker.country.code").unwrap();

        let aliases: Vec<_> = field.joins.iter().map(|j| j.alias.as_str()).collect();
        assert_eq!(aliases, vec!["maker", "maker__country"]);
        assert_eq!(field.joins[1].from, ColumnRef::new("maker", "country_id"));
        assert_eq!(field.key, ColumnRef::new("maker__country", "id"));
        assert_eq!(field.identifier(), "maker__country__id");
    }

    #[test]
    fn unknown_field_is_config_error() {
        let err = registry().resolve("product", "weight").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { field, .. } if field == "weight"));
    }

    #[test]
    fn unknown_relation_is_config_error() {
        let err = registry().resolve("product", "vendor.name").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRelation { relation, .. } if relation == "vendor"));
    }

    #[test]
    fn broken_relation_target_fails_validation() {
        let mut product = entity("products", &[]);
        product.relations.insert(
            "maker".to_string(),
            RelationSchema {
                entity: "nowhere".to_string(),
                foreign_key: "maker_id".to_string(),
            },
        );
        let mut registry = SchemaRegistry::new();
        registry.register("product", product).unwrap();

        assert!(matches!(
            registry.validate(),
            Err(ConfigError::BrokenRelation { .. })
        ));
    }

    #[test]
    fn unsafe_identifiers_are_rejected() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register("product", entity("products; DROP TABLE x", &[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier { .. }));

        assert!(is_safe_identifier("maker_id"));
        assert!(!is_safe_identifier("1abc"));
        assert!(!is_safe_identifier("a.b"));
        assert!(!is_safe_identifier(""));
    }
}

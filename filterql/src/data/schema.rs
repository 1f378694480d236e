//! Model schema metadata
//!
//! [`SchemaCapability`] is the read-only view of the data model the filter
//! engine resolves names against. [`Catalog`] implements it from declarative
//! model definitions (loadable from JSON) plus scope handlers registered in
//! code.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::core::constants::PATH_SEPARATOR;
use crate::filters::QueryBuilder;
use crate::filters::cast::CastType;
use crate::filters::types::Value;

/// Named query transformation declared by a model
pub type ScopeFn = Arc<dyn Fn(&mut dyn QueryBuilder, &Value) + Send + Sync>;

/// Read-only schema metadata.
///
/// Models are identified by name. Relation paths are dotted
/// (`posts.comments`) and resolved one segment at a time. Implementations
/// must be side-effect free; the engine calls them repeatedly without caching.
pub trait SchemaCapability: Send + Sync {
    /// Table backing the model
    fn table(&self, model: &str) -> Option<&str>;

    /// Primary key column of the model
    fn key_name(&self, model: &str) -> Option<&str>;

    fn column_exists(&self, model: &str, column: &str) -> bool;

    /// A single relation segment declared on `model`
    fn relation(&self, model: &str, name: &str) -> Option<&Relation>;

    fn declared_cast_type(&self, model: &str, attribute: &str) -> Option<CastType>;

    /// Scope handler declared on `model`
    fn scope(&self, model: &str, name: &str) -> Option<ScopeFn>;

    fn scope_exists(&self, model: &str, name: &str) -> bool {
        self.scope(model, name).is_some()
    }

    /// Model at the end of a dotted relation path
    fn resolve_relation_target<'a>(&'a self, model: &'a str, path: &str) -> Option<&'a str> {
        let mut current = model;
        for segment in path.split(PATH_SEPARATOR) {
            current = self.relation(current, segment)?.target.as_str();
        }
        Some(current)
    }

    fn relation_exists(&self, model: &str, path: &str) -> bool {
        self.resolve_relation_target(model, path).is_some()
    }
}

/// Relation cardinality, which decides on which side the foreign key lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
}

/// A relation from one model to another
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Relation {
    /// Target model name
    pub target: String,
    pub kind: RelationKind,
    /// Foreign key column: on the target for `has_*`, on the parent for `belongs_to`
    pub foreign_key: String,
    /// Referenced key: on the parent for `has_*`, on the target for
    /// `belongs_to`; defaults to that model's primary key
    #[serde(default)]
    pub local_key: Option<String>,
}

impl Relation {
    pub fn has_many(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::HasMany, target, foreign_key)
    }

    pub fn has_one(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::HasOne, target, foreign_key)
    }

    pub fn belongs_to(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::BelongsTo, target, foreign_key)
    }

    fn new(kind: RelationKind, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind,
            foreign_key: foreign_key.into(),
            local_key: None,
        }
    }

    pub fn local_key(mut self, key: impl Into<String>) -> Self {
        self.local_key = Some(key.into());
        self
    }

    /// Join columns as `(parent_column, related_column)`
    pub fn join_columns(&self, parent_key: &str, related_key: &str) -> (String, String) {
        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => (
                self.local_key.clone().unwrap_or_else(|| parent_key.to_string()),
                self.foreign_key.clone(),
            ),
            RelationKind::BelongsTo => (
                self.foreign_key.clone(),
                self.local_key.clone().unwrap_or_else(|| related_key.to_string()),
            ),
        }
    }
}

fn default_key() -> String {
    "id".to_string()
}

/// Declarative description of one model
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelDefinition {
    pub table: String,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub casts: HashMap<String, CastType>,
    #[serde(default)]
    pub relations: BTreeMap<String, Relation>,
}

impl ModelDefinition {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: default_key(),
            columns: Vec::new(),
            casts: HashMap::new(),
            relations: BTreeMap::new(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn cast(mut self, attribute: impl Into<String>, cast_type: CastType) -> Self {
        self.casts.insert(attribute.into(), cast_type);
        self
    }

    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: HashMap<String, ModelDefinition>,
}

/// In-memory schema catalog
#[derive(Default)]
pub struct Catalog {
    models: HashMap<String, ModelDefinition>,
    scopes: HashMap<String, HashMap<String, ScopeFn>>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes: BTreeMap<&str, Vec<&str>> = self
            .scopes
            .iter()
            .map(|(model, scopes)| (model.as_str(), scopes.keys().map(String::as_str).collect()))
            .collect();
        f.debug_struct("Catalog")
            .field("models", &self.models)
            .field("scopes", &scopes)
            .finish()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from JSON: `{"models": {"users": {"table": "users", ...}}}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: CatalogFile = serde_json::from_str(json)?;
        tracing::debug!(models = file.models.len(), "Loaded schema catalog");
        Ok(Self {
            models: file.models,
            scopes: HashMap::new(),
        })
    }

    pub fn with_model(mut self, name: impl Into<String>, definition: ModelDefinition) -> Self {
        self.models.insert(name.into(), definition);
        self
    }

    /// Register a scope handler on a model, replacing any previous handler
    /// with the same name
    pub fn register_scope<F>(&mut self, model: &str, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut dyn QueryBuilder, &Value) + Send + Sync + 'static,
    {
        self.scopes
            .entry(model.to_string())
            .or_default()
            .insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn model(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.get(name)
    }

    /// Model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl SchemaCapability for Catalog {
    fn table(&self, model: &str) -> Option<&str> {
        self.model(model).map(|m| m.table.as_str())
    }

    fn key_name(&self, model: &str) -> Option<&str> {
        self.model(model).map(|m| m.key.as_str())
    }

    fn column_exists(&self, model: &str, column: &str) -> bool {
        self.model(model)
            .is_some_and(|m| m.columns.iter().any(|c| c == column))
    }

    fn relation(&self, model: &str, name: &str) -> Option<&Relation> {
        self.model(model).and_then(|m| m.relations.get(name))
    }

    fn declared_cast_type(&self, model: &str, attribute: &str) -> Option<CastType> {
        self.model(model).and_then(|m| m.casts.get(attribute).copied())
    }

    fn scope(&self, model: &str, name: &str) -> Option<ScopeFn> {
        self.scopes.get(model).and_then(|s| s.get(name)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::blog_catalog;

    #[test]
    fn resolves_relation_paths() {
        let catalog = blog_catalog();
        assert_eq!(catalog.resolve_relation_target("users", "posts"), Some("posts"));
        assert_eq!(
            catalog.resolve_relation_target("users", "posts.comments"),
            Some("comments")
        );
        assert_eq!(
            catalog.resolve_relation_target("posts", "author.posts"),
            Some("posts")
        );
        assert_eq!(catalog.resolve_relation_target("users", "posts.title"), None);
        assert_eq!(catalog.resolve_relation_target("users", ""), None);
        assert!(catalog.relation_exists("users", "profile"));
        assert!(!catalog.relation_exists("users", "unknownRelation"));
    }

    #[test]
    fn columns_casts_and_scopes() {
        let catalog = blog_catalog();
        assert!(catalog.column_exists("users", "name"));
        assert!(!catalog.column_exists("users", "title"));
        assert!(!catalog.column_exists("missing", "name"));
        assert_eq!(
            catalog.declared_cast_type("users", "age"),
            Some(CastType::Int)
        );
        assert_eq!(catalog.declared_cast_type("users", "name"), None);
        assert!(catalog.scope_exists("posts", "published"));
        assert!(!catalog.scope_exists("users", "published"));
    }

    #[test]
    fn join_columns_follow_relation_kind() {
        let has_many = Relation::has_many("posts", "user_id");
        assert_eq!(
            has_many.join_columns("id", "id"),
            ("id".to_string(), "user_id".to_string())
        );

        let belongs_to = Relation::belongs_to("users", "user_id").local_key("uuid");
        assert_eq!(
            belongs_to.join_columns("id", "id"),
            ("user_id".to_string(), "uuid".to_string())
        );
    }

    #[test]
    fn catalog_from_json() {
        let json = r#"{
            "models": {
                "users": {
                    "table": "users",
                    "columns": ["id", "name"],
                    "casts": { "id": "integer" },
                    "relations": {
                        "posts": { "target": "posts", "kind": "has_many", "foreign_key": "user_id" }
                    }
                },
                "posts": { "table": "blog_posts", "key": "post_id", "columns": ["post_id", "user_id"] }
            }
        }"#;
        let catalog = Catalog::from_json(json).unwrap();

        assert_eq!(catalog.model_names(), vec!["posts", "users"]);
        assert_eq!(catalog.table("posts"), Some("blog_posts"));
        assert_eq!(catalog.key_name("posts"), Some("post_id"));
        assert_eq!(catalog.key_name("users"), Some("id"));
        assert_eq!(catalog.declared_cast_type("users", "id"), Some(CastType::Int));
        assert_eq!(
            catalog.relation("users", "posts").map(|r| r.kind),
            Some(RelationKind::HasMany)
        );
    }

    #[test]
    fn catalog_from_json_rejects_unknown_kind() {
        let json = r#"{ "models": { "users": { "table": "users", "relations": {
            "posts": { "target": "posts", "kind": "many_to_many", "foreign_key": "user_id" }
        } } } }"#;
        assert!(Catalog::from_json(json).is_err());
    }
}

//! SQL query builder
//!
//! [`SqlQuery`] implements [`QueryBuilder`] by rendering parameterized SQL
//! with `?` placeholders. Relation conditions become correlated `EXISTS`
//! sub-queries joined through the schema's relation metadata.

use std::fmt;

use crate::core::constants::PATH_SEPARATOR;
use crate::filters::{QueryBuilder, QueryType, Value};
use crate::utils::sql::{placeholders, qualify_column};

use super::schema::SchemaCapability;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boolean {
    And,
    Or,
}

impl Boolean {
    fn from_query_type(query_type: QueryType) -> Self {
        if query_type.is_or() { Self::Or } else { Self::And }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One rendered WHERE condition with its parameters
#[derive(Debug, Clone, PartialEq)]
struct Condition {
    boolean: Boolean,
    sql: String,
    params: Vec<Value>,
}

/// A SELECT on one model
#[derive(Clone)]
pub struct SqlQuery<'c> {
    schema: &'c dyn SchemaCapability,
    model: String,
    table: String,
    alias: String,
    depth: usize,
    relation: Option<String>,
    columns: Vec<String>,
    conditions: Vec<Condition>,
}

impl<'c> SqlQuery<'c> {
    /// Query on a root model. Unknown models query a table named after them.
    pub fn new(schema: &'c dyn SchemaCapability, model: &str) -> Self {
        let table = schema.table(model).unwrap_or(model).to_string();
        Self {
            schema,
            model: model.to_string(),
            alias: table.clone(),
            table,
            depth: 0,
            relation: None,
            columns: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Standalone query loading the relation `path` of `root_model`, the
    /// shape of an eager load. `None` when the path does not resolve.
    pub fn for_relation(
        schema: &'c dyn SchemaCapability,
        root_model: &str,
        path: &str,
    ) -> Option<Self> {
        let target = schema.resolve_relation_target(root_model, path)?;
        let mut query = Self::new(schema, target);
        query.relation = Some(path.to_string());
        Some(query)
    }

    /// Restrict the selected columns
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Relation path for relation queries
    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    /// Render the statement and its ordered parameters
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", columns, self.table);
        if self.alias != self.table {
            sql.push_str(&format!(" AS {}", self.alias));
        }

        let (where_sql, params) = self.where_sql();
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        (sql, params)
    }

    /// Conditions joined by their booleans; the first condition's boolean is
    /// dropped
    fn where_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(condition.boolean.as_sql());
                sql.push(' ');
            }
            sql.push_str(&condition.sql);
            params.extend(condition.params.iter().cloned());
        }
        (sql, params)
    }

    fn push(&mut self, boolean: Boolean, sql: String, params: Vec<Value>) {
        tracing::trace!(table = %self.table, sql = %sql, "Adding condition");
        self.conditions.push(Condition {
            boolean,
            sql,
            params,
        });
    }

    /// `EXISTS (...)` through every segment of `relation`, with `constraint`
    /// applied to the innermost sub-query.
    ///
    /// Returns `None` when a segment does not resolve.
    fn exists_sql(
        &self,
        relation: &str,
        constraint: Option<&SqlQuery<'_>>,
    ) -> Option<(String, Vec<Value>)> {
        let schema = self.schema;
        let mut parent_model = self.model.clone();
        let mut parent_alias = self.alias.clone();
        // (table, alias, join) per segment, outermost first
        let mut links = Vec::new();

        for (i, segment) in relation.split(PATH_SEPARATOR).enumerate() {
            let meta = schema.relation(&parent_model, segment)?;
            let table = schema.table(&meta.target).unwrap_or(&meta.target).to_string();
            let alias = format!("{}_{}", table, self.depth + i + 1);
            let parent_key = schema.key_name(&parent_model).unwrap_or("id");
            let related_key = schema.key_name(&meta.target).unwrap_or("id");
            let (parent_column, related_column) = meta.join_columns(parent_key, related_key);
            let join = format!(
                "{} = {}",
                qualify_column(&alias, &related_column),
                qualify_column(&parent_alias, &parent_column)
            );
            links.push((table, alias.clone(), join));
            parent_model = meta.target.clone();
            parent_alias = alias;
        }

        let mut inner: Option<(String, Vec<Value>)> = constraint
            .map(SqlQuery::where_sql)
            .filter(|(sql, _)| !sql.is_empty());

        for (table, alias, join) in links.into_iter().rev() {
            let (sql, params) = match inner.take() {
                Some((rest, params)) => (
                    format!(
                        "EXISTS (SELECT 1 FROM {} AS {} WHERE {} AND ({}))",
                        table, alias, join, rest
                    ),
                    params,
                ),
                None => (
                    format!("EXISTS (SELECT 1 FROM {} AS {} WHERE {})", table, alias, join),
                    Vec::new(),
                ),
            };
            inner = Some((sql, params));
        }
        inner
    }

    fn push_exists(&mut self, relation: &str, constraint: Option<&SqlQuery<'_>>, negate: bool) {
        match self.exists_sql(relation, constraint) {
            Some((sql, params)) => {
                let sql = if negate { format!("NOT {}", sql) } else { sql };
                self.push(Boolean::And, sql, params);
            }
            None => {
                tracing::warn!(
                    model = %self.model,
                    relation,
                    "Relation does not resolve, condition can never match"
                );
                self.push(Boolean::And, "1 = 0".to_string(), Vec::new());
            }
        }
    }
}

impl QueryBuilder for SqlQuery<'_> {
    fn model(&self) -> &str {
        &self.model
    }

    fn is_relation_query(&self) -> bool {
        self.relation.is_some()
    }

    fn where_basic(
        &mut self,
        query_type: QueryType,
        column: &str,
        operator: &'static str,
        value: Value,
    ) {
        let column = qualify_column(&self.alias, column);
        let (sql, params) = match (operator, value) {
            ("=", Value::Null) => (format!("{} IS NULL", column), Vec::new()),
            ("!=", Value::Null) => (format!("{} IS NOT NULL", column), Vec::new()),
            ("LIKE", value) => (format!("{} LIKE ? ESCAPE '\\'", column), vec![value]),
            (operator, value) => (format!("{} {} ?", column, operator), vec![value]),
        };
        let sql = if query_type.is_not() {
            format!("NOT ({})", sql)
        } else {
            sql
        };
        self.push(Boolean::from_query_type(query_type), sql, params);
    }

    fn where_in(&mut self, query_type: QueryType, column: &str, values: Vec<Value>) {
        let sql = match (values.is_empty(), query_type.is_not()) {
            (true, false) => "1 = 0".to_string(),
            (true, true) => "1 = 1".to_string(),
            (false, negate) => format!(
                "{} {}IN ({})",
                qualify_column(&self.alias, column),
                if negate { "NOT " } else { "" },
                placeholders(values.len())
            ),
        };
        self.push(Boolean::from_query_type(query_type), sql, values);
    }

    fn has(&mut self, relation: &str) {
        self.push_exists(relation, None, false);
    }

    fn doesnt_have(&mut self, relation: &str) {
        self.push_exists(relation, None, true);
    }

    fn relation_query(&self, relation: &str) -> Self {
        let target = self
            .schema
            .resolve_relation_target(&self.model, relation)
            .unwrap_or(relation);
        let segments = relation.split(PATH_SEPARATOR).count();
        let mut query = Self::new(self.schema, target);
        query.depth = self.depth + segments;
        query.alias = format!("{}_{}", query.table, query.depth);
        query
    }

    fn where_has(&mut self, relation: &str, constraint: Self) {
        self.push_exists(relation, Some(&constraint), false);
    }
}

impl PartialEq for SqlQuery<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
            && self.table == other.table
            && self.alias == other.alias
            && self.depth == other.depth
            && self.relation == other.relation
            && self.columns == other.columns
            && self.conditions == other.conditions
    }
}

impl fmt::Debug for SqlQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, params) = self.to_sql();
        f.debug_struct("SqlQuery")
            .field("model", &self.model)
            .field("sql", &sql)
            .field("params", &params)
            .finish()
    }
}

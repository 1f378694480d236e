//! Command line application

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::api::{ApiError, Fieldset};
use crate::core::cli::{self, Commands};
use crate::core::config::{AppConfig, FilterConfig};
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::data::{Catalog, SchemaCapability, SqlQuery};
use crate::filters::{FilterOperator, FilterResolver, QueryBuilder, QueryInput, QueryType};
use crate::utils::sql::qualify_column;

pub struct App {
    pub config: AppConfig,
}

impl App {
    /// Run the application with CLI argument parsing
    pub fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self {
            config: AppConfig::load(&cli_config)?,
        };

        match command {
            Commands::Explain {
                query,
                schema,
                model,
                pretty,
            } => app.explain(&query, &schema, &model, pretty),
            Commands::Operators => Self::print_operators(),
        }
    }

    fn init_logging() {
        let default_filter = format!("warn,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        // stdout carries the command output
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    fn explain(&self, query: &str, schema: &Path, model: &str, pretty: bool) -> Result<()> {
        let content = fs::read_to_string(schema)
            .with_context(|| format!("Failed to read schema file: {}", schema.display()))?;
        let catalog = Catalog::from_json(&content)
            .with_context(|| format!("Failed to parse schema file: {}", schema.display()))?;

        if catalog.model(model).is_none() {
            anyhow::bail!(
                "Unknown model '{}'. Available models: {}",
                model,
                catalog.model_names().join(", ")
            );
        }

        let (output, rejected) = match explain_query(&self.config.filter, &catalog, model, query) {
            Ok(output) => (output, None),
            Err(e) => (e.body(), Some(e)),
        };
        print_json(&output, pretty)?;

        match rejected {
            Some(ApiError::BadRequest { code, .. } | ApiError::Internal { code, .. }) => {
                anyhow::bail!("Filter query rejected ({})", code)
            }
            None => Ok(()),
        }
    }

    fn print_operators() -> Result<()> {
        let operators: Vec<_> = FilterOperator::ALL
            .iter()
            .map(|op| {
                json!({
                    "token": op.as_str(),
                    "sql": op.to_operator(),
                    "pattern": op.is_pattern(),
                })
            })
            .collect();
        let query_types: Vec<&str> = QueryType::ALL.iter().map(QueryType::as_str).collect();

        print_json(
            &json!({ "operators": operators, "query_types": query_types }),
            true,
        )
    }
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", rendered);
    Ok(())
}

/// Resolve `query` against `model` and render the root statement plus one
/// statement per filtered relation, the way a list endpoint would.
pub fn explain_query(
    config: &FilterConfig,
    catalog: &Catalog,
    model: &str,
    query: &str,
) -> Result<serde_json::Value, ApiError> {
    let input = QueryInput::from_query_str(query, config)?;
    let resolver = FilterResolver::new(catalog, model, &input, config)?;

    let mut fieldset = Fieldset::from_input(&input);
    if fieldset.is_restricted() {
        for (resource, column) in resolver.required_keys() {
            fieldset.force(&resource, [column]);
        }
    }

    let root = SqlQuery::new(catalog, model);
    let columns = select_columns(&fieldset, catalog, model, &root, model);
    let root = resolver.apply(root.select(columns));
    let (sql, params) = root.to_sql();

    let mut paths: Vec<&str> = Vec::new();
    for clause in resolver.relations(None) {
        if let Some(path) = clause.relation.as_deref()
            && !paths.contains(&path)
        {
            paths.push(path);
        }
    }

    let mut relations = Vec::new();
    for path in paths {
        let Some(query) = SqlQuery::for_relation(catalog, model, path) else {
            continue;
        };
        let columns = select_columns(&fieldset, catalog, path, &query, query.model());
        let query = resolver.apply(query.select(columns));
        let (sql, params) = query.to_sql();
        relations.push(json!({ "relation": path, "sql": sql, "params": params }));
    }

    tracing::debug!(
        model = resolver.model(),
        clauses = resolver.clauses().len(),
        "Explained query"
    );
    Ok(json!({
        "model": resolver.model(),
        "has_filter": resolver.has_filter(),
        "clauses": resolver.clauses(),
        "sql": sql,
        "params": params,
        "relations": relations,
    }))
}

fn select_columns(
    fieldset: &Fieldset,
    catalog: &Catalog,
    resource: &str,
    query: &SqlQuery<'_>,
    model: &str,
) -> Vec<String> {
    let key = catalog.key_name(model).unwrap_or("id");
    fieldset
        .columns(resource, key)
        .iter()
        .map(|column| qualify_column(query.table(), column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::blog_catalog;

    fn explain(query: &str) -> serde_json::Value {
        explain_query(&FilterConfig::default(), &blog_catalog(), "users", query).unwrap()
    }

    #[test]
    fn test_explain_root_and_relation_statements() {
        let output = explain("filter[name]=Bob&filter[posts.title][search]=rust&fields[users]=name");

        assert_eq!(output["has_filter"], true);
        assert_eq!(
            output["sql"],
            "SELECT users.name, users.id FROM users WHERE users.name = ? AND \
             EXISTS (SELECT 1 FROM posts AS posts_1 WHERE posts_1.user_id = users.id \
             AND (posts_1.title LIKE ? ESCAPE '\\'))"
        );
        assert_eq!(output["params"], json!(["Bob", "%rust%"]));

        let relations = output["relations"].as_array().unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0]["relation"], "posts");
        assert_eq!(
            relations[0]["sql"],
            "SELECT * FROM posts WHERE posts.title LIKE ? ESCAPE '\\'"
        );
    }

    #[test]
    fn test_explain_forces_join_keys() {
        let output = explain("filter[posts.votes][gt]=3&fields[users]=name&fields[posts]=title");

        let relations = output["relations"].as_array().unwrap();
        assert_eq!(
            relations[0]["sql"],
            "SELECT posts.title, posts.id, posts.user_id FROM posts WHERE posts.votes > ?"
        );
        assert_eq!(relations[0]["params"], json!([3]));
    }

    #[test]
    fn test_explain_serializes_clauses() {
        let output = explain("filter[name][or]=Bob&filter[posts][published]=1");
        assert_eq!(
            output["clauses"],
            json!([
                {
                    "kind": "clause",
                    "query_type": "orWhere",
                    "value": "Bob",
                    "relation": null,
                    "attribute": "name",
                    "operator": "equals"
                },
                { "kind": "scope", "name": "published", "value": true, "relation": "posts" }
            ])
        );
    }

    #[test]
    fn test_explain_without_filter() {
        let output = explain("page=1");
        assert_eq!(output["model"], "users");
        assert_eq!(output["has_filter"], false);
        assert_eq!(output["sql"], "SELECT * FROM users");
        assert_eq!(output["relations"], json!([]));
    }

    #[test]
    fn test_explain_rejects_invalid_input() {
        let err = explain_query(
            &FilterConfig::default(),
            &blog_catalog(),
            "users",
            "filters[name]=Bob",
        )
        .unwrap_err();
        assert_eq!(err.body()["code"], "MALFORMED_PARAMETER");
    }

    #[test]
    fn test_explain_uses_configured_limits() {
        let config = FilterConfig {
            max_filters: 1,
            ..Default::default()
        };
        let err = explain_query(&config, &blog_catalog(), "users", "filter[name]=a&filter[age]=1")
            .unwrap_err();
        assert_eq!(err.body()["code"], "TOO_MANY_FILTERS");
    }
}

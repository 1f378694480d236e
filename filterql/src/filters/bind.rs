//! Applying resolved clauses onto a query builder

use super::resolver::FilterResolver;
use super::types::{ClauseEntry, FilterClause, QueryType, ScopeCall, Value};

/// Query builder the resolved clauses are bound onto.
///
/// The object-safe part is what scope handlers see; relation sub-queries are
/// passed around by value and need a sized builder.
pub trait QueryBuilder {
    /// Model the builder queries
    fn model(&self) -> &str;

    /// True for a builder that loads a relation (e.g. an eager load) rather
    /// than querying a root model
    fn is_relation_query(&self) -> bool {
        false
    }

    /// `column <operator> value`, combined and negated per `query_type`.
    ///
    /// For `LIKE` the value arrives as a pattern whose `%`, `_` and `\`
    /// characters are already escaped with `\`, so the condition must be
    /// rendered as `LIKE ? ESCAPE '\'`.
    fn where_basic(
        &mut self,
        query_type: QueryType,
        column: &str,
        operator: &'static str,
        value: Value,
    );

    /// `column [NOT] IN (values)`, combined per `query_type`
    fn where_in(&mut self, query_type: QueryType, column: &str, values: Vec<Value>);

    /// At least one related row exists
    fn has(&mut self, relation: &str);

    /// No related row exists
    fn doesnt_have(&mut self, relation: &str);

    /// Empty builder for the model at the end of `relation`, used as the
    /// constraint of [`QueryBuilder::where_has`]
    fn relation_query(&self, relation: &str) -> Self
    where
        Self: Sized;

    /// A related row matching `constraint` exists
    fn where_has(&mut self, relation: &str, constraint: Self)
    where
        Self: Sized;
}

impl FilterResolver<'_> {
    /// Bind `clauses` onto `query` and hand the builder back.
    ///
    /// Never fails: everything that could go wrong was rejected when the
    /// resolver was built.
    pub fn bind<B: QueryBuilder>(&self, mut query: B, clauses: &[ClauseEntry]) -> B {
        if query.is_relation_query() {
            self.bind_relation_query(&mut query, clauses);
        } else {
            self.bind_builder_query(&mut query, clauses);
        }
        query
    }

    /// Bind the resolver's own clause set
    pub fn apply<B: QueryBuilder>(&self, query: B) -> B {
        self.bind(query, self.clauses())
    }

    fn bind_builder_query<B: QueryBuilder>(&self, query: &mut B, clauses: &[ClauseEntry]) {
        for entry in clauses {
            let clause = match entry {
                ClauseEntry::Scope(scope) => {
                    match scope.relation.as_deref() {
                        Some(relation) => {
                            let mut constraint = query.relation_query(relation);
                            if self.attach_scope(&mut constraint, scope) {
                                query.where_has(relation, constraint);
                            }
                        }
                        None => {
                            self.attach_scope(query, scope);
                        }
                    }
                    continue;
                }
                ClauseEntry::Clause(clause) => clause,
            };

            match (clause.relation.as_deref(), clause.attribute.is_some()) {
                (Some(relation), false) => {
                    if clause.value.is_truthy() {
                        query.has(relation);
                    } else {
                        query.doesnt_have(relation);
                    }
                }
                (Some(relation), true) => {
                    let mut constraint = query.relation_query(relation);
                    attach_where_clause(&mut constraint, clause);
                    query.where_has(relation, constraint);
                }
                (None, _) => attach_where_clause(query, clause),
            }
        }
    }

    fn bind_relation_query<B: QueryBuilder>(&self, query: &mut B, clauses: &[ClauseEntry]) {
        for entry in clauses {
            match entry {
                ClauseEntry::Scope(scope) => {
                    if self.owner(scope.relation.as_deref()) == query.model() {
                        self.attach_scope(query, scope);
                    }
                }
                ClauseEntry::Clause(clause) => {
                    let Some(relation) = clause.relation.as_deref() else {
                        continue;
                    };
                    if clause.attribute.is_none() {
                        continue;
                    }
                    let target = self.schema.resolve_relation_target(&self.model, relation);
                    if target == Some(query.model()) {
                        attach_where_clause(query, clause);
                    }
                }
            }
        }
    }

    /// Run the scope handler declared on the builder's model. Returns false
    /// when the model has no such scope.
    fn attach_scope<B: QueryBuilder>(&self, query: &mut B, scope: &ScopeCall) -> bool {
        let Some(handler) = self.schema.scope(query.model(), &scope.name) else {
            tracing::debug!(
                model = %query.model(),
                scope = %scope.name,
                "Scope not declared on model, skipping"
            );
            return false;
        };
        let query: &mut dyn QueryBuilder = query;
        handler(query, &scope.value);
        true
    }
}

fn attach_where_clause<B: QueryBuilder>(query: &mut B, clause: &FilterClause) {
    let Some(attribute) = clause.attribute.as_deref() else {
        tracing::debug!(query_type = %clause.query_type, "Clause without attribute, skipping");
        return;
    };

    if clause.query_type.is_in() {
        query.where_in(
            clause.query_type,
            attribute,
            clause.resolve_value().into_list(),
        );
    } else {
        query.where_basic(
            clause.query_type,
            attribute,
            clause.bound_operator(),
            clause.resolve_value(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::config::FilterConfig;
    use crate::data::query::SqlQuery;
    use crate::data::schema::{Catalog, SchemaCapability};
    use crate::filters::input::QueryInput;
    use crate::filters::types::FilterOperator;
    use crate::testing::blog_catalog;

    /// Builder that records every call as a readable line
    struct Recorder {
        model: String,
        relation_query: bool,
        calls: Vec<String>,
    }

    impl Recorder {
        fn root(model: &str) -> Self {
            Self {
                model: model.to_string(),
                relation_query: false,
                calls: Vec::new(),
            }
        }

        fn eager(model: &str) -> Self {
            Self {
                relation_query: true,
                ..Self::root(model)
            }
        }
    }

    impl QueryBuilder for Recorder {
        fn model(&self) -> &str {
            &self.model
        }

        fn is_relation_query(&self) -> bool {
            self.relation_query
        }

        fn where_basic(
            &mut self,
            query_type: QueryType,
            column: &str,
            operator: &'static str,
            value: Value,
        ) {
            self.calls
                .push(format!("{} {} {} {:?}", query_type, column, operator, value));
        }

        fn where_in(&mut self, query_type: QueryType, column: &str, values: Vec<Value>) {
            self.calls
                .push(format!("{} {} {:?}", query_type, column, values));
        }

        fn has(&mut self, relation: &str) {
            self.calls.push(format!("has {}", relation));
        }

        fn doesnt_have(&mut self, relation: &str) {
            self.calls.push(format!("doesntHave {}", relation));
        }

        fn relation_query(&self, relation: &str) -> Self {
            let target = blog_catalog()
                .resolve_relation_target(&self.model, relation)
                .map(str::to_string)
                .unwrap_or_else(|| relation.to_string());
            Self::root(&target)
        }

        fn where_has(&mut self, relation: &str, constraint: Self) {
            self.calls.push(format!(
                "whereHas {} [{}]",
                relation,
                constraint.calls.join("; ")
            ));
        }
    }

    fn resolver<'c>(catalog: &'c Catalog, query: &str) -> FilterResolver<'c> {
        let config = FilterConfig::default();
        let input = QueryInput::from_query_str(query, &config).unwrap();
        FilterResolver::new(catalog, "users", &input, &config).unwrap()
    }

    fn bound(query: &str) -> Vec<String> {
        let catalog = blog_catalog();
        resolver(&catalog, query).apply(Recorder::root("users")).calls
    }

    #[test]
    fn binds_plain_where() {
        assert_eq!(
            bound("filter[name]=Bob"),
            vec![r#"where name = String("Bob")"#]
        );
        assert_eq!(
            bound("filter[age][or][ge]=18"),
            vec!["orWhere age >= Int(18)"]
        );
    }

    #[test]
    fn binds_pattern_operators_with_wrapped_values() {
        assert_eq!(
            bound("filter[name][starts_with]=Bo"),
            vec![r#"where name LIKE String("Bo%")"#]
        );
    }

    #[test]
    fn binds_in_variants_with_lists() {
        assert_eq!(
            bound("filter[name][not_equals][]=Bob&filter[name][not_equals][]=Al"),
            vec![r#"whereNotIn name [String("Bob"), String("Al")]"#]
        );
    }

    #[test]
    fn not_equals_binds_equality_under_where_not() {
        assert_eq!(
            bound("filter[name][not_equals]=Bob"),
            vec![r#"whereNot name = String("Bob")"#]
        );
    }

    #[test]
    fn binds_relation_existence() {
        assert_eq!(
            bound("filter[posts]=1&filter[profile]=0"),
            vec!["has posts", "doesntHave profile"]
        );
    }

    #[test]
    fn relation_clauses_each_get_their_own_sub_query() {
        assert_eq!(
            bound("filter[posts.title]=Hi&filter[posts.votes][gt]=3"),
            vec![
                r#"whereHas posts [where title = String("Hi")]"#,
                "whereHas posts [where votes > Int(3)]",
            ]
        );
    }

    #[test]
    fn binds_root_and_relation_scopes() {
        assert_eq!(
            bound("filter[name][verified]=1&filter[posts][published]=1"),
            vec![
                "whereNot email_verified_at = Null",
                "whereHas posts [where published = Bool(true)]",
            ]
        );
    }

    #[test]
    fn binding_twice_gives_identical_queries() {
        let catalog = blog_catalog();
        let resolver = resolver(
            &catalog,
            "filter[name]=Bob&filter[posts.title]=Hi&filter[profile]=1&filter[posts][published]=1",
        );

        let first = resolver.apply(SqlQuery::new(&catalog, "users"));
        let second = resolver.apply(SqlQuery::new(&catalog, "users"));
        assert_eq!(first, second);
        assert_eq!(first.to_sql(), second.to_sql());
    }

    #[test]
    fn pattern_values_render_with_escape_clause() {
        let catalog = blog_catalog();
        let resolver = resolver(&catalog, "filter[name][search]=100%25_off");
        let (sql, params) = resolver.apply(SqlQuery::new(&catalog, "users")).to_sql();
        assert_eq!(sql, "SELECT * FROM users WHERE users.name LIKE ? ESCAPE '\\'");
        assert_eq!(params, vec![Value::String("%100\\%\\_off%".into())]);
    }

    #[test]
    fn programmatic_scope_unknown_on_model_is_ignored() {
        let catalog = blog_catalog();
        let mut resolver = resolver(&catalog, "");
        resolver.add_scope(ScopeCall {
            name: "archived".into(),
            value: Value::Bool(true),
            relation: None,
        });
        resolver.add_scope(ScopeCall {
            name: "archived".into(),
            value: Value::Bool(true),
            relation: Some("posts".into()),
        });
        assert!(resolver.apply(Recorder::root("users")).calls.is_empty());
    }

    #[test]
    fn relation_query_keeps_matching_clauses_only() {
        let catalog = blog_catalog();
        let resolver = resolver(
            &catalog,
            "filter[name]=Bob&filter[posts.title][or.equals]=Hi\
             &filter[posts.comments.body]=x&filter[posts][published]=1",
        );

        let posts = resolver.apply(Recorder::eager("posts")).calls;
        assert_eq!(
            posts,
            vec![
                r#"orWhere title = String("Hi")"#,
                "where published = Bool(true)",
            ]
        );

        let comments = resolver.apply(Recorder::eager("comments")).calls;
        assert_eq!(comments, vec![r#"where body = String("x")"#]);
    }

    #[test]
    fn bind_accepts_foreign_clauses() {
        let catalog = blog_catalog();
        let resolver = resolver(&catalog, "filter[name]=Bob");
        let extra = vec![ClauseEntry::Clause(
            FilterClause::new(QueryType::Where, Value::Int(7))
                .attribute("id")
                .operator(FilterOperator::Gt),
        )];
        let calls = resolver.bind(Recorder::root("users"), &extra).calls;
        assert_eq!(calls, vec!["where id > Int(7)"]);
    }

    #[test]
    fn clause_without_attribute_or_relation_is_skipped() {
        let catalog = blog_catalog();
        let resolver = resolver(&catalog, "");
        let extra = vec![ClauseEntry::Clause(FilterClause::new(
            QueryType::Where,
            Value::Int(1),
        ))];
        assert!(resolver.bind(Recorder::root("users"), &extra).calls.is_empty());
    }
}

//! Filter resolution
//!
//! [`FilterResolver`] turns the `filter` parameter of one request into an
//! ordered clause set. All validation happens in [`FilterResolver::new`];
//! binding (see `bind.rs`) never fails.

use crate::core::config::FilterConfig;
use crate::core::constants::{
    FILTER_PARAM, OR_MARKER, PATH_SEPARATOR, TYPO_FILTER_PARAM,
};
use crate::data::schema::SchemaCapability;

use super::cast::{cast, cast_bool};
use super::error::FilterError;
use super::input::{Node, QueryInput};
use super::types::{ClauseEntry, FilterClause, FilterOperator, QueryType, ScopeCall, Value};

const EQUALS: &str = "equals";

/// What an operator token resolved to
enum ResolvedOperator {
    Operator(FilterOperator),
    Scope(String),
}

/// Request-scoped filter engine for one root model
pub struct FilterResolver<'s> {
    pub(super) schema: &'s dyn SchemaCapability,
    pub(super) model: String,
    clauses: Vec<ClauseEntry>,
    has_filter: bool,
}

impl<'s> FilterResolver<'s> {
    /// Parse and validate the filter input for `model`.
    ///
    /// Fails on the first invalid entry; no partial clause set is exposed.
    pub fn new(
        schema: &'s dyn SchemaCapability,
        model: &str,
        input: &QueryInput,
        config: &FilterConfig,
    ) -> Result<Self, FilterError> {
        if input.get(TYPO_FILTER_PARAM).is_some_and(|n| !n.is_blank()) {
            return Err(FilterError::MalformedParameter {
                parameter: TYPO_FILTER_PARAM.to_string(),
            });
        }

        let mut resolver = Self {
            schema,
            model: model.to_string(),
            clauses: Vec::new(),
            has_filter: false,
        };

        let filters = match input.get(FILTER_PARAM) {
            Some(Node::Map(entries)) if !entries.is_empty() => entries,
            Some(node) if !node.is_blank() => {
                let suffix = if matches!(node, Node::List(_)) { "[]" } else { "" };
                return Err(FilterError::MalformedFilter {
                    parameter: format!("{}{}={}", FILTER_PARAM, suffix, node.display_value()),
                });
            }
            _ => return Ok(resolver),
        };
        resolver.has_filter = true;

        let normalized: Vec<(&str, Vec<(String, Node)>)> = filters
            .iter()
            .map(|(key, set)| (key.as_str(), normalize(set)))
            .collect();

        let count: usize = normalized.iter().map(|(_, set)| set.len()).sum();
        if count > config.max_filters {
            return Err(FilterError::TooManyFilters {
                max: config.max_filters,
            });
        }

        for (key, set) in normalized {
            resolver.resolve_key(key, set)?;
        }

        tracing::debug!(
            model = %resolver.model,
            clauses = resolver.clauses.len(),
            "Resolved filters"
        );
        Ok(resolver)
    }

    /// Whether the request carried a `filter` parameter
    pub fn has_filter(&self) -> bool {
        self.has_filter
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The resolved clause set, in insertion order
    pub fn clauses(&self) -> &[ClauseEntry] {
        &self.clauses
    }

    /// Append a clause, e.g. a primary key lookup for a single resource
    pub fn add_clause(&mut self, clause: FilterClause) -> &mut Self {
        self.clauses.push(ClauseEntry::Clause(clause));
        self
    }

    /// Append a scope invocation. A scope with the same name and relation
    /// replaces the value of the existing entry in place.
    pub fn add_scope(&mut self, scope: ScopeCall) -> &mut Self {
        let existing = self.clauses.iter_mut().find_map(|entry| match entry {
            ClauseEntry::Scope(s) if s.name == scope.name && s.relation == scope.relation => Some(s),
            _ => None,
        });
        match existing {
            Some(existing) => existing.value = scope.value,
            None => self.clauses.push(ClauseEntry::Scope(scope)),
        }
        self
    }

    /// Attribute clauses scoped to a relation; all relations when `relation`
    /// is `None`
    pub fn relations(&self, relation: Option<&str>) -> Vec<&FilterClause> {
        self.clauses
            .iter()
            .filter_map(|entry| match entry {
                ClauseEntry::Clause(clause) => Some(clause),
                ClauseEntry::Scope(_) => None,
            })
            .filter(|clause| clause.attribute.is_some())
            .filter(|clause| match (relation, clause.relation.as_deref()) {
                (Some(wanted), Some(actual)) => wanted == actual,
                (None, Some(_)) => true,
                (_, None) => false,
            })
            .collect()
    }

    /// Key columns a sparse fieldset must select so relation joins resolve.
    ///
    /// Returns `(resource, column)` pairs where the root resource is the
    /// model name and related resources are named by their relation path.
    pub fn required_keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<(String, String)> = Vec::new();
        let mut push = |resource: &str, column: String| {
            if !keys.iter().any(|(r, c)| r == resource && *c == column) {
                keys.push((resource.to_string(), column));
            }
        };

        let relations = self.clauses.iter().filter_map(|entry| match entry {
            ClauseEntry::Clause(clause) => clause.relation.as_deref(),
            ClauseEntry::Scope(scope) => scope.relation.as_deref(),
        });

        for path in relations {
            let mut parent_model = self.model.as_str();
            let mut parent_resource = self.model.clone();
            let mut resource = String::new();
            for segment in path.split(PATH_SEPARATOR) {
                let Some(relation) = self.schema.relation(parent_model, segment) else {
                    break;
                };
                if !resource.is_empty() {
                    resource.push(PATH_SEPARATOR);
                }
                resource.push_str(segment);

                let parent_key = self.schema.key_name(parent_model).unwrap_or("id");
                let related_key = self.schema.key_name(&relation.target).unwrap_or("id");
                let (parent_column, related_column) =
                    relation.join_columns(parent_key, related_key);
                push(&parent_resource, parent_column);
                push(&resource, related_column);

                parent_model = relation.target.as_str();
                parent_resource = resource.clone();
            }
        }
        keys
    }

    fn resolve_key(&mut self, key: &str, set: Vec<(String, Node)>) -> Result<(), FilterError> {
        let (attribute, relation) = self.resolve_attribute_and_relation(key)?;
        tracing::trace!(key, ?attribute, ?relation, "Resolved filter key");

        for (token, raw) in set {
            let (marker, operator_token) = match token.split_once(PATH_SEPARATOR) {
                Some((marker, operator)) => (Some(marker), operator),
                None => (None, token.as_str()),
            };
            let parameter = || {
                let marker = marker.map(|m| format!("{}.", m)).unwrap_or_default();
                format!(
                    "{}[{}][{}{}]={}",
                    FILTER_PARAM,
                    key,
                    marker,
                    operator_token,
                    raw.display_value()
                )
            };

            let value = self.cast_value(&raw, attribute.as_deref(), relation.as_deref());

            let operator = match self.resolve_operator(operator_token, relation.as_deref()) {
                Some(ResolvedOperator::Operator(operator)) => operator,
                Some(ResolvedOperator::Scope(name)) => {
                    tracing::trace!(scope = %name, "Filter resolved to scope");
                    self.add_scope(ScopeCall {
                        name,
                        value,
                        relation: relation.clone(),
                    });
                    continue;
                }
                None => {
                    return Err(FilterError::UnknownOperator {
                        operator: operator_token.to_string(),
                        parameter: parameter(),
                    });
                }
            };

            if attribute.is_none() && relation.is_none() {
                return Err(FilterError::UnknownAttribute {
                    attribute: key.to_string(),
                    parameter: parameter(),
                });
            }

            let Some(query_type) = QueryType::infer(&value, operator, marker) else {
                return Err(match marker {
                    Some(marker) => FilterError::UnknownQueryType {
                        query_type: marker.to_string(),
                        parameter: parameter(),
                    },
                    None => {
                        tracing::error!(parameter = %parameter(), "Query type inference failed");
                        FilterError::QueryTypeInference {
                            parameter: parameter(),
                        }
                    }
                });
            };

            self.clauses.push(ClauseEntry::Clause(FilterClause {
                query_type,
                value,
                relation: relation.clone(),
                attribute: attribute.clone(),
                operator,
            }));
        }
        Ok(())
    }

    /// Split a filter key into `(attribute, relation)`.
    ///
    /// A key naming a relation is an existence test. A dotted key is split on
    /// the last separator into a relation path and an attribute of the
    /// relation's target. Attributes that are not columns resolve to `None`.
    fn resolve_attribute_and_relation(
        &self,
        key: &str,
    ) -> Result<(Option<String>, Option<String>), FilterError> {
        if self.schema.relation_exists(&self.model, key) {
            return Ok((None, Some(key.to_string())));
        }

        let Some((relation, attribute)) = key.rsplit_once(PATH_SEPARATOR) else {
            let attribute = self
                .schema
                .column_exists(&self.model, key)
                .then(|| key.to_string());
            return Ok((attribute, None));
        };

        let Some(owner) = self.schema.resolve_relation_target(&self.model, relation) else {
            return Err(FilterError::InvalidRelation {
                relation: relation.to_string(),
                parameter: format!("{}[{}]", FILTER_PARAM, key),
            });
        };
        let attribute = self
            .schema
            .column_exists(owner, attribute)
            .then(|| attribute.to_string());
        Ok((attribute, Some(relation.to_string())))
    }

    /// Model owning the attribute or scope: the relation target, or the root
    pub(super) fn owner<'a>(&'a self, relation: Option<&str>) -> &'a str {
        relation
            .and_then(|r| self.schema.resolve_relation_target(&self.model, r))
            .unwrap_or(&self.model)
    }

    fn resolve_operator(&self, token: &str, relation: Option<&str>) -> Option<ResolvedOperator> {
        if let Some(operator) = FilterOperator::from_token(token) {
            return Some(ResolvedOperator::Operator(operator));
        }
        self.schema
            .scope_exists(self.owner(relation), token)
            .then(|| ResolvedOperator::Scope(token.to_string()))
    }

    fn cast_value(&self, raw: &Node, attribute: Option<&str>, relation: Option<&str>) -> Value {
        match attribute {
            None if relation.is_some() => cast_bool(raw),
            None => cast(raw, None),
            Some(attribute) => cast(
                raw,
                self.schema
                    .declared_cast_type(self.owner(relation), attribute),
            ),
        }
    }
}

/// Rewrite shorthand into explicit `operator -> value` entries.
///
/// A bare scalar or list becomes `equals`. Numeric keys and `equals` merge
/// into one `equals` entry. An `or` bucket becomes `or.equals` when it holds a
/// value, or `or.<op>` for each of its entries when it holds operators.
/// Normalized entries come first, followed by the rest in input order.
fn normalize(set: &Node) -> Vec<(String, Node)> {
    let Node::Map(entries) = set else {
        return vec![(EQUALS.to_string(), set.clone())];
    };

    let mut or_entries = Vec::new();
    let mut equals = Vec::new();
    let mut rest = Vec::new();

    for (key, node) in entries {
        if key == OR_MARKER {
            for (token, value) in normalize(node) {
                or_entries.push((format!("{}{}{}", OR_MARKER, PATH_SEPARATOR, token), value));
            }
        } else if key == EQUALS || is_numeric(key) {
            equals.push(node.clone());
        } else {
            rest.push((key.clone(), node.clone()));
        }
    }

    let mut normalized = or_entries;
    if !equals.is_empty() {
        normalized.push((EQUALS.to_string(), merge_values(equals)));
    }
    normalized.extend(rest);
    normalized
}

/// One value stays as is, several are collected into a flat list
fn merge_values(mut values: Vec<Node>) -> Node {
    if values.len() == 1 {
        return values.remove(0);
    }
    let mut items = Vec::new();
    for value in values {
        match value {
            Node::List(inner) => items.extend(inner),
            other => items.push(other),
        }
    }
    Node::List(items)
}

fn is_numeric(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit())
}

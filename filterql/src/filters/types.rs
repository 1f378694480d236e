//! Filter type definitions
//!
//! Defines the operator and query type catalogs, the typed filter value and
//! the clause descriptors produced by the resolver.

use std::fmt;

use serde::Serialize;

use crate::utils::sql::escape_like_pattern;

/// A cast filter value, ready to be bound onto a query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Loose truthiness, used for relation existence tests
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty() && s != "0",
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Convert into a list of values; scalars become a single element list
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Self::List(items) => items,
            other => vec![other],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "{}", s),
            Self::List(items) => {
                let joined: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

/// Comparison and match operators accepted in `filter[path][operator]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Lt,
    Gt,
    Le,
    Ge,
    StartsWith,
    EndsWith,
    Search,
}

impl FilterOperator {
    pub const ALL: [Self; 9] = [
        Self::Equals,
        Self::NotEquals,
        Self::Lt,
        Self::Gt,
        Self::Le,
        Self::Ge,
        Self::StartsWith,
        Self::EndsWith,
        Self::Search,
    ];

    /// Look up an operator by its wire token.
    ///
    /// `lq` is accepted as a legacy spelling of `le`, `contains` as an alias
    /// of `search`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "equals" => Some(Self::Equals),
            "not_equals" => Some(Self::NotEquals),
            "lt" => Some(Self::Lt),
            "gt" => Some(Self::Gt),
            "le" | "lq" => Some(Self::Le),
            "ge" => Some(Self::Ge),
            "starts_with" => Some(Self::StartsWith),
            "ends_with" => Some(Self::EndsWith),
            "search" | "contains" => Some(Self::Search),
            _ => None,
        }
    }

    /// Canonical wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Le => "le",
            Self::Ge => "ge",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Search => "search",
        }
    }

    /// Relational operator used when binding
    pub fn to_operator(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::StartsWith | Self::EndsWith | Self::Search => "LIKE",
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::StartsWith | Self::EndsWith | Self::Search)
    }

    /// Wrap a value in the LIKE pattern for this operator
    fn wrap(&self, value: &str) -> String {
        let escaped = escape_like_pattern(value);
        match self {
            Self::StartsWith => format!("{}%", escaped),
            Self::EndsWith => format!("%{}", escaped),
            Self::Search => format!("%{}%", escaped),
            _ => value.to_string(),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Clause combinators, named after the query builder method they map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryType {
    Where,
    OrWhere,
    WhereNot,
    OrWhereNot,
    WhereIn,
    OrWhereIn,
    WhereNotIn,
    OrWhereNotIn,
}

impl QueryType {
    pub const ALL: [Self; 8] = [
        Self::Where,
        Self::OrWhere,
        Self::WhereNot,
        Self::OrWhereNot,
        Self::WhereIn,
        Self::OrWhereIn,
        Self::WhereNotIn,
        Self::OrWhereNotIn,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "where" => Some(Self::Where),
            "orWhere" => Some(Self::OrWhere),
            "whereNot" => Some(Self::WhereNot),
            "orWhereNot" => Some(Self::OrWhereNot),
            "whereIn" => Some(Self::WhereIn),
            "orWhereIn" => Some(Self::OrWhereIn),
            "whereNotIn" => Some(Self::WhereNotIn),
            "orWhereNotIn" => Some(Self::OrWhereNotIn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Where => "where",
            Self::OrWhere => "orWhere",
            Self::WhereNot => "whereNot",
            Self::OrWhereNot => "orWhereNot",
            Self::WhereIn => "whereIn",
            Self::OrWhereIn => "orWhereIn",
            Self::WhereNotIn => "whereNotIn",
            Self::OrWhereNotIn => "orWhereNotIn",
        }
    }

    /// Compose the combinator token from its parts and look it up.
    ///
    /// The token grammar is `[<marker>]where[Not][In]`: an explicit marker
    /// (only `or` is known) prefixes the token, a not-equals operator adds
    /// `Not` and a list value adds `In`. Returns `None` when the composed
    /// token is not in the catalog.
    pub fn infer(value: &Value, operator: FilterOperator, marker: Option<&str>) -> Option<Self> {
        let mut token = match marker {
            Some(marker) => format!("{}Where", marker),
            None => "where".to_string(),
        };
        if operator == FilterOperator::NotEquals {
            token.push_str("Not");
        }
        if value.is_list() {
            token.push_str("In");
        }
        Self::from_token(&token)
    }

    pub fn is_or(&self) -> bool {
        matches!(
            self,
            Self::OrWhere | Self::OrWhereNot | Self::OrWhereIn | Self::OrWhereNotIn
        )
    }

    pub fn is_not(&self) -> bool {
        matches!(
            self,
            Self::WhereNot | Self::OrWhereNot | Self::WhereNotIn | Self::OrWhereNotIn
        )
    }

    pub fn is_in(&self) -> bool {
        matches!(
            self,
            Self::WhereIn | Self::OrWhereIn | Self::WhereNotIn | Self::OrWhereNotIn
        )
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One resolved filter condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterClause {
    pub query_type: QueryType,
    pub value: Value,
    /// Dotted relation path from the root model
    pub relation: Option<String>,
    /// Verified column on the owning model; `None` with a relation set means
    /// the clause tests relation existence
    pub attribute: Option<String>,
    pub operator: FilterOperator,
}

impl FilterClause {
    pub fn new(query_type: QueryType, value: Value) -> Self {
        Self {
            query_type,
            value,
            relation: None,
            attribute: None,
            operator: FilterOperator::Equals,
        }
    }

    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    pub fn operator(mut self, operator: FilterOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn is_relation_existence(&self) -> bool {
        self.relation.is_some() && self.attribute.is_none()
    }

    /// The value to bind: pattern operators wrap (each element of) the value
    /// in `%` markers, everything else passes through. An empty value wraps
    /// as the empty string, so `search` binds `%%`.
    pub fn resolve_value(&self) -> Value {
        if !self.operator.is_pattern() {
            return self.value.clone();
        }
        let wrap = |value: &Value| match value {
            Value::Null => Value::String(self.operator.wrap("")),
            other => Value::String(self.operator.wrap(&other.to_string())),
        };
        match &self.value {
            Value::List(items) => Value::List(items.iter().map(wrap).collect()),
            other => wrap(other),
        }
    }

    /// The relational operator to bind.
    ///
    /// Negated combinators already carry the negation, so a not-equals clause
    /// under `whereNot` binds `=`.
    pub fn bound_operator(&self) -> &'static str {
        if self.query_type.is_not() && self.operator == FilterOperator::NotEquals {
            FilterOperator::Equals.to_operator()
        } else {
            self.operator.to_operator()
        }
    }
}

/// A named scope invocation (`filter[path][<scope>]=value`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeCall {
    pub name: String,
    pub value: Value,
    /// Relation the scope was resolved on, `None` for the root model
    pub relation: Option<String>,
}

/// An entry of the clause set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClauseEntry {
    Clause(FilterClause),
    Scope(ScopeCall),
}

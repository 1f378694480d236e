//! Filter resolution errors
//!
//! Every variant is user facing: it carries a title, a description (the
//! `Display` output), the offending parameter and an HTTP status.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A sibling `filters` parameter was passed
    #[error("An unknown parameter with the name 'filters' was passed. Did you mean 'filter'?")]
    MalformedParameter { parameter: String },

    /// The `filter` parameter carries a value instead of keyed entries
    #[error("The filter parameter must be keyed by attribute, e.g. filter[name]=value.")]
    MalformedFilter { parameter: String },

    /// A relation segment of a dotted path does not resolve
    #[error("A non-existing relationship was requested: {relation}")]
    InvalidRelation { relation: String, parameter: String },

    /// The operator matches neither the catalog nor a scope
    #[error("An invalid operator '{operator}' was used on a filter in the query.")]
    UnknownOperator { operator: String, parameter: String },

    /// An explicit query type does not combine into a known combinator
    #[error("An invalid query type '{query_type}' was used on a filter in the query.")]
    UnknownQueryType {
        query_type: String,
        parameter: String,
    },

    /// A standard operator was used on a key that is neither a column nor a relation
    #[error("An unknown attribute '{attribute}' was used on a filter in the query.")]
    UnknownAttribute { attribute: String, parameter: String },

    /// Query type inference failed without an explicit query type
    #[error("The query type could not be determined for the query.")]
    QueryTypeInference { parameter: String },

    #[error("Maximum {max} filters allowed")]
    TooManyFilters { max: usize },

    #[error("Parameter nesting exceeds the maximum depth of {max}")]
    NestingTooDeep { max: usize, parameter: String },

    #[error("Query string exceeds maximum size of {max} bytes")]
    InputTooLarge { max: usize },
}

impl FilterError {
    /// Short human readable title
    pub fn title(&self) -> &'static str {
        match self {
            Self::MalformedParameter { .. } => "Typo in filter parameter",
            Self::MalformedFilter { .. } => "Malformed filter parameter",
            Self::QueryTypeInference { .. } => "Server error",
            _ => "Invalid request",
        }
    }

    /// Stable machine readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedParameter { .. } => "MALFORMED_PARAMETER",
            Self::MalformedFilter { .. } => "MALFORMED_FILTER",
            Self::InvalidRelation { .. } => "INVALID_RELATION",
            Self::UnknownOperator { .. } => "UNKNOWN_OPERATOR",
            Self::UnknownQueryType { .. } => "UNKNOWN_QUERY_TYPE",
            Self::UnknownAttribute { .. } => "UNKNOWN_ATTRIBUTE",
            Self::QueryTypeInference { .. } => "QUERY_TYPE_INFERENCE",
            Self::TooManyFilters { .. } => "TOO_MANY_FILTERS",
            Self::NestingTooDeep { .. } => "NESTING_TOO_DEEP",
            Self::InputTooLarge { .. } => "INPUT_TOO_LARGE",
        }
    }

    /// The offending parameter, e.g. `filter[posts.title][gt]=1`
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::MalformedParameter { parameter }
            | Self::MalformedFilter { parameter }
            | Self::InvalidRelation { parameter, .. }
            | Self::UnknownOperator { parameter, .. }
            | Self::UnknownQueryType { parameter, .. }
            | Self::UnknownAttribute { parameter, .. }
            | Self::QueryTypeInference { parameter }
            | Self::NestingTooDeep { parameter, .. } => Some(parameter),
            Self::TooManyFilters { .. } | Self::InputTooLarge { .. } => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::QueryTypeInference { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

//! Filter resolution engine for REST list endpoints
//!
//! Parses `filter[...]` query parameters, resolves them against a model
//! schema into typed clauses and binds those onto a query builder.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod filters;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

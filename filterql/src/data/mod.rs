//! Schema metadata and query rendering

pub mod query;
pub mod schema;

pub use query::SqlQuery;
pub use schema::{Catalog, ModelDefinition, Relation, RelationKind, SchemaCapability};

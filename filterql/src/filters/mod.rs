//! Filter resolution for REST list endpoints
//!
//! Turns `filter[<path>][<queryType>.<operator>]=<value>` parameters into
//! typed clauses and binds them onto a [`QueryBuilder`].
//!
//! Input shapes:
//! - `filter[name]=Bob` (implicit `equals`)
//! - `filter[age][gt]=30`
//! - `filter[name][or]=Bob` / `filter[name][or.equals]=Bob`
//! - `filter[tags][]=a&filter[tags][]=b` (list values use `IN`)
//! - `filter[posts.title][search]=rust` (relation attribute)
//! - `filter[posts]=1` (relation existence)
//! - `filter[posts][published]=1` (model scope)

mod bind;
pub mod cast;
pub mod error;
pub mod input;
mod resolver;
pub mod types;

pub use bind::QueryBuilder;
pub use cast::CastType;
pub use error::FilterError;
pub use input::{Node, QueryInput};
pub use resolver::FilterResolver;
pub use types::{ClauseEntry, FilterClause, FilterOperator, QueryType, ScopeCall, Value};

//! HTTP-facing pieces: request extraction, sparse fieldsets and error responses

pub mod extractors;
pub mod fields;
pub mod types;

pub use extractors::FilterQuery;
pub use fields::Fieldset;
pub use types::ApiError;

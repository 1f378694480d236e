//! Request extractors for filterable endpoints

use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::core::config::FilterConfig;
use crate::filters::QueryInput;

use super::types::ApiError;

/// Parsed query string of a filterable request.
///
/// Limits come from a [`FilterConfig`] request extension when one is
/// installed (e.g. via `Extension` layer), the defaults otherwise. Input that
/// breaks a limit is rejected with a 400.
#[derive(Debug, Clone)]
pub struct FilterQuery(pub QueryInput);

impl Deref for FilterQuery {
    type Target = QueryInput;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for FilterQuery
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let config = parts
            .extensions
            .get::<FilterConfig>()
            .copied()
            .unwrap_or_default();
        let raw = parts.uri.query().unwrap_or_default();
        let input = QueryInput::from_query_str(raw, &config)?;
        Ok(Self(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    use crate::filters::Node;

    async fn extract(request: Request<Body>) -> Result<FilterQuery, ApiError> {
        let (mut parts, _) = request.into_parts();
        FilterQuery::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_filter_tree() {
        let request = Request::builder()
            .uri("/users?filter%5Bname%5D=Bob&filter%5Bage%5D%5Bgt%5D=30")
            .body(Body::empty())
            .unwrap();
        let query = extract(request).await.unwrap();

        let filter = query.get("filter").unwrap();
        assert_eq!(filter.get("name"), Some(&Node::Scalar("Bob".into())));
    }

    #[tokio::test]
    async fn test_missing_query_is_empty() {
        let request = Request::builder().uri("/users").body(Body::empty()).unwrap();
        let query = extract(request).await.unwrap();
        assert!(query.get("filter").is_none());
    }

    #[tokio::test]
    async fn test_uses_config_extension() {
        let mut request = Request::builder()
            .uri("/users?filter%5Ba%5D%5Bb%5D%5Bc%5D=1")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(FilterConfig {
            max_depth: 2,
            ..Default::default()
        });

        let err = extract(request).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body()["code"], "NESTING_TOO_DEEP");
    }
}

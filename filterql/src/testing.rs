//! Shared test fixtures

use crate::data::schema::{Catalog, ModelDefinition, Relation};
use crate::filters::{CastType, QueryType, Value};

/// Users with posts, comments and a profile
pub fn blog_catalog() -> Catalog {
    let mut catalog = Catalog::new()
        .with_model(
            "users",
            ModelDefinition::new("users")
                .columns(["id", "name", "email", "age", "active", "tags", "email_verified_at"])
                .cast("id", CastType::Int)
                .cast("age", CastType::Int)
                .cast("active", CastType::Bool)
                .relation("posts", Relation::has_many("posts", "user_id"))
                .relation("profile", Relation::has_one("profiles", "user_id")),
        )
        .with_model(
            "posts",
            ModelDefinition::new("posts")
                .columns(["id", "user_id", "title", "votes", "published"])
                .cast("votes", CastType::Int)
                .cast("published", CastType::Bool)
                .relation("author", Relation::belongs_to("users", "user_id"))
                .relation("comments", Relation::has_many("comments", "post_id")),
        )
        .with_model(
            "comments",
            ModelDefinition::new("comments")
                .columns(["id", "post_id", "body", "approved"])
                .cast("approved", CastType::Bool),
        )
        .with_model(
            "profiles",
            ModelDefinition::new("profiles").columns(["id", "user_id", "bio"]),
        );

    catalog
        .register_scope("users", "verified", |query, value| {
            let query_type = if value.is_truthy() {
                QueryType::WhereNot
            } else {
                QueryType::Where
            };
            query.where_basic(query_type, "email_verified_at", "=", Value::Null);
        })
        .register_scope("posts", "published", |query, value| {
            query.where_basic(
                QueryType::Where,
                "published",
                "=",
                Value::Bool(value.is_truthy()),
            );
        });
    catalog
}

//! Value casting
//!
//! Converts raw request values into typed [`Value`]s according to the
//! attribute's declared cast type.

use serde::{Deserialize, Serialize};

use super::input::Node;
use super::types::Value;

/// Declared attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "real", alias = "double", alias = "decimal")]
    Float,
    String,
    /// Comma separated scalars are split into a list
    #[serde(alias = "json", alias = "collection")]
    Array,
}

/// Cast a raw node, using identity casting when no type is declared.
///
/// Lists are cast element-wise. Numeric casts that fail keep the raw string.
pub fn cast(raw: &Node, cast_type: Option<CastType>) -> Value {
    match raw {
        Node::Null => Value::Null,
        Node::List(items) => Value::List(items.iter().map(|n| cast(n, cast_type)).collect()),
        Node::Map(entries) => Value::List(entries.iter().map(|(_, n)| cast(n, cast_type)).collect()),
        Node::Scalar(s) => cast_scalar(s, cast_type),
    }
}

/// Cast a raw node to a boolean (relation existence tests)
pub fn cast_bool(raw: &Node) -> Value {
    cast(raw, Some(CastType::Bool))
}

fn cast_scalar(s: &str, cast_type: Option<CastType>) -> Value {
    match cast_type {
        None | Some(CastType::String) => Value::String(s.to_string()),
        Some(CastType::Bool) => Value::Bool(parse_bool(s)),
        Some(CastType::Int) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(f) = trimmed.parse::<f64>() {
                Value::Float(f)
            } else {
                tracing::debug!(value = %s, "Value is not an integer, keeping string");
                Value::String(s.to_string())
            }
        }
        Some(CastType::Float) => match s.trim().parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => {
                tracing::debug!(value = %s, "Value is not a number, keeping string");
                Value::String(s.to_string())
            }
        },
        Some(CastType::Array) => Value::List(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: &str) -> Node {
        Node::Scalar(s.to_string())
    }

    #[test]
    fn identity_cast_keeps_strings() {
        assert_eq!(cast(&scalar("42"), None), Value::String("42".into()));
        assert_eq!(cast(&Node::Null, None), Value::Null);
    }

    #[test]
    fn bool_cast() {
        for truthy in ["1", "true", "TRUE", "yes", "on"] {
            assert_eq!(cast_bool(&scalar(truthy)), Value::Bool(true), "{}", truthy);
        }
        for falsy in ["0", "false", "no", "off", "maybe"] {
            assert_eq!(cast_bool(&scalar(falsy)), Value::Bool(false), "{}", falsy);
        }
    }

    #[test]
    fn numeric_casts() {
        assert_eq!(cast(&scalar("42"), Some(CastType::Int)), Value::Int(42));
        assert_eq!(cast(&scalar("4.5"), Some(CastType::Int)), Value::Float(4.5));
        assert_eq!(cast(&scalar("4.5"), Some(CastType::Float)), Value::Float(4.5));
        assert_eq!(
            cast(&scalar("abc"), Some(CastType::Int)),
            Value::String("abc".into())
        );
    }

    #[test]
    fn lists_cast_element_wise() {
        let raw = Node::List(vec![scalar("1"), scalar("2")]);
        assert_eq!(
            cast(&raw, Some(CastType::Int)),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn array_cast_splits_commas() {
        assert_eq!(
            cast(&scalar("a, b,,c"), Some(CastType::Array)),
            Value::List(vec![
                Value::String("a".into()),
                Value::String("b".into()),
                Value::String("c".into())
            ])
        );
    }

    #[test]
    fn cast_type_aliases() {
        let parsed: Vec<CastType> =
            serde_json::from_str(r#"["boolean", "integer", "decimal", "string", "json"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                CastType::Bool,
                CastType::Int,
                CastType::Float,
                CastType::String,
                CastType::Array
            ]
        );
    }
}

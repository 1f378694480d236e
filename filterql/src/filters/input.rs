//! Raw request input
//!
//! Parses bracketed query parameters (`filter[posts.title][search]=rust`) or a
//! JSON payload into a tree whose nodes are explicitly classified as scalar,
//! list or ordered map. Normalization and resolution only ever see this tree.

use percent_encoding::percent_decode_str;

use crate::core::config::FilterConfig;

use super::error::FilterError;

/// One node of the parsed input tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Missing or empty value (`filter[name]=`)
    Null,
    Scalar(String),
    List(Vec<Node>),
    /// Ordered key/value pairs; keys keep their first insertion position
    Map(Vec<(String, Node)>),
}

impl Node {
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// True when the node carries no value at any depth
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Scalar(s) => s.is_empty(),
            Self::List(items) => items.iter().all(Node::is_blank),
            Self::Map(entries) => entries.iter().all(|(_, v)| v.is_blank()),
        }
    }

    /// Short rendering of the value for error messages; lists show their
    /// first element
    pub fn display_value(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Scalar(s) => s.clone(),
            Self::List(items) => items.first().map(Node::display_value).unwrap_or_default(),
            Self::Map(entries) => entries
                .first()
                .map(|(_, v)| v.display_value())
                .unwrap_or_default(),
        }
    }

    fn depth(&self) -> usize {
        match self {
            Self::Null | Self::Scalar(_) => 0,
            Self::List(items) => 1 + items.iter().map(Node::depth).max().unwrap_or(0),
            Self::Map(entries) => 1 + entries.iter().map(|(_, v)| v.depth()).max().unwrap_or(0),
        }
    }

    /// Insert `value` at `path`, creating intermediate maps.
    ///
    /// An empty segment (`[]`) appends to a list. Inserting a named key into
    /// a list turns it into a map keyed by position.
    fn insert(&mut self, path: &[String], value: Node) {
        let Some((head, rest)) = path.split_first() else {
            *self = value;
            return;
        };

        if head.is_empty() {
            let mut child = Node::Null;
            child.insert(rest, value);
            match self {
                Self::List(items) => items.push(child),
                Self::Map(entries) => {
                    let key = entries.len().to_string();
                    entries.push((key, child));
                }
                _ => *self = Self::List(vec![child]),
            }
            return;
        }

        self.ensure_map();
        let Self::Map(entries) = self else {
            return;
        };
        let index = match entries.iter().position(|(k, _)| k == head) {
            Some(index) => index,
            None => {
                entries.push((head.clone(), Node::Null));
                entries.len() - 1
            }
        };
        entries[index].1.insert(rest, value);
    }

    /// Turn the node into a map; list items are keyed by position and
    /// scalars are dropped
    fn ensure_map(&mut self) {
        if matches!(self, Self::Map(_)) {
            return;
        }
        let entries = match std::mem::replace(self, Self::Null) {
            Self::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, node)| (i.to_string(), node))
                .collect(),
            _ => Vec::new(),
        };
        *self = Self::Map(entries);
    }

    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::String(s) if s.is_empty() => Self::Null,
            serde_json::Value::String(s) => Self::Scalar(s.clone()),
            serde_json::Value::Bool(b) => Self::Scalar(if *b { "1" } else { "0" }.to_string()),
            serde_json::Value::Number(n) => Self::Scalar(n.to_string()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Parsed request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput {
    root: Node,
}

impl Default for QueryInput {
    fn default() -> Self {
        Self {
            root: Node::Map(Vec::new()),
        }
    }
}

impl QueryInput {
    /// Parse a raw (percent-encoded) query string.
    ///
    /// `a[b][c]=v` nests maps, `a[]=v` appends to a list, `+` decodes to a
    /// space and empty values become [`Node::Null`]. A repeated plain key
    /// keeps the last value.
    pub fn from_query_str(raw: &str, config: &FilterConfig) -> Result<Self, FilterError> {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        if raw.len() > config.max_query_length {
            return Err(FilterError::InputTooLarge {
                max: config.max_query_length,
            });
        }

        let mut root = Node::Map(Vec::new());
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(key);
            let Some(path) = split_key(&key) else {
                continue;
            };
            if path.len() > config.max_depth {
                return Err(FilterError::NestingTooDeep {
                    max: config.max_depth,
                    parameter: key,
                });
            }

            let value = decode(value);
            let node = if value.is_empty() {
                Node::Null
            } else {
                Node::Scalar(value)
            };
            root.insert(&path, node);
        }

        tracing::trace!(input = ?root, "Parsed query input");
        Ok(Self { root })
    }

    /// Build the input tree from a JSON object (e.g. a request body)
    pub fn from_json(value: &serde_json::Value, config: &FilterConfig) -> Result<Self, FilterError> {
        let root = match Node::from_json(value) {
            node @ Node::Map(_) => node,
            _ => Node::Map(Vec::new()),
        };
        // The root map itself is one segment deep, like the parameter name
        if root.depth() > config.max_depth {
            return Err(FilterError::NestingTooDeep {
                max: config.max_depth,
                parameter: "(json)".to_string(),
            });
        }
        Ok(Self { root })
    }

    /// Top-level parameter by name
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.root.get(key)
    }
}

fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    percent_decode_str(&s).decode_utf8_lossy().into_owned()
}

/// Split `a[b][c]` into `["a", "b", "c"]`.
///
/// Returns `None` for keys without a name. A key with unbalanced brackets is
/// taken literally as one segment.
fn split_key(key: &str) -> Option<Vec<String>> {
    let Some(open) = key.find('[') else {
        return (!key.is_empty()).then(|| vec![key.to_string()]);
    };
    let base = &key[..open];
    if base.is_empty() {
        return None;
    }

    let mut segments = vec![base.to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return Some(vec![key.to_string()]);
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> QueryInput {
        QueryInput::from_query_str(raw, &FilterConfig::default()).unwrap()
    }

    fn scalar(s: &str) -> Node {
        Node::Scalar(s.to_string())
    }

    #[test]
    fn split_key_segments() {
        assert_eq!(split_key("filter"), Some(vec!["filter".to_string()]));
        assert_eq!(
            split_key("filter[name][or.equals]"),
            Some(vec!["filter".into(), "name".into(), "or.equals".into()])
        );
        assert_eq!(
            split_key("filter[tags][]"),
            Some(vec!["filter".into(), "tags".into(), "".into()])
        );
        assert_eq!(split_key("[name]"), None);
        assert_eq!(split_key(""), None);
        assert_eq!(split_key("filter[name"), Some(vec!["filter[name".into()]));
    }

    #[test]
    fn nested_maps() {
        let input = parse("filter[name]=Bob&filter[age][gt]=30");
        let filter = input.get("filter").unwrap();
        assert_eq!(filter.get("name"), Some(&scalar("Bob")));
        assert_eq!(
            filter.get("age"),
            Some(&Node::Map(vec![("gt".into(), scalar("30"))]))
        );
    }

    #[test]
    fn list_push() {
        let input = parse("filter[tags][or.equals][]=a&filter[tags][or.equals][]=b");
        let tags = input.get("filter").unwrap().get("tags").unwrap();
        assert_eq!(
            tags.get("or.equals"),
            Some(&Node::List(vec![scalar("a"), scalar("b")]))
        );
    }

    #[test]
    fn percent_and_plus_decoding() {
        let input = parse("filter%5Bname%5D=Bob+Smith&filter[city]=S%C3%A3o%20Paulo");
        let filter = input.get("filter").unwrap();
        assert_eq!(filter.get("name"), Some(&scalar("Bob Smith")));
        assert_eq!(filter.get("city"), Some(&scalar("São Paulo")));
    }

    #[test]
    fn empty_values_are_null() {
        let input = parse("filter[name]=&filters");
        assert_eq!(input.get("filter").unwrap().get("name"), Some(&Node::Null));
        assert_eq!(input.get("filters"), Some(&Node::Null));
        assert!(input.get("filters").unwrap().is_blank());
    }

    #[test]
    fn named_key_turns_list_into_map() {
        let input = parse("a[]=x&a[foo]=y");
        assert_eq!(
            input.get("a"),
            Some(&Node::Map(vec![
                ("0".into(), scalar("x")),
                ("foo".into(), scalar("y"))
            ]))
        );
    }

    #[test]
    fn repeated_plain_key_keeps_last() {
        let input = parse("page=1&page=2");
        assert_eq!(input.get("page"), Some(&scalar("2")));
    }

    #[test]
    fn rejects_deep_nesting() {
        let config = FilterConfig {
            max_depth: 3,
            ..Default::default()
        };
        let err = QueryInput::from_query_str("filter[a][b][c]=1", &config).unwrap_err();
        assert_eq!(
            err,
            FilterError::NestingTooDeep {
                max: 3,
                parameter: "filter[a][b][c]".into()
            }
        );
    }

    #[test]
    fn rejects_large_input() {
        let config = FilterConfig {
            max_query_length: 8,
            ..Default::default()
        };
        let err = QueryInput::from_query_str("filter[name]=Bob", &config).unwrap_err();
        assert_eq!(err, FilterError::InputTooLarge { max: 8 });
    }

    #[test]
    fn json_input_matches_query_string() {
        let json = serde_json::json!({
            "filter": { "name": "Bob", "tags": { "or.equals": ["a", "b"] } }
        });
        let from_json = QueryInput::from_json(&json, &FilterConfig::default()).unwrap();
        let from_query =
            parse("filter[name]=Bob&filter[tags][or.equals][]=a&filter[tags][or.equals][]=b");
        assert_eq!(from_json, from_query);
    }

    #[test]
    fn display_value_uses_first_list_element() {
        assert_eq!(Node::List(vec![scalar("a"), scalar("b")]).display_value(), "a");
        assert_eq!(Node::Null.display_value(), "");
    }
}

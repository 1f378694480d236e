//! Sparse fieldsets
//!
//! `fields[users]=name,email&fields[posts]=title` restricts the columns
//! selected per resource. The primary key is always selected, and the filter
//! engine forces the join keys its relation conditions depend on.

use crate::core::constants::FIELDS_PARAM;
use crate::filters::{Node, QueryInput};
use crate::utils::sql::qualify_column;

/// Requested and forced columns per resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fieldset {
    visible: Vec<(String, Vec<String>)>,
    forced: Vec<(String, Vec<String>)>,
}

impl Fieldset {
    /// Read the `fields` parameter. Anything other than `fields[<resource>]`
    /// is ignored.
    pub fn from_input(input: &QueryInput) -> Self {
        let mut fieldset = Self::default();
        let Some(Node::Map(entries)) = input.get(FIELDS_PARAM) else {
            return fieldset;
        };

        for (resource, node) in entries {
            let mut columns = Vec::new();
            collect_columns(node, &mut columns);
            if !columns.is_empty() {
                fieldset.visible.push((resource.clone(), columns));
            }
        }
        fieldset
    }

    /// True when any resource restricts its columns
    pub fn is_restricted(&self) -> bool {
        !self.visible.is_empty()
    }

    /// Requested columns of a resource, `None` when unrestricted
    pub fn visible(&self, resource: &str) -> Option<&[String]> {
        lookup(&self.visible, resource)
    }

    pub fn forced(&self, resource: &str) -> &[String] {
        lookup(&self.forced, resource).unwrap_or_default()
    }

    /// Always select `columns` for `resource`, unless already requested
    pub fn force<I, S>(&mut self, resource: &str, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            let requested = self
                .visible(resource)
                .is_some_and(|v| v.contains(&column));
            if requested || self.forced(resource).contains(&column) {
                continue;
            }
            match self.forced.iter_mut().find(|(r, _)| r == resource) {
                Some((_, forced)) => forced.push(column),
                None => self.forced.push((resource.to_string(), vec![column])),
            }
        }
        self
    }

    /// Columns to select: requested, then the key, then forced columns.
    /// `["*"]` when the resource is not restricted.
    pub fn columns(&self, resource: &str, key: &str) -> Vec<String> {
        let Some(visible) = self.visible(resource) else {
            return vec!["*".to_string()];
        };

        let mut columns: Vec<String> = visible.to_vec();
        for column in std::iter::once(key).chain(self.forced(resource).iter().map(String::as_str)) {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
        columns
    }

    /// [`Fieldset::columns`] prefixed with the resource name
    pub fn qualified(&self, resource: &str, key: &str) -> Vec<String> {
        self.columns(resource, key)
            .iter()
            .map(|column| match column.as_str() {
                "*" => format!("{}.*", resource),
                column => qualify_column(resource, column),
            })
            .collect()
    }
}

fn lookup<'a>(entries: &'a [(String, Vec<String>)], resource: &str) -> Option<&'a [String]> {
    entries
        .iter()
        .find(|(r, _)| r == resource)
        .map(|(_, columns)| columns.as_slice())
}

fn collect_columns(node: &Node, columns: &mut Vec<String>) {
    match node {
        Node::Scalar(s) => {
            for column in s.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }
        Node::List(items) => items.iter().for_each(|n| collect_columns(n, columns)),
        Node::Map(_) | Node::Null => {}
    }
}

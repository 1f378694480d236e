//! SQL utility functions

/// Escape SQL LIKE metacharacters (%, _, \) in user input
///
/// Use this when building LIKE patterns from filter values so that a
/// `search` for `100%` matches the literal text instead of everything.
///
/// # Example
///
/// ```
/// use filterql::utils::sql::escape_like_pattern;
///
/// let user_input = "100% match_test";
/// let pattern = format!("%{}%", escape_like_pattern(user_input));
/// assert_eq!(pattern, "%100\\% match\\_test%");
/// ```
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Qualify a column with a table alias (`alias.column`).
///
/// Columns that are already qualified and the `*` wildcard pass through.
pub fn qualify_column(alias: &str, column: &str) -> String {
    if alias.is_empty() || column == "*" || column.contains('.') {
        column.to_string()
    } else {
        format!("{}.{}", alias, column)
    }
}

/// Render `count` comma separated `?` placeholders
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "filterql";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "filterql.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "FILTERQL_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "FILTERQL_LOG";

// =============================================================================
// Environment Variables - Filter Limits
// =============================================================================

/// Environment variable for the maximum number of filter entries per request
pub const ENV_MAX_FILTERS: &str = "FILTERQL_MAX_FILTERS";

/// Environment variable for the maximum bracket nesting depth of a parameter
pub const ENV_MAX_DEPTH: &str = "FILTERQL_MAX_DEPTH";

/// Environment variable for the maximum raw query string length
pub const ENV_MAX_QUERY_LENGTH: &str = "FILTERQL_MAX_QUERY_LENGTH";

// =============================================================================
// Filter Defaults
// =============================================================================

/// Maximum number of filter entries allowed in one request
pub const DEFAULT_MAX_FILTERS: usize = 50;

/// Maximum number of bracket segments in one parameter (`filter[a][b]` is 3)
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Maximum size of the raw query string in bytes (64KB)
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 64 * 1024;

// =============================================================================
// Request Parameters
// =============================================================================

/// Root parameter holding filter expressions
pub const FILTER_PARAM: &str = "filter";

/// Common misspelling of [`FILTER_PARAM`], rejected when non-empty
pub const TYPO_FILTER_PARAM: &str = "filters";

/// Root parameter holding sparse fieldsets
pub const FIELDS_PARAM: &str = "fields";

/// Query type marker for disjunctive clauses (`filter[name][or.equals]`)
pub const OR_MARKER: &str = "or";

/// Separator between relation path segments and between query type and operator
pub const PATH_SEPARATOR: char = '.';

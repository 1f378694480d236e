use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{ENV_CONFIG, ENV_MAX_DEPTH, ENV_MAX_FILTERS, ENV_MAX_QUERY_LENGTH};

#[derive(Parser)]
#[command(name = "filterql")]
#[command(version, about = "Resolve REST filter query strings against a model schema", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Maximum number of filter entries per request
    #[arg(long, global = true, env = ENV_MAX_FILTERS)]
    pub max_filters: Option<usize>,

    /// Maximum bracket nesting depth of a query parameter
    #[arg(long, global = true, env = ENV_MAX_DEPTH)]
    pub max_depth: Option<usize>,

    /// Maximum raw query string length in bytes
    #[arg(long, global = true, env = ENV_MAX_QUERY_LENGTH)]
    pub max_query_length: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve a query string and print the clauses and rendered SQL
    Explain {
        /// Raw query string, e.g. `filter[name]=Bob&filter[posts.title][search]=rust`
        query: String,

        /// JSON schema catalog describing the models
        #[arg(long, short = 's')]
        schema: PathBuf,

        /// Root model to filter
        #[arg(long, short = 'm')]
        model: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// List the operator and query type catalogs
    Operators,
}

/// Configuration values taken from the command line (with env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub max_filters: Option<usize>,
    pub max_depth: Option<usize>,
    pub max_query_length: Option<usize>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        max_filters: cli.max_filters,
        max_depth: cli.max_depth,
        max_query_length: cli.max_query_length,
    };
    (config, cli.command)
}

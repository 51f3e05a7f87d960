//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Compose HTML pages from reusable fragments
#[derive(Parser, Debug)]
#[command(name = "pagesmith")]
#[command(about = "Compose HTML pages from reusable fragments")]
#[command(version)]
pub struct Args {
    /// Project directory holding pagesmith.toml and the graph definition
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build every head reference into the output directory
    Build {
        /// Output directory (overrides output.directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List, get or set configuration options
    Config {
        /// Dotted option key, or a unique option name
        option: Option<String>,

        /// New value; lists are comma separated
        value: Option<String>,
    },

    /// Manage references
    #[command(name = "ref")]
    Ref {
        #[command(subcommand)]
        action: RefCommand,
    },

    /// Manage mappings
    Map {
        #[command(subcommand)]
        action: MapCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum RefCommand {
    /// Create or update a reference
    Set {
        key: String,

        /// Path type: file or folder
        kind: String,

        /// Path relative to the project directory
        path: PathBuf,

        /// Reference option (can be repeated)
        #[arg(long = "flag")]
        flags: Vec<String>,
    },

    /// Remove a reference
    Remove { key: String },

    /// List references
    List {
        /// Only keys containing this text
        search: Option<String>,

        /// Show paths
        #[arg(short, long)]
        paths: bool,

        /// Show mappings
        #[arg(short, long)]
        mappings: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum MapCommand {
    /// Create or update a mapping
    Set {
        key: String,

        /// Reference receiving content
        consumer: String,

        /// Reference providing content
        contributor: String,

        /// Insertion node search terms (attr=value, name=<tag>)
        #[arg(long = "consumer", num_args = 1.., required = true)]
        consumer_search: Vec<String>,

        /// Extraction node search terms (attr=value, name=<tag>)
        #[arg(long = "contributor", num_args = 1.., required = true)]
        contributor_search: Vec<String>,

        /// Insert the extraction node's children instead of the node
        #[arg(long)]
        unpack: bool,
    },

    /// Remove a mapping
    Remove { key: String },

    /// List mappings
    List {
        /// Only keys containing this text
        search: Option<String>,

        /// Keys only
        #[arg(short, long)]
        quiet: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

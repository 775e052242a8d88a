use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Requirements traceability dashboard")]
pub struct Cli {
    /// Fixtures file (YAML or JSON); falls back to RTM_FIXTURES, the config, ./rtm.yaml, then demo data
    #[clap(long, global = true)]
    pub fixtures: Option<PathBuf>,

    /// Config file; defaults to RTM_CONFIG_PATH or the user config directory
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the requirement tree as a table
    Tree {
        /// Comma-separated folder ids to enter first, e.g. PRJ-PAY,SC-ACC
        #[clap(long)]
        path: Option<String>,

        /// Number of folder levels to expand
        #[clap(long)]
        depth: Option<usize>,

        /// Column filter as column=value (repeatable)
        #[clap(long = "filter")]
        filters: Vec<String>,

        /// Sort siblings by column, optionally column:desc
        #[clap(long)]
        sort: Option<String>,

        /// Comma-separated columns to show
        #[clap(long)]
        columns: Option<String>,
    },

    /// Drill through the hierarchy interactively
    Browse,

    /// Search nodes by id or name
    Find {
        query: String,

        /// Navigate to the first hit
        #[clap(long)]
        open: bool,

        /// Maximum number of hits
        #[clap(long)]
        limit: Option<usize>,
    },

    /// Show a requirement and its artifacts
    Show {
        /// Requirement id
        id: String,

        /// Only show one tab (tasks, test-cases, issues, sign-offs, ctas, meetings, stakeholders, knowledge)
        #[clap(long)]
        tab: Option<String>,
    },

    /// Gap analysis of unlinked items
    #[clap(subcommand)]
    Gap(GapCommand),

    /// Add an empty folder
    AddFolder {
        /// Folder name
        #[clap(long)]
        name: Option<String>,

        /// Parent folder id; prompts when omitted and --name is missing
        #[clap(long)]
        parent: Option<String>,
    },

    /// Replace the tags of a node
    Tag {
        /// Node id
        id: String,

        /// Comma-separated tags; empty clears them
        tags: String,
    },

    /// Upload a knowledge-base document to a requirement
    Upload {
        /// Requirement id
        req_id: String,

        /// File to upload
        file: PathBuf,

        /// Document title, defaults to the file name
        #[clap(long)]
        title: Option<String>,
    },

    /// Export the workspace
    Export {
        /// Output format (yaml or json)
        #[clap(long, default_value = "yaml")]
        format: String,

        /// Output file; prints to stdout when omitted
        #[clap(long)]
        output: Option<PathBuf>,
    },

    /// Manage the dashboard config
    #[clap(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum GapCommand {
    /// List unlinked items and their review state
    List {
        /// Include items that are already linked
        #[clap(long)]
        all: bool,
    },

    /// Score items against requirements and review the results
    Analyze {
        /// Item ids; all unlinked items when omitted
        ids: Vec<String>,

        /// Link accepted items without asking
        #[clap(long)]
        yes: bool,
    },

    /// Accept the recommendation of an item
    Accept { item: String },

    /// Discard the recommendation of an item
    Reject { item: String },

    /// Link an item to a requirement
    Link {
        item: String,
        req_id: String,
    },

    /// Link every accepted item to its recommendation
    LinkAccepted,

    /// Create a new requirement from an item's draft
    Create { item: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the active config
    Show,

    /// Print the config file path
    Path,

    /// Write a default config file if none exists
    Init,
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lore",
    about = "Lore: temporal entity versions and three-way merges",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Three-way merge of entity payloads
    Merge(MergeArgs),
    /// Show field-level changes between two payloads
    Diff(DiffArgs),
    /// Compress a payload and report its stored form
    Compress(CompressArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Payload arguments are paths to JSON files; `none` stands for an entity
/// that does not exist on that side.
#[derive(Args)]
pub struct MergeArgs {
    /// Common ancestor payload
    pub base: String,
    /// Payload on the branch being merged in
    pub source: String,
    /// Payload on the branch receiving the merge
    pub target: String,
    /// Additional path to exclude from the merge (repeatable)
    #[arg(long = "exclude", value_name = "PATH")]
    pub exclude: Vec<String>,
    /// Entity type, to apply its configured exclusions
    #[arg(long)]
    pub entity_type: Option<String>,
    /// JSON file mapping conflict paths to resolutions
    #[arg(long, value_name = "FILE")]
    pub resolutions: Option<PathBuf>,
}

#[derive(Args)]
pub struct DiffArgs {
    pub old: String,
    pub new: String,
}

#[derive(Args)]
pub struct CompressArgs {
    pub payload: String,
    /// zstd level (defaults to the configured level)
    #[arg(long)]
    pub level: Option<i32>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Ignore --config and show the built-in defaults
    #[arg(long)]
    pub defaults: bool,
}

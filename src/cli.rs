use crate::config::BackendKind;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roadhouse")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative security group management", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Backend for the networking API
    #[arg(long, value_enum, global = true, env = "ROADHOUSE_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Base URL of the networking API (http backend)
    #[arg(long, global = true, env = "ROADHOUSE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// State file (file backend)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the groups and rules an apply would create
    Plan(PlanArgs),

    /// Create missing groups and authorize missing rules
    Apply(ApplyArgs),

    /// Parse a desired-state document without contacting the API
    Validate(ValidateArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Desired-state document (YAML, JSON or TOML)
    pub file: PathBuf,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Desired-state document (YAML, JSON or TOML)
    pub file: PathBuf,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel API calls (defaults to [apply] jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Desired-state document (YAML, JSON or TOML)
    pub file: PathBuf,
}

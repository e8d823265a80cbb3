use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "attune")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge resource tags to their declared state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config_dir>/attune.toml)
    #[arg(short, long, global = true, env = "ATTUNE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the attribute changes apply would make
    Plan(PlanArgs),

    /// Converge resources to their declared attributes
    Apply(ApplyArgs),

    /// Inspect or edit the record of applied attributes
    #[command(subcommand)]
    State(StateCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    /// Only this resource (and the resources it references)
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Only this resource (and the resources it references)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Show changes without calling providers
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,
}

// ============================================================================
// State
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List applied resources
    List,

    /// Show the attributes last applied to a resource
    Show {
        /// Resource name
        name: String,
    },

    /// Forget a resource without touching its remote attributes
    Rm {
        /// Resource name
        name: String,
    },
}

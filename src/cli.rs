use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keel")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge resources declared in a TOML manifest", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest file (default: ./keel.toml, then the config directory)
    #[arg(short, long, global = true, env = "KEEL_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Catalog file (default: catalog.json in the state directory)
    #[arg(long, global = true, env = "KEEL_CATALOG")]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge every resource, dependencies first
    Apply,

    /// Tear every resource down, dependants first
    Destroy(DestroyArgs),

    /// Show the order resources would be applied in
    Plan(PlanArgs),

    /// Validate the manifest, its dependency graph and its modules
    Check,

    /// Show the stored catalog
    Catalog(CatalogArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CatalogArgs {
    /// Only show this bucket
    pub bucket: Option<String>,

    /// Print raw JSON
    #[arg(long)]
    pub json: bool,
}

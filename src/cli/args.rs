//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Trellis - project scaffolding from versioned command packages
///
/// Commands are implemented by separately published packages that are
/// installed into a local cache on first use and kept up to date.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Hide install and update progress
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TRELLIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip the check for a newer trellis release
    #[arg(long, global = true)]
    pub no_update_check: bool,

    /// Run command packages from this local checkout instead of the cache
    #[arg(long, global = true, env = "TRELLIS_TARGET_PATH")]
    pub target_path: Option<PathBuf>,

    /// Trellis home directory (default: ~/.trellis)
    #[arg(long, global = true, env = "TRELLIS_HOME")]
    pub home: Option<PathBuf>,

    /// Package registry base URL
    #[arg(long, global = true, env = "TRELLIS_REGISTRY")]
    pub registry: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new project
    Init(InitArgs),

    /// Inspect the module cache
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },

    /// Command provided by a configured package
    #[command(external_subcommand)]
    External(Vec<String>),
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Name of the project to create
    pub project_name: Option<String>,

    /// Overwrite an existing directory
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List installed command packages
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the cache directory
    Path,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

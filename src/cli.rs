// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "whaler")]
#[command(about = "Multi-service application orchestration for Docker")]
#[command(version)]
pub struct Cli {
    /// Engine endpoint: unix socket path or tcp://host:port
    #[arg(short = 'H', long, global = true, env = "WHALER_HOST")]
    pub host: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register an application
    Init {
        /// Application name (defaults to the current directory name)
        name: Option<String>,

        /// Application directory (defaults to the current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Environment tags, e.g. `prod` or `prod,eu`
        #[arg(short, long)]
        env: Option<String>,

        /// Manifest file (defaults to <path>/whaler.yml)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show, re-resolve or retarget an application's config
    Config {
        name: Option<String>,

        /// Resolve this manifest instead of the stored one
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Re-resolve the manifest and store the result
        #[arg(short, long)]
        update: bool,

        /// Replace the stored environment tags
        #[arg(long)]
        set_env: Option<String>,

        /// Inline manifest text (deprecated)
        #[arg(long, hide = true)]
        yml: Option<String>,
    },

    /// Show the variables a manifest is rendered with
    Vars {
        /// Application name; process-wide variables when omitted
        name: Option<String>,
    },

    /// Create containers without starting them
    Create {
        /// `app` or `service.app`
        target: Option<String>,

        /// Manifest override for this invocation
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Start a service or a whole application
    Start {
        /// `app` or `service.app`
        target: Option<String>,

        /// Register the application first if needed, optionally from a manifest
        #[arg(long, require_equals = true, value_name = "FILE")]
        init: Option<Option<PathBuf>>,
    },

    /// Recreate containers and start them again
    Rebuild {
        /// `app` or `service.app`
        target: Option<String>,
    },

    /// Show container state for an application
    Status {
        /// Application name
        name: Option<String>,
    },

    /// Remove containers
    Remove {
        /// `app` or `service.app`
        target: Option<String>,

        /// Also forget the application
        #[arg(long)]
        purge: bool,
    },
}

impl Commands {
    /// Subcommand name, for interruption messages.
    pub fn label(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::Config { .. } => "config",
            Commands::Vars { .. } => "vars",
            Commands::Create { .. } => "create",
            Commands::Start { .. } => "start",
            Commands::Rebuild { .. } => "rebuild",
            Commands::Status { .. } => "status",
            Commands::Remove { .. } => "remove",
        }
    }
}

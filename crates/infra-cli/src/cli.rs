//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Infra reconciler - Declaratively manage cloud resources
#[derive(Parser, Debug)]
#[command(name = "infra")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "INFRA_CONFIG", default_value = "infra.toml")]
    pub config: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Check a desired-state document without contacting the provider
    ///
    /// Reports every violation, not just the first.
    ///
    /// Examples:
    ///   infra validate worker.toml
    Validate {
        /// Desired-state document
        file: PathBuf,
    },

    /// Create or update a worker from a desired-state document
    ///
    /// The resource is recorded in the state file so a later
    /// `infra destroy` can remove it.
    ///
    /// Examples:
    ///   infra apply mailer worker.toml
    ///   infra apply mailer worker.toml --adopt   # take over an existing worker
    Apply {
        /// Remote resource name
        name: String,

        /// Desired-state document
        file: PathBuf,

        /// Overwrite a resource that already exists remotely
        #[arg(long)]
        adopt: bool,

        /// Logical id in the state file (defaults to the name)
        #[arg(long = "id")]
        logical_id: Option<String>,
    },

    /// Print the observed state of a worker
    Show {
        /// Remote resource name
        name: String,
    },

    /// Delete recorded resources, newest first
    Destroy {
        /// Destroy only this logical id
        #[arg(long = "id")]
        logical_id: Option<String>,
    },
}

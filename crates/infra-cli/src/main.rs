//! Infra reconciler CLI
//!
//! Applies desired-state documents to the provider and records what it
//! created so a later run can tear it down.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use context::Context;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| CliError::user(format!("failed to set tracing subscriber: {}", e)))?;
        tracing::debug!("Verbose mode enabled");
    }

    // Validation never touches the provider or the config file
    if let Commands::Validate { file } = &cli.command {
        return commands::run_validate(file);
    }

    let ctx = Context::load(&cli.config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute_command(&ctx, cli.command))
}

async fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Validate { file } => commands::run_validate(&file),
        Commands::Apply {
            name,
            file,
            adopt,
            logical_id,
        } => commands::run_apply(ctx, &name, &file, adopt, logical_id.as_deref()).await,
        Commands::Show { name } => commands::run_show(ctx, &name).await,
        Commands::Destroy { logical_id } => {
            commands::run_destroy(ctx, logical_id.as_deref()).await
        }
    }
}

//! Validate command implementation

use std::path::Path;

use colored::Colorize;
use infra_core::{EmailDestination, Error as CoreError, WorkerProps, load_desired};

use crate::error::{CliError, Result};

/// Check a desired-state document against the worker schema.
///
/// Prints each `sendEmail` binding when valid, every violation otherwise.
pub fn run_validate(file: &Path) -> Result<()> {
    let desired = load_desired(file)?;
    let violations = match WorkerProps::from_desired(&desired) {
        Ok(props) => {
            println!("{} {}", "valid".green().bold(), file.display());
            for binding in props.send_email.iter().flatten() {
                let destination = match &binding.destination {
                    EmailDestination::Unrestricted => "any verified destination".to_string(),
                    EmailDestination::Fixed(address) => address.clone(),
                    EmailDestination::Allowlist(addresses) => addresses.join(", "),
                };
                println!("  {} {} -> {}", "-".green(), binding.name.cyan(), destination);
            }
            return Ok(());
        }
        Err(CoreError::Validation { violations }) => violations,
        Err(other) => return Err(other.into()),
    };

    println!("{} {}", "invalid".red().bold(), file.display());
    for violation in &violations {
        println!("  {} {}", "-".red(), violation);
    }
    Err(CliError::user(format!(
        "{} violation(s) in {}",
        violations.len(),
        file.display()
    )))
}

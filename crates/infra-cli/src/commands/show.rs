//! Show command implementation

use colored::Colorize;
use serde_json::Value;

use crate::context::Context;
use crate::error::{CliError, Result};

/// Print the observed state of worker `name` in caller convention
pub async fn run_show(ctx: &Context, name: &str) -> Result<()> {
    let reconciler = ctx.reconciler()?;
    match reconciler.read(name).await? {
        Some(observed) => {
            println!("{} {}", "worker".bold(), name.cyan());
            println!("{}", serde_json::to_string_pretty(&Value::Object(observed))?);
            Ok(())
        }
        None => Err(CliError::user(format!("worker '{}' does not exist", name))),
    }
}

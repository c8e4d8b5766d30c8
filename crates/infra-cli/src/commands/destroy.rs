//! Destroy command implementation

use colored::Colorize;
use infra_core::Error as CoreError;

use crate::context::Context;
use crate::error::Result;

/// Delete recorded resources, newest first.
///
/// With `logical_id`, only that resource is deleted. Entries whose deletion
/// failed stay in the state file so the command can be retried.
pub async fn run_destroy(ctx: &Context, logical_id: Option<&str>) -> Result<()> {
    let mut state = ctx.load_state()?;
    if state.is_empty() {
        println!("{}", "Nothing to destroy".dimmed());
        return Ok(());
    }

    let scope = ctx.restore_scope(&state)?;
    let targets: Vec<String> = match logical_id {
        Some(id) => vec![id.to_string()],
        None => state.entries().iter().map(|e| e.logical_id.clone()).collect(),
    };

    let outcome = match logical_id {
        Some(id) => scope.destroy(id).await,
        None => scope.destroy_all().await,
    };

    let failed: Vec<String> = match (&outcome, logical_id) {
        (Err(CoreError::Teardown { failures, .. }), _) => {
            failures.iter().map(|f| f.logical_id.clone()).collect()
        }
        (Err(CoreError::UnknownLogicalId(_)), _) | (Ok(()), _) => Vec::new(),
        (Err(_), Some(id)) => vec![id.to_string()],
        (Err(_), None) => Vec::new(),
    };

    let mut keep: Vec<String> = scope
        .release()
        .await
        .entries()
        .iter()
        .map(|e| e.logical_id.clone())
        .collect();
    keep.extend(failed.iter().cloned());
    state.retain_ids(&keep);
    state.save(ctx.state_path())?;

    if matches!(outcome, Ok(()) | Err(CoreError::Teardown { .. })) {
        for id in targets.iter().rev().filter(|id| !failed.contains(id)) {
            println!("{} {}", "Destroyed".red().bold(), id);
        }
    }
    Ok(outcome?)
}

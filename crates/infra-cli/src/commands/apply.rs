//! Apply command implementation

use std::path::Path;

use colored::Colorize;
use infra_core::{Origin, load_desired};
use serde_json::Value;

use crate::context::Context;
use crate::error::{CliError, Result};

/// Create, adopt or update a worker and record it in the state file.
///
/// A logical id already present in the state file is updated in place. The
/// state file is written even when the apply fails after its write landed,
/// so `infra destroy` can still clean up.
pub async fn run_apply(
    ctx: &Context,
    name: &str,
    file: &Path,
    adopt: bool,
    logical_id: Option<&str>,
) -> Result<()> {
    let mut desired = load_desired(file)?;
    match desired.get("name") {
        Some(Value::String(declared)) if declared != name => {
            return Err(CliError::user(format!(
                "{} declares name '{}' but '{}' was requested",
                file.display(),
                declared,
                name
            )));
        }
        _ => {
            desired.insert("name".into(), Value::String(name.to_string()));
        }
    }

    let logical_id = logical_id.unwrap_or(name);
    let state = ctx.load_state()?;
    if let Some(entry) = state.get(logical_id) {
        if entry.handle.name != name {
            return Err(CliError::user(format!(
                "logical id '{}' already tracks worker '{}'",
                logical_id, entry.handle.name
            )));
        }
    }

    let reconciler = ctx.reconciler()?;
    let scope = ctx.restore_scope(&state)?;
    let outcome = scope.define(&reconciler, logical_id, &desired, adopt).await;

    let state = scope.release().await;
    state.save(ctx.state_path())?;
    tracing::debug!(path = %ctx.state_path().display(), entries = state.entries().len(), "Saved state");

    let observed = outcome?;
    let origin = state
        .get(logical_id)
        .map(|entry| entry.handle.origin)
        .unwrap_or(Origin::Created);
    let label = match origin {
        Origin::Created => "Created".green(),
        Origin::Adopted => "Adopted".yellow(),
        Origin::Updated => "Updated".cyan(),
    };
    println!("{} worker {} ({})", label.bold(), name.cyan(), logical_id.dimmed());
    println!("{}", serde_json::to_string_pretty(&Value::Object(observed))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{WORKERS, context};
    use infra_core::ScopeState;
    use infra_test_utils::FakeControlPlane;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn apply_records_state_and_updates_later() {
        let dir = tempdir().unwrap();
        let fake = Arc::new(FakeControlPlane::new());
        let ctx = context(dir.path(), &fake);
        let file = dir.path().join("worker.json");

        fs::write(&file, r#"{"sendEmail": [{"name": "EMAIL"}]}"#).unwrap();
        run_apply(&ctx, "mailer", &file, false, None).await.unwrap();

        let state = ScopeState::load(ctx.state_path()).unwrap();
        assert_eq!(state.get("mailer").unwrap().handle.origin, Origin::Created);

        fs::write(&file, "{}").unwrap();
        run_apply(&ctx, "mailer", &file, false, None).await.unwrap();

        let state = ScopeState::load(ctx.state_path()).unwrap();
        assert_eq!(state.entries().len(), 1);
        assert_eq!(state.get("mailer").unwrap().handle.origin, Origin::Updated);
        assert_eq!(
            fake.stored(&format!("{}/mailer", WORKERS)).unwrap(),
            json!({"name": "mailer", "id": "fake-1"})
        );
    }

    #[tokio::test]
    async fn existing_worker_requires_adopt() {
        let dir = tempdir().unwrap();
        let fake = Arc::new(FakeControlPlane::new());
        fake.seed(&format!("{}/mailer", WORKERS), json!({"name": "mailer", "id": "x"}));
        let ctx = context(dir.path(), &fake);
        let file = dir.path().join("worker.toml");
        fs::write(&file, "logpush = true\n").unwrap();

        let error = run_apply(&ctx, "mailer", &file, false, None).await.unwrap_err();
        assert!(matches!(error, CliError::Core(infra_core::Error::Conflict { .. })));
        assert!(ScopeState::load(ctx.state_path()).unwrap().is_empty());

        run_apply(&ctx, "mailer", &file, true, Some("m")).await.unwrap();
        let state = ScopeState::load(ctx.state_path()).unwrap();
        assert_eq!(state.get("m").unwrap().handle.origin, Origin::Adopted);
    }

    #[tokio::test]
    async fn mismatched_name_is_rejected_before_io() {
        let dir = tempdir().unwrap();
        let fake = Arc::new(FakeControlPlane::new());
        let ctx = context(dir.path(), &fake);
        let file = dir.path().join("worker.json");
        fs::write(&file, r#"{"name": "other"}"#).unwrap();

        assert!(matches!(
            run_apply(&ctx, "mailer", &file, false, None).await,
            Err(CliError::User { .. })
        ));
        assert_eq!(fake.read_count(), 0);
    }

    #[tokio::test]
    async fn timed_out_apply_is_still_recorded() {
        let dir = tempdir().unwrap();
        let fake = Arc::new(FakeControlPlane::new().with_read_lag(100));
        let ctx = context(dir.path(), &fake);
        let file = dir.path().join("worker.json");
        fs::write(&file, "{}").unwrap();

        let error = run_apply(&ctx, "mailer", &file, false, None).await.unwrap_err();
        assert!(matches!(
            error,
            CliError::Core(infra_core::Error::ConsistencyTimeout { .. })
        ));
        assert!(ScopeState::load(ctx.state_path()).unwrap().get("mailer").is_some());
    }
}

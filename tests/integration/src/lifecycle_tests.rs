//! Lifecycle Integration Tests
//!
//! Configuration loading, persisted scope state across runs, and concurrent
//! reconciliation against the in-memory control plane.

use std::fs;
use std::sync::Arc;

use infra_core::{
    DesiredState, EngineConfig, Error, Origin, Reconciler, Scope, ScopeState, Teardown,
    worker_resource,
};
use infra_test_utils::{FakeControlPlane, init_test_tracing};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

const CONFIG: &str = r#"
[api]
account_id = "acct"

[retry]
initial_delay_ms = 1
max_delay_ms = 4
max_attempts = 6
max_elapsed_ms = 0

[state]
scope = "lifecycle"
"#;

/// Engine configuration loaded from a file, with state kept in `dir`
fn load_config(dir: &TempDir) -> EngineConfig {
    let path = dir.path().join("infra.toml");
    fs::write(&path, CONFIG).unwrap();
    let mut config = EngineConfig::load(&path).unwrap();
    config.state.path = dir.path().join("state").join("scope.toml");
    config
}

fn reconciler(config: &EngineConfig, fake: &Arc<FakeControlPlane>) -> Arc<Reconciler> {
    init_test_tracing();
    let account = config.api.resolve_account_id().unwrap();
    let policy = config.retry_policy().unwrap();
    Arc::new(Reconciler::new(fake.clone(), account, worker_resource()).with_retry(policy))
}

// =============================================================================
// Persisted state
// =============================================================================

#[tokio::test]
async fn resources_survive_a_restart_and_are_destroyed_later() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&dir);
    let fake = Arc::new(FakeControlPlane::new());

    // First run: create and hand off to the state file
    {
        let workers = reconciler(&config, &fake);
        let scope = Scope::new(&config.state.scope);
        for id in ["inbound", "outbound"] {
            scope
                .define(&workers, id, &DesiredState::new(), false)
                .await
                .unwrap();
        }
        scope.release().await.save(&config.state.path).unwrap();
    }
    assert_eq!(fake.object_count(), 2);

    // Second run: restore and tear down
    let state = ScopeState::load(&config.state.path).unwrap();
    assert_eq!(state.scope(), "lifecycle");
    let workers = reconciler(&config, &fake);
    let owner: Arc<dyn Teardown> = workers.clone();
    let scope = Scope::restore(&state, |_| Some(owner.clone())).unwrap();
    scope.destroy_all().await.unwrap();
    scope.release().await.save(&config.state.path).unwrap();

    assert_eq!(fake.object_count(), 0);
    assert!(
        ScopeState::load(&config.state.path)
            .unwrap()
            .is_empty()
    );
    let deleted = fake.deleted_paths();
    assert!(deleted[0].ends_with("/outbound"));
    assert!(deleted[1].ends_with("/inbound"));
}

#[tokio::test]
async fn restored_scope_updates_tracked_ids() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&dir);
    let fake = Arc::new(FakeControlPlane::new());
    let workers = reconciler(&config, &fake);

    let scope = Scope::new("first");
    scope
        .define(&workers, "mailer", &DesiredState::new(), false)
        .await
        .unwrap();
    let state = scope.release().await;

    let owner: Arc<dyn Teardown> = workers.clone();
    let scope = Scope::restore(&state, |_| Some(owner.clone())).unwrap();
    let desired = json!({"logpush": true}).as_object().cloned().unwrap();
    let observed = scope
        .define(&workers, "mailer", &desired, false)
        .await
        .unwrap();

    assert_eq!(observed["logpush"], json!(true));
    assert_eq!(scope.get("mailer").await.unwrap().origin, Origin::Updated);
    scope.destroy_all().await.unwrap();
}

// =============================================================================
// Idempotency and adoption
// =============================================================================

#[rstest]
#[case::empty(json!({}))]
#[case::bindings(json!({"sendEmail": [{"name": "EMAIL"}, {"name": "OPS", "destinationAddress": "ops@x.com"}]}))]
#[case::everything(json!({"sendEmail": [], "logpush": false, "tags": ["a", "b"]}))]
#[tokio::test]
async fn adopting_reapply_is_idempotent(#[case] document: serde_json::Value) {
    let dir = TempDir::new().unwrap();
    let config = load_config(&dir);
    let fake = Arc::new(FakeControlPlane::new().with_read_lag(1));
    let workers = reconciler(&config, &fake);
    let desired = document.as_object().cloned().unwrap();

    let first = workers.apply("idem", &desired, false).await.unwrap();
    let second = workers.apply("idem", &desired, true).await.unwrap();

    assert_eq!(first.observed, second.observed);
    assert_eq!(second.handle.origin, Origin::Adopted);
    assert_eq!(first.handle.id, second.handle.id);
}

#[tokio::test]
async fn out_of_band_resource_is_never_overwritten_silently() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&dir);
    let fake = Arc::new(FakeControlPlane::new());
    let path = "/accounts/acct/workers/workers/legacy";
    fake.seed(path, json!({"name": "legacy", "logpush": true}));
    let workers = reconciler(&config, &fake);

    let error = workers
        .apply("legacy", &DesiredState::new(), false)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Conflict { .. }));
    assert_eq!(fake.stored(path).unwrap()["logpush"], json!(true));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_definitions_all_register() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&dir);
    let fake = Arc::new(FakeControlPlane::new().with_read_lag(2));
    let workers = reconciler(&config, &fake);
    let scope = Arc::new(Scope::new("parallel"));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let scope = Arc::clone(&scope);
        let workers = Arc::clone(&workers);
        tasks.push(tokio::spawn(async move {
            scope
                .define(&workers, &format!("worker-{}", i), &DesiredState::new(), false)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(scope.len().await, 8);
    assert_eq!(fake.object_count(), 8);

    scope.destroy_all().await.unwrap();
    assert_eq!(fake.object_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn independent_scopes_do_not_interfere() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&dir);
    let fake = Arc::new(FakeControlPlane::new().with_read_lag(1));
    let workers = reconciler(&config, &fake);

    let run = |name: &'static str| {
        let workers = Arc::clone(&workers);
        Scope::run(name, move |scope| async move {
            scope
                .define(&workers, name, &DesiredState::new(), false)
                .await
                .map(|_| ())
        })
    };

    let (left, right) = tokio::join!(run("left"), run("right"));
    left.unwrap();
    right.unwrap();
    assert_eq!(fake.object_count(), 0);
    assert_eq!(fake.deleted_paths().len(), 2);
}

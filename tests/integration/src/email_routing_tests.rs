//! Email Routing Integration Tests
//!
//! Drives worker `sendEmail` bindings through the full stack: typed props,
//! validation, field mapping, the reconciler and a lagging control plane.

use std::sync::Arc;
use std::time::Duration;

use infra_core::{
    DesiredState, Error, Reconciler, RetryPolicy, Scope, SendEmailBinding, WorkerProps,
    worker_resource,
};
use infra_test_utils::{FakeControlPlane, init_test_tracing};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};

// =============================================================================
// Test Infrastructure
// =============================================================================

const WORKER_PATH: &str = "/accounts/acct/workers/workers/W";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(8),
        max_attempts: 12,
        max_elapsed: None,
    }
}

fn workers(fake: &Arc<FakeControlPlane>) -> Arc<Reconciler> {
    init_test_tracing();
    Arc::new(Reconciler::new(fake.clone(), "acct", worker_resource()).with_retry(fast_retry()))
}

fn desired(value: Value) -> DesiredState {
    value.as_object().cloned().unwrap()
}

// =============================================================================
// Scenario: bindings evolve across applies
// =============================================================================

#[tokio::test]
async fn send_email_bindings_follow_latest_desired_state() {
    let fake = Arc::new(FakeControlPlane::new().with_read_lag(2));
    let workers = workers(&fake);

    let first = workers
        .apply("W", &desired(json!({"sendEmail": [{"name": "EMAIL"}]})), false)
        .await
        .unwrap();
    assert_eq!(first.observed["sendEmail"], json!([{"name": "EMAIL"}]));
    assert_eq!(first.handle.path, WORKER_PATH);

    let second = workers
        .apply(
            "W",
            &desired(json!({"sendEmail": [{"name": "EMAIL", "allowedSenderAddresses": ["a@x.com"]}]})),
            true,
        )
        .await
        .unwrap();
    assert_eq!(
        second.observed["sendEmail"],
        json!([{"name": "EMAIL", "allowedSenderAddresses": ["a@x.com"]}])
    );

    let third = workers.apply("W", &DesiredState::new(), true).await.unwrap();
    assert_eq!(third.observed.get("sendEmail"), None);
    assert_eq!(fake.stored(WORKER_PATH).unwrap().get("send_email"), None);
}

#[tokio::test]
async fn scoped_definition_follows_the_same_scenario() {
    let fake = Arc::new(FakeControlPlane::new().with_read_lag(1));
    let workers = workers(&fake);

    Scope::run("email-routing", |scope| {
        let workers = Arc::clone(&workers);
        async move {
            let observed = scope
                .define(
                    &workers,
                    "W",
                    &WorkerProps::new()
                        .send_email(SendEmailBinding::new("EMAIL"))
                        .to_desired(),
                    false,
                )
                .await?;
            assert_eq!(observed["sendEmail"], json!([{"name": "EMAIL"}]));

            let observed = scope
                .define(
                    &workers,
                    "W",
                    &WorkerProps::new()
                        .send_email(SendEmailBinding::new("EMAIL").allow_senders(["a@x.com"]))
                        .to_desired(),
                    false,
                )
                .await?;
            assert_eq!(
                observed["sendEmail"],
                json!([{"name": "EMAIL", "allowedSenderAddresses": ["a@x.com"]}])
            );

            let observed = scope
                .define(&workers, "W", &WorkerProps::new().to_desired(), false)
                .await?;
            assert_eq!(observed.get("sendEmail"), None);
            Ok(())
        }
    })
    .await
    .unwrap();

    assert_eq!(fake.object_count(), 0, "scope exit removes the worker");
}

// =============================================================================
// Pre-flight rejection
// =============================================================================

#[tokio::test]
async fn conflicting_destinations_never_reach_the_provider() {
    let fake = Arc::new(FakeControlPlane::new());
    let workers = workers(&fake);

    let error = workers
        .apply(
            "w",
            &desired(json!({"sendEmail": [{
                "name": "EMAIL",
                "destinationAddress": "a@x.com",
                "allowedDestinationAddresses": ["b@x.com"]
            }]})),
            false,
        )
        .await
        .unwrap_err();

    let Error::Validation { violations } = &error else {
        panic!("Expected Validation, got {:?}", error);
    };
    assert_eq!(violations.len(), 1);
    let message = error.to_string();
    assert!(message.contains("destinationAddress"));
    assert!(message.contains("allowedDestinationAddresses"));
    assert!(fake.mutations().is_empty());
    assert_eq!(fake.read_count(), 0);
}

#[tokio::test]
async fn ambiguous_destination_shape_never_reaches_the_provider() {
    let fake = Arc::new(FakeControlPlane::new());
    let workers = workers(&fake);

    for entry in [
        json!({"name": "EMAIL", "destinationAddress": ["a@x.com", "b@x.com"]}),
        json!({"name": "EMAIL", "allowedDestinationAddresses": "a@x.com"}),
    ] {
        let error = workers
            .apply("W", &desired(json!({"sendEmail": [entry]})), false)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Validation { .. }), "got: {:?}", error);
    }
    assert!(fake.mutations().is_empty());
    assert_eq!(fake.read_count(), 0);
}

#[tokio::test]
async fn malformed_addresses_are_quoted_back() {
    let fake = Arc::new(FakeControlPlane::new());
    let workers = workers(&fake);

    let error = workers
        .apply(
            "w",
            &desired(json!({"sendEmail": [
                {"name": "ONE", "destinationAddress": "not an email"},
                {"name": "TWO", "allowedSenderAddresses": ["ok@x.com", "broken@"]}
            ]})),
            false,
        )
        .await
        .unwrap_err();

    let message = error.to_string();
    assert!(message.contains("'not an email'"), "got: {}", message);
    assert!(message.contains("'broken@'"), "got: {}", message);
    assert!(fake.mutations().is_empty());
}

// =============================================================================
// Properties
// =============================================================================

fn address() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}", "[a-z]{1,8}").prop_map(|(user, domain)| format!("{}@{}.com", user, domain))
}

fn binding() -> impl Strategy<Value = SendEmailBinding> {
    (
        "[A-Z]{1,8}",
        prop_oneof![
            Just(None),
            address().prop_map(|a| Some(vec![a])),
            proptest::collection::vec(address(), 2..4).prop_map(Some),
        ],
        proptest::option::of(proptest::collection::vec(address(), 1..3)),
    )
        .prop_map(|(name, destinations, senders)| {
            let mut binding = SendEmailBinding::new(name);
            binding = match destinations {
                None => binding,
                Some(mut list) if list.len() == 1 => binding.fixed(list.remove(0)),
                Some(list) => binding.allow_destinations(list),
            };
            match senders {
                Some(senders) => binding.allow_senders(senders),
                None => binding,
            }
        })
}

fn props() -> impl Strategy<Value = WorkerProps> {
    (
        proptest::option::of(proptest::collection::vec(binding(), 0..3)),
        proptest::option::of(any::<bool>()),
        proptest::option::of(proptest::collection::vec("[a-z]{1,6}", 0..3)),
    )
        .prop_map(|(send_email, logpush, tags)| WorkerProps {
            name: None,
            send_email,
            logpush,
            tags,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn applied_state_reads_back_as_desired(props in props()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (first, second) = runtime.block_on(async {
            let fake = Arc::new(FakeControlPlane::new().with_read_lag(1));
            let workers = workers(&fake);
            let desired = props.to_desired();
            let first = workers.apply("w", &desired, false).await.unwrap();
            let second = workers.apply("w", &desired, true).await.unwrap();
            (first, second)
        });

        let desired = props.to_desired();
        for field in ["sendEmail", "logpush", "tags"] {
            prop_assert_eq!(first.observed.get(field), desired.get(field));
        }
        prop_assert_eq!(first.observed, second.observed);
    }
}

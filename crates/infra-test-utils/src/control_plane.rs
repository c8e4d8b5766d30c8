//! In-memory control plane for reconciler tests.
//!
//! Resources are stored as wire documents keyed by path. `POST` to a
//! collection creates `<collection>/<name>`; `PUT` replaces an existing
//! object wholesale; `DELETE` removes it. Responses use the provider's
//! `{ success, result, errors }` envelope.
//!
//! Read-after-write lag is simulated with [`FakeControlPlane::with_read_lag`]:
//! after each write, the next `n` reads of that path still see the state
//! from before the write.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use infra_api::{ApiMessage, ControlPlane, Method, RawResponse, Result};
use serde_json::{Value, json};

/// Error code the provider uses for a missing worker
pub const NOT_FOUND_CODE: i64 = 10007;
/// Error code the provider uses for a duplicate name
pub const ALREADY_EXISTS_CODE: i64 = 10013;

/// A recorded write
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug)]
struct Stale {
    previous: Option<Value>,
    remaining: usize,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Value>,
    stale: HashMap<String, Stale>,
    read_lag: usize,
    mutations: Vec<Mutation>,
    reads: usize,
    failing_deletes: HashSet<String>,
    next_write_failure: Option<(u16, ApiMessage)>,
    next_id: u64,
}

/// Fake provider implementing [`ControlPlane`]
#[derive(Debug, Default)]
pub struct FakeControlPlane {
    inner: Mutex<Inner>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `reads` stale responses after every write
    pub fn with_read_lag(self, reads: usize) -> Self {
        self.lock().read_lag = reads;
        self
    }

    /// Place a pre-existing object at `path`, as if created out of band
    pub fn seed(&self, path: &str, object: Value) {
        self.lock().objects.insert(path.to_string(), object);
    }

    /// Make every `DELETE` of `path` fail with a server error
    pub fn fail_deletes_of(&self, path: &str) {
        self.lock().failing_deletes.insert(path.to_string());
    }

    /// Make the next `POST` or `PUT` fail with the given envelope error
    pub fn fail_next_write(&self, status: u16, code: i64, message: &str) {
        self.lock().next_write_failure = Some((status, ApiMessage::new(code, message)));
    }

    /// The object currently stored at `path`, ignoring simulated lag
    pub fn stored(&self, path: &str) -> Option<Value> {
        self.lock().objects.get(path).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().mutations.clone()
    }

    /// Paths of successful and failed deletes, in call order
    pub fn deleted_paths(&self) -> Vec<String> {
        self.lock()
            .mutations
            .iter()
            .filter(|m| m.method == Method::Delete)
            .map(|m| m.path.clone())
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn record(&mut self, method: Method, path: &str, body: Option<&Value>) {
        self.mutations.push(Mutation {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
    }

    fn mark_written(&mut self, path: &str, previous: Option<Value>) {
        if self.read_lag > 0 {
            self.stale.insert(
                path.to_string(),
                Stale {
                    previous,
                    remaining: self.read_lag,
                },
            );
        }
    }

    fn take_write_failure(&mut self) -> Option<RawResponse> {
        self.next_write_failure
            .take()
            .map(|(status, message)| failure(status, message))
    }

    fn visible(&mut self, path: &str) -> Option<Value> {
        if let Some(stale) = self.stale.get_mut(path) {
            if stale.remaining > 0 {
                stale.remaining -= 1;
                return stale.previous.clone();
            }
            self.stale.remove(path);
        }
        self.objects.get(path).cloned()
    }
}

fn ok(result: Value) -> RawResponse {
    RawResponse::new(
        200,
        json!({ "success": true, "result": result, "errors": [], "messages": [] }),
    )
}

fn failure(status: u16, message: ApiMessage) -> RawResponse {
    let error = json!({ "code": message.code, "message": message.message });
    RawResponse::new(
        status,
        json!({ "success": false, "result": null, "errors": [error], "messages": [] }),
    )
}

fn not_found() -> RawResponse {
    failure(
        404,
        ApiMessage::new(NOT_FOUND_CODE, "workers.api.error.not_found"),
    )
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn get(&self, path: &str) -> Result<RawResponse> {
        let mut inner = self.lock();
        inner.reads += 1;
        Ok(match inner.visible(path) {
            Some(object) => ok(object),
            None => not_found(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<RawResponse> {
        let mut inner = self.lock();
        inner.record(Method::Post, path, Some(body));
        if let Some(response) = inner.take_write_failure() {
            return Ok(response);
        }

        let Some(name) = body.get("name").and_then(Value::as_str) else {
            return Ok(failure(400, ApiMessage::new(10021, "name is required")));
        };
        let target = format!("{}/{}", path, name);
        if inner.objects.contains_key(&target) {
            return Ok(failure(
                409,
                ApiMessage::new(ALREADY_EXISTS_CODE, "already exists"),
            ));
        }

        inner.next_id += 1;
        let mut object = body.clone();
        if let Some(map) = object.as_object_mut() {
            map.insert("id".into(), json!(format!("fake-{}", inner.next_id)));
        }
        inner.objects.insert(target.clone(), object.clone());
        inner.mark_written(&target, None);
        Ok(ok(object))
    }

    async fn put(&self, path: &str, body: &Value) -> Result<RawResponse> {
        let mut inner = self.lock();
        inner.record(Method::Put, path, Some(body));
        if let Some(response) = inner.take_write_failure() {
            return Ok(response);
        }

        let Some(previous) = inner.objects.get(path).cloned() else {
            return Ok(not_found());
        };

        // Full replacement; the server keeps its own id
        let mut object = body.clone();
        if let (Some(map), Some(id)) = (object.as_object_mut(), previous.get("id")) {
            map.insert("id".into(), id.clone());
        }
        inner.objects.insert(path.to_string(), object.clone());
        inner.mark_written(path, Some(previous));
        Ok(ok(object))
    }

    async fn delete(&self, path: &str) -> Result<RawResponse> {
        let mut inner = self.lock();
        inner.record(Method::Delete, path, None);

        if inner.failing_deletes.contains(path) {
            return Ok(failure(500, ApiMessage::new(10002, "internal error")));
        }
        match inner.objects.remove(path) {
            Some(previous) => {
                inner.stale.remove(path);
                Ok(ok(json!({ "id": previous.get("id").cloned().unwrap_or(Value::Null) })))
            }
            None => Ok(not_found()),
        }
    }
}

//! Pod API client seam.
//!
//! The arbiters only ever issue three requests: an eviction, a JSON patch
//! against the `/resize` subresource, and a JSON patch against the pod
//! object. Dropping a returned future before it resolves abandons the
//! request; the arbiter then leaves every counter untouched.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use vpa_types::pod_key;

use crate::error::ClientError;

/// Boxed future returned by every [`PodClient`] request.
pub type ClientFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>>;

/// Options sent with a policy-kind eviction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionOptions {
    /// Overrides the pod's termination grace period when set.
    pub grace_period_seconds: Option<i64>,
}

pub trait PodClient: Send + Sync {
    /// Evict through the eviction subresource, honouring disruption budgets.
    fn evict<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
        options: &'a EvictionOptions,
    ) -> ClientFuture<'a>;

    /// Apply a JSON patch to the pod's `/resize` subresource.
    fn patch_resize<'a>(&'a self, namespace: &'a str, name: &'a str, patch: Vec<u8>) -> ClientFuture<'a>;

    /// Apply a JSON patch to the pod object.
    fn patch<'a>(&'a self, namespace: &'a str, name: &'a str, patch: Vec<u8>) -> ClientFuture<'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClientOp {
    Evict,
    PatchResize,
    Patch,
}

/// A request the fake client received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRequest {
    pub op: ClientOp,
    pub pod: String,
    /// Decoded JSON patch, `None` for evictions and undecodable bodies.
    pub patch: Option<serde_json::Value>,
    /// Patch body as sent.
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct FakeState {
    requests: Vec<ClientRequest>,
    failures: HashMap<(ClientOp, String), ClientError>,
}

/// In-memory client that records requests and succeeds unless told otherwise.
///
/// Clones share the request log and the injected failures.
#[derive(Debug, Clone, Default)]
pub struct FakePodClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakePodClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every `op` request for `pod` (a `namespace/name` key) fail.
    pub fn fail(&self, op: ClientOp, pod: &str, error: ClientError) {
        self.lock().failures.insert((op, pod.to_string()), error);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Every request received, failed ones included.
    pub fn requests(&self) -> Vec<ClientRequest> {
        self.lock().requests.clone()
    }

    /// Requests of one kind.
    pub fn requests_for(&self, op: ClientOp) -> Vec<ClientRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.op == op)
            .cloned()
            .collect()
    }

    fn handle(&self, op: ClientOp, namespace: &str, name: &str, patch: Option<&[u8]>) -> Result<(), ClientError> {
        let pod = pod_key(namespace, name);
        let mut state = self.lock();
        state.requests.push(ClientRequest {
            op,
            pod: pod.clone(),
            patch: patch.and_then(|bytes| serde_json::from_slice(bytes).ok()),
            body: patch.map(<[u8]>::to_vec),
        });
        match state.failures.get(&(op, pod)) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl PodClient for FakePodClient {
    fn evict<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
        _options: &'a EvictionOptions,
    ) -> ClientFuture<'a> {
        let result = self.handle(ClientOp::Evict, namespace, name, None);
        Box::pin(async move { result })
    }

    fn patch_resize<'a>(&'a self, namespace: &'a str, name: &'a str, patch: Vec<u8>) -> ClientFuture<'a> {
        let result = self.handle(ClientOp::PatchResize, namespace, name, Some(&patch));
        Box::pin(async move { result })
    }

    fn patch<'a>(&'a self, namespace: &'a str, name: &'a str, patch: Vec<u8>) -> ClientFuture<'a> {
        let result = self.handle(ClientOp::Patch, namespace, name, Some(&patch));
        Box::pin(async move { result })
    }
}

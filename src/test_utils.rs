// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses.

use crate::error::{PatcherError, Result};
use crate::kubernetes::{ClusterGateway, NamespaceEvent};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateWaiting, ContainerStatus, LocalObjectReference, Namespace, Pod,
    PodStatus, Secret, ServiceAccount,
};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::error::ErrorResponse;
use kube::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request seen by `MockService`
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let (parts, body) = req.into_parts();
        let method = parts.method.to_string();
        let path = parts.uri.path().to_string();
        let content_type = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let body = body.collect().await?.to_bytes().to_vec();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                content_type,
                body,
            });

            match response {
                Some((status, body)) => Ok(Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from(body.into_bytes()))
                    .unwrap()),
                None => {
                    // Default 404 for unmatched requests
                    let body = r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#;
                    Ok(Response::builder()
                        .status(404)
                        .header("content-type", "application/json")
                        .body(Body::from(body.as_bytes().to_vec()))
                        .unwrap())
                }
            }
        })
    }
}

/// Create a mock namespace JSON response
pub fn namespace_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid"
        }
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// A mutating call received by `FakeCluster`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateSecret { namespace: String, name: String },
    PatchSecret { namespace: String, name: String },
    PatchServiceAccount { namespace: String, name: String },
    DeletePod { namespace: String, name: String },
}

impl Mutation {
    pub fn namespace(&self) -> &str {
        match self {
            Mutation::CreateSecret { namespace, .. }
            | Mutation::PatchSecret { namespace, .. }
            | Mutation::PatchServiceAccount { namespace, .. }
            | Mutation::DeletePod { namespace, .. } => namespace,
        }
    }
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct FakeState {
    namespaces: BTreeMap<String, Namespace>,
    secrets: BTreeMap<Key, Secret>,
    service_accounts: BTreeMap<Key, ServiceAccount>,
    pods: BTreeMap<Key, Pod>,
    mutations: Vec<Mutation>,
    namespace_lists: usize,
}

/// In-memory `ClusterGateway` that records every mutating call.
///
/// Failures are injected per operation and target, e.g.
/// `.failing("get_secret", "team-a")` or `.failing("delete_pod", "team-a/web-0")`.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
    failures: HashSet<(String, String)>,
    watch: Mutex<Option<mpsc::UnboundedReceiver<Result<NamespaceEvent>>>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(self, name: &str) -> Self {
        self.with_annotated_namespace(name, BTreeMap::new())
    }

    pub fn with_annotated_namespace(self, name: &str, annotations: BTreeMap<String, String>) -> Self {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations: (!annotations.is_empty()).then_some(annotations),
                ..Default::default()
            },
            ..Default::default()
        };
        self.state
            .lock()
            .unwrap()
            .namespaces
            .insert(name.to_string(), namespace);
        self
    }

    /// Add a pull secret whose `.dockerconfigjson` holds the decoded bytes of `payload`
    pub fn with_secret(self, namespace: &str, name: &str, payload: &[u8]) -> Self {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                ".dockerconfigjson".to_string(),
                ByteString(payload.to_vec()),
            )])),
            type_: Some("kubernetes.io/dockerconfigjson".to_string()),
            ..Default::default()
        };
        self.state
            .lock()
            .unwrap()
            .secrets
            .insert(key(namespace, name), secret);
        self
    }

    pub fn with_service_account(self, namespace: &str, name: &str, pull_secrets: &[&str]) -> Self {
        let account = ServiceAccount {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            image_pull_secrets: (!pull_secrets.is_empty()).then(|| {
                pull_secrets
                    .iter()
                    .map(|s| LocalObjectReference {
                        name: s.to_string(),
                    })
                    .collect()
            }),
            ..Default::default()
        };
        self.state
            .lock()
            .unwrap()
            .service_accounts
            .insert(key(namespace, name), account);
        self
    }

    pub fn with_pod(self, namespace: &str, name: &str, waiting_reason: Option<&str>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pods
            .insert(key(namespace, name), pod(namespace, name, waiting_reason));
        self
    }

    pub fn failing(mut self, operation: &str, target: &str) -> Self {
        self.failures.insert((operation.to_string(), target.to_string()));
        self
    }

    /// Open the namespace watch; events sent here are delivered by `watch_namespaces`
    pub fn watch_sender(&self) -> mpsc::UnboundedSender<Result<NamespaceEvent>> {
        let (tx, rx) = mpsc::unbounded();
        *self.watch.lock().unwrap() = Some(rx);
        tx
    }

    /// How many times the full namespace list was requested
    pub fn namespace_lists(&self) -> usize {
        self.state.lock().unwrap().namespace_lists
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn mutations_in(&self, namespace: &str) -> Vec<Mutation> {
        self.mutations()
            .into_iter()
            .filter(|m| m.namespace() == namespace)
            .collect()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn service_account(&self, namespace: &str, name: &str) -> Option<ServiceAccount> {
        self.state
            .lock()
            .unwrap()
            .service_accounts
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn has_pod(&self, namespace: &str, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .pods
            .contains_key(&key(namespace, name))
    }

    fn check(&self, operation: &str, target: &str) -> Result<()> {
        if self
            .failures
            .contains(&(operation.to_string(), target.to_string()))
        {
            return Err(api_error(
                500,
                "InternalError",
                format!("injected {} failure for {}", operation, target),
            ));
        }
        Ok(())
    }

    fn record(&self, mutation: Mutation) {
        self.state.lock().unwrap().mutations.push(mutation);
    }
}

fn api_error(code: u16, reason: &str, message: String) -> PatcherError {
    PatcherError::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

pub fn pod(namespace: &str, name: &str, waiting_reason: Option<&str>) -> Pod {
    let container_statuses = waiting_reason.map(|reason| {
        vec![ContainerStatus {
            name: "app".to_string(),
            image: "registry.example.com/app:1.0".to_string(),
            image_id: String::new(),
            ready: false,
            restart_count: 0,
            state: Some(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some(reason.to_string()),
                    message: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]
    });

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        status: Some(PodStatus {
            container_statuses,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Apply a JSON patch the way the API server does, which accepts `replace` on a missing member
fn apply_patch<T: Serialize + DeserializeOwned>(object: &T, patch: &json_patch::Patch) -> Result<T> {
    let mut ops = serde_json::to_value(patch)?;
    if let Some(ops) = ops.as_array_mut() {
        for op in ops {
            if op["op"] == "replace" {
                op["op"] = "add".into();
            }
        }
    }
    let lenient: json_patch::Patch = serde_json::from_value(ops)?;

    let mut doc = serde_json::to_value(object)?;
    json_patch::patch(&mut doc, &lenient.0).map_err(|e| api_error(422, "Invalid", e.to_string()))?;
    Ok(serde_json::from_value(doc)?)
}

#[async_trait]
impl ClusterGateway for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let mut state = self.state.lock().unwrap();
        state.namespace_lists += 1;
        drop(state);
        self.check("list_namespaces", "")?;
        Ok(self.state.lock().unwrap().namespaces.values().cloned().collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        self.check("get_namespace", name)?;
        self.state
            .lock()
            .unwrap()
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| api_error(404, "NotFound", format!("namespace \"{}\" not found", name)))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        self.check("get_secret", namespace)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .secrets
            .get(&key(namespace, name))
            .cloned())
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<()> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.record(Mutation::CreateSecret {
            namespace: namespace.to_string(),
            name: name.clone(),
        });
        self.check("create_secret", namespace)?;

        let mut state = self.state.lock().unwrap();
        if state.secrets.contains_key(&key(namespace, &name)) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("secrets \"{}\" already exists", name),
            ));
        }
        let mut stored = secret.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        state.secrets.insert(key(namespace, &name), stored);
        Ok(())
    }

    async fn patch_secret(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<()> {
        self.record(Mutation::PatchSecret {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.check("patch_secret", namespace)?;

        let mut state = self.state.lock().unwrap();
        let Some(secret) = state.secrets.get(&key(namespace, name)) else {
            return Err(api_error(404, "NotFound", format!("secrets \"{}\" not found", name)));
        };
        let patched = apply_patch(secret, patch)?;
        state.secrets.insert(key(namespace, name), patched);
        Ok(())
    }

    async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<ServiceAccount>> {
        self.check("list_service_accounts", namespace)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .service_accounts
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, sa)| sa.clone())
            .collect())
    }

    async fn patch_service_account(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<()> {
        self.record(Mutation::PatchServiceAccount {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.check("patch_service_account", &format!("{}/{}", namespace, name))?;

        let mut state = self.state.lock().unwrap();
        let Some(account) = state.service_accounts.get(&key(namespace, name)) else {
            return Err(api_error(
                404,
                "NotFound",
                format!("serviceaccounts \"{}\" not found", name),
            ));
        };
        let patched = apply_patch(account, patch)?;
        state.service_accounts.insert(key(namespace, name), patched);
        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        self.check("list_pods", namespace)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .pods
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, pod)| pod.clone())
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.record(Mutation::DeletePod {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.check("delete_pod", &format!("{}/{}", namespace, name))?;
        self.state.lock().unwrap().pods.remove(&key(namespace, name));
        Ok(())
    }

    fn watch_namespaces(&self) -> BoxStream<'static, Result<NamespaceEvent>> {
        match self.watch.lock().unwrap().take() {
            Some(rx) => rx.boxed(),
            None => stream::empty().boxed(),
        }
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed access to the cluster objects the patcher reads and mutates

use crate::error::{PatcherError, Result};
use crate::kubernetes::events::{NamespaceEvent, NamespaceTracker};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{future, StreamExt};
use k8s_openapi::api::core::v1::{Namespace, Pod, Secret, ServiceAccount};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Api, Client,
};
use kube_runtime::{watcher, WatchStreamExt};
use tracing::{debug, instrument};

/// Operations the reconciliation pipeline needs from the cluster.
///
/// `get_secret` reports a missing secret as `Ok(None)`; every other failure
/// is an error.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;

    async fn get_namespace(&self, name: &str) -> Result<Namespace>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<()>;

    async fn patch_secret(&self, namespace: &str, name: &str, patch: &json_patch::Patch)
        -> Result<()>;

    async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<ServiceAccount>>;

    async fn patch_service_account(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<()>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    /// Subscribe to namespace lifecycle events. Stream errors are items, not termination.
    fn watch_namespaces(&self) -> BoxStream<'static, Result<NamespaceEvent>>;
}

/// `ClusterGateway` backed by a real Kubernetes API client
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(namespaces.list(&ListParams::default()).await?.items)
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(namespaces.get(name).await?)
    }

    #[instrument(skip(self))]
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        match secrets.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("Secret {}/{} does not exist", namespace, name);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, secret))]
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<()> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        secrets.create(&PostParams::default(), secret).await?;
        Ok(())
    }

    #[instrument(skip(self, patch))]
    async fn patch_secret(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<()> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        secrets
            .patch(name, &PatchParams::default(), &Patch::Json::<()>(patch.clone()))
            .await?;
        Ok(())
    }

    async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<ServiceAccount>> {
        let accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        Ok(accounts.list(&ListParams::default()).await?.items)
    }

    #[instrument(skip(self, patch))]
    async fn patch_service_account(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<()> {
        let accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        accounts
            .patch(name, &PatchParams::default(), &Patch::Json::<()>(patch.clone()))
            .await?;
        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.list(&ListParams::default()).await?.items)
    }

    #[instrument(skip(self))]
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    fn watch_namespaces(&self) -> BoxStream<'static, Result<NamespaceEvent>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let mut tracker = NamespaceTracker::new();

        watcher(namespaces, watcher::Config::default())
            .default_backoff()
            .filter_map(move |item| {
                let event = match item {
                    Ok(event) => tracker.observe(event).map(Ok),
                    Err(e) => Some(Err(PatcherError::Watch(e.to_string()))),
                };
                future::ready(event)
            })
            .boxed()
    }
}

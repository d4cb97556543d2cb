// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent mutations applied to a single namespace

use crate::config::Config;
use crate::constants::{secret, BROKEN_POD_REASONS};
use crate::error::{PatcherError, Result};
use crate::kubernetes::ClusterGateway;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use k8s_openapi::api::core::v1::{Pod, Secret, ServiceAccount};
use k8s_openapi::ByteString;
use kube::{api::ObjectMeta, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Per-object results of a fan-out action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    pub applied: usize,
    pub failed: usize,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }

    fn tally(results: impl IntoIterator<Item = bool>) -> Self {
        results.into_iter().fold(Self::default(), |mut acc, ok| {
            if ok {
                acc.applied += 1;
            } else {
                acc.failed += 1;
            }
            acc
        })
    }
}

/// The pull secret as it should exist in every namespace
pub fn desired_secret(config: &Config) -> Result<Secret> {
    let payload = STANDARD
        .decode(config.secret_payload.as_bytes())
        .map_err(|e| PatcherError::InvalidPayload(e.to_string()))?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(config.secret_name.clone()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            secret::DOCKER_CONFIG_KEY.to_string(),
            ByteString(payload),
        )])),
        type_: Some(secret::SECRET_TYPE.to_string()),
        ..Default::default()
    })
}

/// JSON patch replacing the whole secret data with the configured payload
pub fn secret_data_patch(payload: &str) -> Result<json_patch::Patch> {
    Ok(serde_json::from_value(json!([{
        "op": "replace",
        "path": "/data",
        "value": { (secret::DOCKER_CONFIG_KEY): payload }
    }]))?)
}

/// JSON patch pointing a service account's pull secrets at the managed secret
pub fn pull_secret_reference_patch(secret_name: &str) -> Result<json_patch::Patch> {
    Ok(serde_json::from_value(json!([{
        "op": "replace",
        "path": "/imagePullSecrets",
        "value": [{ "name": secret_name }]
    }]))?)
}

/// Accounts that already reference any pull secret are left alone
pub fn needs_pull_secret(account: &ServiceAccount) -> bool {
    account
        .image_pull_secrets
        .as_ref()
        .map_or(true, |refs| refs.is_empty())
}

/// A pod is broken when its first container is waiting on a failed image pull
pub fn is_broken(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.first())
        .and_then(|status| status.state.as_ref())
        .and_then(|state| state.waiting.as_ref())
        .and_then(|waiting| waiting.reason.as_deref())
        .is_some_and(|reason| BROKEN_POD_REASONS.contains(&reason))
}

pub async fn create_secret(gateway: &dyn ClusterGateway, config: &Config, namespace: &str) -> bool {
    let result = match desired_secret(config) {
        Ok(secret) => gateway.create_secret(namespace, &secret).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            info!("Created secret {} in namespace {}", config.secret_name, namespace);
            true
        }
        Err(e) => {
            error!("Could not create secret in namespace {}: {}", namespace, e);
            false
        }
    }
}

pub async fn patch_secret(gateway: &dyn ClusterGateway, config: &Config, namespace: &str) -> bool {
    let result = match secret_data_patch(&config.secret_payload) {
        Ok(patch) => {
            gateway
                .patch_secret(namespace, &config.secret_name, &patch)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            info!("Patched secret {} in namespace {}", config.secret_name, namespace);
            true
        }
        Err(e) => {
            error!("Could not patch secret of namespace {}: {}", namespace, e);
            false
        }
    }
}

/// Wire every service account without pull secrets to the managed secret
pub async fn patch_service_accounts(
    gateway: &dyn ClusterGateway,
    config: &Config,
    namespace: &str,
) -> ActionOutcome {
    let accounts = match gateway.list_service_accounts(namespace).await {
        Ok(accounts) => accounts,
        Err(e) => {
            error!("Could not list service accounts of namespace {}: {}", namespace, e);
            return ActionOutcome { applied: 0, failed: 1 };
        }
    };

    let patch = match pull_secret_reference_patch(&config.secret_name) {
        Ok(patch) => patch,
        Err(e) => {
            error!("Could not build service account patch: {}", e);
            return ActionOutcome { applied: 0, failed: 1 };
        }
    };

    let patches = accounts
        .iter()
        .filter(|account| needs_pull_secret(account))
        .map(|account| {
            let name = account.name_any();
            let patch = &patch;
            async move {
                match gateway.patch_service_account(namespace, &name, patch).await {
                    Ok(()) => {
                        info!("Patched service account {} of namespace {}", name, namespace);
                        true
                    }
                    Err(e) => {
                        warn!(
                            "Could not patch service account {} of namespace {}: {}",
                            name, namespace, e
                        );
                        false
                    }
                }
            }
        });

    ActionOutcome::tally(join_all(patches).await)
}

/// Delete pods stuck on an image pull so their owners recreate them
pub async fn restart_broken_pods(gateway: &dyn ClusterGateway, namespace: &str) -> ActionOutcome {
    let pods = match gateway.list_pods(namespace).await {
        Ok(pods) => pods,
        Err(e) => {
            error!("Could not get pods for namespace {}: {}", namespace, e);
            return ActionOutcome { applied: 0, failed: 1 };
        }
    };

    let deletions = pods.iter().filter(|pod| is_broken(pod)).map(|pod| {
        let name = pod.name_any();
        async move {
            info!("Restarting pod {}/{} stuck on image pull", namespace, name);
            match gateway.delete_pod(namespace, &name).await {
                Ok(()) => {
                    info!("Pod {}/{} was deleted", namespace, name);
                    true
                }
                Err(e) => {
                    warn!("Error occurred while deleting pod {}/{}: {}", namespace, name, e);
                    false
                }
            }
        }
    });

    ActionOutcome::tally(join_all(deletions).await)
}

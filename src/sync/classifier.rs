// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Decides whether a namespace takes part in a pass and what its secret needs.

use crate::config::Config;
use crate::constants::{annotations, secret::DOCKER_CONFIG_KEY};
use crate::kubernetes::ClusterGateway;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Listed in the configured exclusion set
    Excluded,
    /// Carries the skip-patching annotation
    Annotated,
    NamespaceUnreadable,
    SecretUnreadable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretState {
    Absent,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Skip(SkipReason),
    Unchanged,
    NeedsSync(SecretState),
}

/// Check if a namespace has the skip annotation set to "true"
pub fn has_skip_annotation(namespace: &Namespace) -> bool {
    namespace
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotations::SKIP_PATCHING))
        .is_some_and(|v| v == "true")
}

/// Whether the stored credential is byte-for-byte the configured payload
pub fn payload_matches(secret: &Secret, payload: &str) -> bool {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(DOCKER_CONFIG_KEY))
        .is_some_and(|stored| STANDARD.encode(&stored.0) == payload)
}

/// Classify a namespace. Read failures never propagate; they skip the namespace.
pub async fn classify(gateway: &dyn ClusterGateway, config: &Config, namespace: &str) -> Classification {
    if config.is_excluded(namespace) {
        info!("Skipping namespace {} due to exclusion list", namespace);
        return Classification::Skip(SkipReason::Excluded);
    }

    match gateway.get_namespace(namespace).await {
        Ok(ns) if has_skip_annotation(&ns) => {
            info!(
                "Namespace {} will not be updated, annotation {} restricts it",
                namespace,
                annotations::SKIP_PATCHING
            );
            return Classification::Skip(SkipReason::Annotated);
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Could not read namespace {}: {}", namespace, e);
            return Classification::Skip(SkipReason::NamespaceUnreadable);
        }
    }

    match gateway.get_secret(namespace, &config.secret_name).await {
        Ok(None) => {
            debug!("Secret {} missing in namespace {}", config.secret_name, namespace);
            Classification::NeedsSync(SecretState::Absent)
        }
        Ok(Some(secret)) if payload_matches(&secret, &config.secret_payload) => {
            info!("Secret for namespace {} unchanged and will not be updated", namespace);
            Classification::Unchanged
        }
        Ok(Some(_)) => Classification::NeedsSync(SecretState::Stale),
        Err(e) => {
            warn!(
                "Could not read secret {} in namespace {}, maybe it is not set up correctly: {}",
                config.secret_name, namespace, e
            );
            Classification::Skip(SkipReason::SecretUnreadable)
        }
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-namespace reconciliation: classify, sync the secret, wire service
//! accounts, restart broken pods.

use crate::config::Config;
use crate::kubernetes::ClusterGateway;
use crate::sync::actions::{create_secret, patch_secret, patch_service_accounts, restart_broken_pods};
use crate::sync::classifier::{classify, Classification, SecretState, SkipReason};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretAction {
    None,
    Create,
    Patch,
}

/// Outcome of one reconciliation pass over a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceReport {
    pub name: String,
    pub eligible: bool,
    pub secret_action: SecretAction,
    pub succeeded: bool,
}

impl NamespaceReport {
    pub fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            eligible: false,
            secret_action: SecretAction::None,
            succeeded: true,
        }
    }

    /// Not reconciled because a read failed; counts as a failure
    pub fn unreadable(name: &str) -> Self {
        Self {
            succeeded: false,
            ..Self::skipped(name)
        }
    }
}

/// Aggregate of the reports produced by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub total: usize,
    pub reconciled: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepSummary {
    pub fn from_reports(reports: &[NamespaceReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            summary.total += 1;
            match (report.eligible, report.succeeded) {
                (_, false) => summary.failed += 1,
                (false, true) => summary.skipped += 1,
                (true, true) => summary.reconciled += 1,
            }
            summary
        })
    }
}

/// Shared entry point used by both the periodic sweep and the namespace watcher
#[derive(Clone)]
pub struct Pipeline {
    gateway: Arc<dyn ClusterGateway>,
    config: Arc<Config>,
}

impl Pipeline {
    pub fn new(gateway: Arc<dyn ClusterGateway>, config: Arc<Config>) -> Self {
        Self { gateway, config }
    }

    pub fn gateway(&self) -> &dyn ClusterGateway {
        self.gateway.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reconcile one namespace. Every stage runs even if an earlier one failed.
    #[instrument(skip(self))]
    pub async fn reconcile_namespace(&self, namespace: &str) -> NamespaceReport {
        let gateway = self.gateway();
        let config = self.config();

        let (secret_action, secret_ok) = match classify(gateway, config, namespace).await {
            Classification::Skip(reason @ (SkipReason::Excluded | SkipReason::Annotated)) => {
                debug!("Namespace {} skipped: {:?}", namespace, reason);
                return NamespaceReport::skipped(namespace);
            }
            Classification::Skip(reason) => {
                warn!("Namespace {} not reconciled: {:?}", namespace, reason);
                return NamespaceReport::unreadable(namespace);
            }
            Classification::Unchanged => (SecretAction::None, true),
            Classification::NeedsSync(SecretState::Absent) => (
                SecretAction::Create,
                create_secret(gateway, config, namespace).await,
            ),
            Classification::NeedsSync(SecretState::Stale) => (
                SecretAction::Patch,
                patch_secret(gateway, config, namespace).await,
            ),
        };

        let accounts = patch_service_accounts(gateway, config, namespace).await;
        let pods = restart_broken_pods(gateway, namespace).await;

        let succeeded = secret_ok && accounts.succeeded() && pods.succeeded();
        if !succeeded {
            warn!(
                "Reconciliation of namespace {} incomplete: secret_ok={}, service account failures={}, pod restart failures={}",
                namespace, secret_ok, accounts.failed, pods.failed
            );
        }

        NamespaceReport {
            name: namespace.to_string(),
            eligible: true,
            secret_action,
            succeeded,
        }
    }

    /// Reconcile all given namespaces concurrently and wait for every one of them
    pub async fn reconcile_all<I>(&self, namespaces: I) -> SweepSummary
    where
        I: IntoIterator<Item = String>,
    {
        let names: Vec<String> = namespaces.into_iter().collect();
        let reports = join_all(names.iter().map(|name| self.reconcile_namespace(name))).await;

        let summary = SweepSummary::from_reports(&reports);
        info!(
            "Reconciled {} namespaces: {} ok, {} skipped, {} failed",
            summary.total, summary.reconciled, summary.skipped, summary.failed
        );
        summary
    }
}

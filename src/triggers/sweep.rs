// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Periodic full-cluster sweep

use crate::sync::{Pipeline, SweepSummary};
use kube::ResourceExt;
use tokio::time::sleep;
use tracing::{error, info, instrument};

pub struct Sweeper {
    pipeline: Pipeline,
}

impl Sweeper {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Sweep forever, or exactly once when the loop interval is zero
    pub async fn run(self) {
        let interval = self.pipeline.config().loop_interval;

        loop {
            self.run_once().await;

            if interval.is_zero() {
                info!("Loop interval is 0, not scheduling another sweep");
                return;
            }
            info!("Next sweep in {} seconds", interval.as_secs());
            sleep(interval).await;
        }
    }

    #[instrument(skip(self))]
    pub async fn run_once(&self) -> SweepSummary {
        let namespaces = match self.pipeline.gateway().list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                error!("Failed to list namespaces: {}", e);
                return SweepSummary::default();
            }
        };

        let config = self.pipeline.config();
        let eligible: Vec<String> = namespaces
            .iter()
            .map(|ns| ns.name_any())
            .filter(|name| !config.is_excluded(name))
            .collect();

        info!(
            "Found {} namespaces, {} after exclusion list",
            namespaces.len(),
            eligible.len()
        );

        self.pipeline.reconcile_all(eligible).await
    }
}

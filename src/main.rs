// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pull_secret_patcher::config::Config;
use pull_secret_patcher::kubernetes::{ClusterGateway, KubeGateway};
use pull_secret_patcher::sync::Pipeline;
use pull_secret_patcher::triggers::{Sweeper, Watcher};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting pull secret patcher");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: secret_name={}, excluded_namespaces={:?}, loop_interval={}s, watch_changes={}",
        config.secret_name,
        config.excluded_namespaces,
        config.loop_interval.as_secs(),
        config.watch_changes
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let watch_changes = config.watch_changes;
    let gateway: Arc<dyn ClusterGateway> = Arc::new(KubeGateway::new(client));
    let pipeline = Pipeline::new(gateway, Arc::new(config));
    let sweeper = Sweeper::new(pipeline.clone());

    if watch_changes {
        tokio::join!(sweeper.run(), Watcher::new(pipeline).run());
    } else {
        sweeper.run().await;
    }

    info!("Pull secret patcher finished");
    Ok(())
}

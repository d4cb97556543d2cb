// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace watcher - reconciles namespaces shortly after they are created.

use crate::kubernetes::NamespaceEvent;
use crate::sync::{NamespaceReport, Pipeline};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Creation events are ignored; the watch is still replaying existing namespaces
    Blind,
    Active,
}

/// Blind period that starts when the watcher starts and ends once, for good
#[derive(Debug, Clone, Copy)]
pub struct BlindWindow {
    opened_at: Instant,
    duration: Duration,
}

impl BlindWindow {
    pub fn open(duration: Duration) -> Self {
        Self {
            opened_at: Instant::now(),
            duration,
        }
    }

    pub fn state(&self) -> WatchState {
        if self.opened_at.elapsed() >= self.duration {
            WatchState::Active
        } else {
            WatchState::Blind
        }
    }
}

pub struct Watcher {
    pipeline: Pipeline,
}

impl Watcher {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Consume namespace events until the watch stream ends, then wait for
    /// the reconciliations already scheduled.
    pub async fn run(self) {
        let window = BlindWindow::open(self.pipeline.config().blind_time);
        let mut events = self.pipeline.gateway().watch_namespaces();
        let mut pending: JoinSet<NamespaceReport> = JoinSet::new();

        info!("Started watching for new namespaces");

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(NamespaceEvent::Added(name))) => {
                        if window.state() == WatchState::Blind {
                            debug!("Ignoring namespace {} seen during blind time", name);
                            continue;
                        }
                        self.schedule(&mut pending, name);
                    }
                    Some(Ok(other)) => {
                        debug!("Ignoring {} event for namespace {}", other.kind(), other.name())
                    }
                    Some(Err(e)) => warn!("Namespace watch error: {}", e),
                    None => break,
                },
                Some(joined) = pending.join_next(), if !pending.is_empty() => log_finished(joined),
            }
        }

        warn!("Namespace watch stream ended");
        while let Some(joined) = pending.join_next().await {
            log_finished(joined);
        }
    }

    fn schedule(&self, pending: &mut JoinSet<NamespaceReport>, name: String) {
        let settle = self.pipeline.config().setup_wait_time;
        info!(
            "Found new namespace {}, giving it {} seconds to set up",
            name,
            settle.as_secs()
        );

        let pipeline = self.pipeline.clone();
        pending.spawn(async move {
            sleep(settle).await;
            info!("Starting patching of namespace {}", name);
            pipeline.reconcile_namespace(&name).await
        });
    }
}

fn log_finished(joined: Result<NamespaceReport, tokio::task::JoinError>) {
    match joined {
        Ok(report) if !report.succeeded => error!("Failed to patch namespace {}", report.name),
        Ok(report) if !report.eligible => debug!("Namespace {} was not eligible", report.name),
        Ok(report) => info!("Finished patching of namespace {}", report.name),
        Err(e) => error!("Namespace reconciliation task failed: {}", e),
    }
}

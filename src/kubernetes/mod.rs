// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes access: the cluster gateway and namespace watch events.

pub mod events;
pub mod gateway;

pub use events::{NamespaceEvent, NamespaceTracker};
pub use gateway::{ClusterGateway, KubeGateway};

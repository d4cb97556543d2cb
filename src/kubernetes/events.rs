// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace lifecycle events derived from the kube-runtime watcher stream

use k8s_openapi::api::core::v1::Namespace;
use kube_runtime::watcher;
use kube::ResourceExt;
use std::collections::HashMap;

/// A change to a namespace as seen by the watch subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceEvent {
    Added(String),
    Modified(String),
    Deleted(String),
}

impl NamespaceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NamespaceEvent::Added(_) => "added",
            NamespaceEvent::Modified(_) => "modified",
            NamespaceEvent::Deleted(_) => "deleted",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NamespaceEvent::Added(name)
            | NamespaceEvent::Modified(name)
            | NamespaceEvent::Deleted(name) => name,
        }
    }
}

/// Tracks the namespaces seen so far so that watcher `Apply` events can be
/// split into creations and updates.
///
/// Namespaces are keyed by name and remembered with their uid, so a namespace
/// re-created under the same name counts as new. Every relist replaces the
/// known set. The first listing after the watch starts only seeds it; objects
/// that show up in a later relist without being known were created while the
/// watch was disconnected, so they are reported as `Added`.
#[derive(Debug, Default)]
pub struct NamespaceTracker {
    known: HashMap<String, Option<String>>,
    relisted: HashMap<String, Option<String>>,
    initial_listing_done: bool,
}

impl NamespaceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: watcher::Event<Namespace>) -> Option<NamespaceEvent> {
        match event {
            watcher::Event::Init => {
                self.relisted.clear();
                None
            }
            watcher::Event::InitApply(ns) => {
                let name = ns.name_any();
                let uid = ns.uid();
                let is_new = self.known.get(&name) != Some(&uid);
                self.relisted.insert(name.clone(), uid);
                (is_new && self.initial_listing_done).then_some(NamespaceEvent::Added(name))
            }
            watcher::Event::InitDone => {
                self.known = std::mem::take(&mut self.relisted);
                self.initial_listing_done = true;
                None
            }
            watcher::Event::Apply(ns) => {
                let name = ns.name_any();
                let uid = ns.uid();
                match self.known.insert(name.clone(), uid.clone()) {
                    Some(previous) if previous == uid => Some(NamespaceEvent::Modified(name)),
                    _ => Some(NamespaceEvent::Added(name)),
                }
            }
            watcher::Event::Delete(ns) => {
                let name = ns.name_any();
                self.known.remove(&name);
                Some(NamespaceEvent::Deleted(name))
            }
        }
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The two activities that drive the pipeline: a periodic sweep and a namespace watch.

pub mod sweep;
pub mod watcher;

pub use sweep::Sweeper;
pub use watcher::{BlindWindow, WatchState, Watcher};

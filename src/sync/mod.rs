// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pull secret synchronization logic.

pub mod actions;
pub mod classifier;
pub mod pipeline;

pub use classifier::{classify, Classification, SecretState, SkipReason};
pub use pipeline::{NamespaceReport, Pipeline, SecretAction, SweepSummary};

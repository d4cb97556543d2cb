// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::env;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::BTreeSet;
use std::time::Duration;

/// Patcher configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the pull secret managed in every namespace
    pub secret_name: String,
    /// Base64 `.dockerconfigjson` payload, exactly as stored in `Secret.data`
    pub secret_payload: String,
    pub excluded_namespaces: BTreeSet<String>,
    /// Pause between full sweeps; zero runs a single sweep
    pub loop_interval: Duration,
    pub watch_changes: bool,
    /// How long the watcher ignores creation events after it starts
    pub blind_time: Duration,
    /// Delay between seeing a new namespace and reconciling it
    pub setup_wait_time: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let secret_name = get(env::SECRET_NAME).unwrap_or_else(|| env::DEFAULT_SECRET_NAME.to_string());

        let Some(secret_payload) = get(env::SECRET) else {
            bail!("{} environment variable is missing", env::SECRET);
        };
        STANDARD
            .decode(secret_payload.as_bytes())
            .with_context(|| format!("{} is not valid base64", env::SECRET))?;

        let excluded_namespaces = parse_namespace_list(
            get(env::EXCLUDED_NAMESPACES)
                .as_deref()
                .unwrap_or(env::DEFAULT_EXCLUDED_NAMESPACES),
        )?;

        let loop_interval = parse_seconds(
            env::LOOP_DURATION,
            get(env::LOOP_DURATION),
            env::DEFAULT_LOOP_DURATION_SECS,
        )?;
        let blind_time = parse_seconds(
            env::BLIND_TIME,
            get(env::BLIND_TIME),
            env::DEFAULT_BLIND_TIME_SECS,
        )?;
        let setup_wait_time = parse_seconds(
            env::WAIT_SETUP_TIME,
            get(env::WAIT_SETUP_TIME),
            env::DEFAULT_WAIT_SETUP_TIME_SECS,
        )?;

        let watch_changes = match get(env::WATCH_CHANGES).as_deref() {
            None => env::DEFAULT_WATCH_CHANGES,
            Some("true") => true,
            Some("false") => false,
            Some(other) => bail!(
                "Invalid {} '{}' (can only be true or false)",
                env::WATCH_CHANGES,
                other
            ),
        };

        Ok(Config {
            secret_name,
            secret_payload,
            excluded_namespaces,
            loop_interval,
            watch_changes,
            blind_time,
            setup_wait_time,
        })
    }

    pub fn is_excluded(&self, namespace: &str) -> bool {
        self.excluded_namespaces.contains(namespace)
    }
}

fn parse_seconds(key: &str, value: Option<String>, default: u64) -> Result<Duration> {
    let Some(raw) = value else {
        return Ok(Duration::from_secs(default));
    };
    let secs: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a whole number of seconds, got '{}'", key, raw))?;
    if secs < 0 {
        bail!("{} can't be lower than 0", key);
    }
    Ok(Duration::from_secs(secs.unsigned_abs()))
}

fn parse_namespace_list(raw: &str) -> Result<BTreeSet<String>> {
    let mut namespaces = BTreeSet::new();
    for entry in raw.split(',') {
        if entry.is_empty() {
            bail!("Invalid {} '{}'", env::EXCLUDED_NAMESPACES, raw);
        }
        namespaces.insert(entry.to_string());
    }
    Ok(namespaces)
}

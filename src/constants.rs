// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys read by the patcher
pub mod annotations {
    /// When set to "true" on a namespace, the namespace is never patched
    pub const SKIP_PATCHING: &str = "k8s.secret-patcher/skip-patching";
}

/// Shape of the managed pull secret
pub mod secret {
    /// Data key holding the registry credential blob
    pub const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";
    pub const SECRET_TYPE: &str = "kubernetes.io/dockerconfigjson";
}

/// Waiting reasons that mark a pod as stuck on an image pull
pub const BROKEN_POD_REASONS: [&str; 2] = ["ImagePullBackOff", "ErrImagePull"];

/// Environment variable names and their defaults
pub mod env {
    pub const SECRET_NAME: &str = "CONFIG_SECRET_NAME";
    pub const SECRET: &str = "CONFIG_SECRET";
    pub const LOOP_DURATION: &str = "CONFIG_LOOP_DURATION";
    pub const EXCLUDED_NAMESPACES: &str = "CONFIG_EXCLUDED_NAMESPACES";
    pub const WATCH_CHANGES: &str = "CONFIG_WATCH_CHANGES";
    pub const BLIND_TIME: &str = "CONFIG_BLIND_TIME";
    pub const WAIT_SETUP_TIME: &str = "CONFIG_WAIT_SETUP_TIME";

    pub const DEFAULT_SECRET_NAME: &str = "pull-secret-patcher";
    pub const DEFAULT_LOOP_DURATION_SECS: u64 = 0;
    pub const DEFAULT_EXCLUDED_NAMESPACES: &str = "default,kube-system";
    pub const DEFAULT_WATCH_CHANGES: bool = true;
    pub const DEFAULT_BLIND_TIME_SECS: u64 = 10;
    pub const DEFAULT_WAIT_SETUP_TIME_SECS: u64 = 60;
}

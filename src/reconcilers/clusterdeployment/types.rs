// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared types and imports for `ClusterDeployment` reconciliation.
//!
//! This module provides common type re-exports and the outcome type shared by the
//! clusterdeployment reconciliation modules.

#![allow(clippy::wildcard_imports)]

// Re-export commonly used types from parent modules
pub use crate::context::Context;
pub use crate::crd::{
    ClusterDeployment, ClusterDeploymentSpec, ClusterDeploymentStatus, ClusterDeprovisionRequest,
    ClusterImageSet, Condition, DNSZone, SecretReference,
};
pub use crate::errors::{ReconcileError, StoreError};
pub use crate::labels::{
    CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION, CLUSTER_TYPE_LABEL, DEFAULT_CLUSTER_TYPE,
    DELETE_AFTER_ANNOTATION, FINALIZER_DEPROVISION, JOB_HASH_ANNOTATION,
};
pub use crate::store::{ObjectKey, ObjectStore, Propagation};

// Re-export commonly used Kubernetes types
pub use k8s_openapi::{
    api::{
        batch::v1::Job,
        core::v1::{ConfigMap, Namespace, Pod, Secret},
    },
    apimachinery::pkg::apis::meta::v1::Time,
    ByteString,
};

// Re-export kube-rs types
pub use kube::ResourceExt;

// Re-export common utilities
pub use chrono::{DateTime, Utc};
pub use std::collections::BTreeMap;
pub use std::sync::Arc;
pub use std::time::Duration;
pub use tracing::{debug, error, info, warn};

/// Result of a reconciliation pass that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the next change notification
    Done,
    /// Run again after the given delay, regardless of notifications
    RequeueAfter(Duration),
}

/// Cluster type label value used for metrics.
#[must_use]
pub fn cluster_type(cd: &ClusterDeployment) -> String {
    cd.labels()
        .get(CLUSTER_TYPE_LABEL)
        .cloned()
        .unwrap_or_else(|| DEFAULT_CLUSTER_TYPE.to_string())
}

/// Seconds elapsed since `since`, never negative.
#[must_use]
pub fn seconds_since(since: Option<&Time>, now: DateTime<Utc>) -> f64 {
    since.map_or(0.0, |t| {
        #[allow(clippy::cast_precision_loss)]
        let millis = (now - t.0).num_milliseconds().max(0) as f64;
        millis / 1000.0
    })
}

/// Whether `cd` has been installed.
#[must_use]
pub fn is_installed(cd: &ClusterDeployment) -> bool {
    cd.status.as_ref().is_some_and(|status| status.installed)
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `ClusterDeployment` controller.
//!
//! The controller and every reconciliation pass receive an `Arc<Context<S>>` that contains:
//! - the [`ObjectStore`] used for all reads and writes
//! - the [`ArtifactBuilder`] templating install workloads
//! - the [`RemoteClusterFactory`] connecting to installed clusters
//! - the [`MetricsSink`] receiving lifecycle metrics
//! - the operator configuration and the per-object error backoff
//!
//! Tests build a context around a [`crate::store::MemoryStore`] and swap collaborators
//! with the `with_*` methods.

use crate::config::{ImageDefaults, OperatorConfig};
use crate::install_resources::{ArtifactBuilder, TemplateArtifactBuilder};
use crate::metrics::MetricsSink;
use crate::reconcilers::backoff::ErrorBackoff;
use crate::remote::{KubeRemoteClusterFactory, RemoteClusterFactory};
use crate::store::ObjectStore;
use std::sync::Arc;

/// Shared context passed to the controller.
pub struct Context<S: ObjectStore> {
    /// Store for every API read and write
    pub store: S,

    /// Builder of install and imageset jobs
    pub builder: Arc<dyn ArtifactBuilder>,

    /// Factory of clients for installed clusters
    pub remote: Arc<dyn RemoteClusterFactory>,

    /// Metrics for observability
    pub metrics: Arc<dyn MetricsSink>,

    pub config: OperatorConfig,

    /// Retry delays of failed reconciliations, keyed by `namespace/name`
    pub backoff: ErrorBackoff,
}

impl<S: ObjectStore> Context<S> {
    /// Context with the production artifact builder and remote cluster factory.
    #[must_use]
    pub fn new(store: S, config: OperatorConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        let backoff = ErrorBackoff::new(config.error_backoff_base, config.error_backoff_max);
        Self {
            store,
            builder: Arc::new(TemplateArtifactBuilder),
            remote: Arc::new(KubeRemoteClusterFactory),
            metrics,
            config,
            backoff,
        }
    }

    #[must_use]
    pub fn with_builder(mut self, builder: Arc<dyn ArtifactBuilder>) -> Self {
        self.builder = builder;
        self
    }

    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteClusterFactory>) -> Self {
        self.remote = remote;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: ErrorBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Images used when neither a deployment nor its image set names one
    #[must_use]
    pub fn images(&self) -> &dyn ImageDefaults {
        &self.config
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;

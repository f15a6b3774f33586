// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Metrics for the clusterward operator.
//!
//! Reconcilers never touch a global registry. They report through an injected
//! [`MetricsSink`], which keeps the engine testable:
//!
//! - [`PrometheusMetrics`] owns a Prometheus [`Registry`] exposed on `/metrics`, with the
//!   namespace prefix `clusterward_firestoned_io_` (prometheus-safe "clusterward.firestoned.io")
//! - [`RecordingMetrics`] keeps every observation in memory so tests can assert on them
//!
//! # Example
//!
//! ```rust,no_run
//! use clusterward::metrics::{MetricsSink, PrometheusMetrics};
//!
//! let metrics = PrometheusMetrics::new().expect("metrics register");
//! metrics.cluster_created("aws");
//! let text = metrics.gather().expect("metrics encode");
//! assert!(text.contains("clusterward_firestoned_io_cluster_deployments_created_total"));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Mutex;
use std::time::Duration;

/// Namespace prefix for all clusterward metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "clusterward_firestoned_io";

/// Observations emitted by the reconcilers.
///
/// `cluster_type` is the value of the `clusterward.firestoned.io/cluster-type` label.
pub trait MetricsSink: Send + Sync {
    /// A `ClusterDeployment` got its deprovision finalizer for the first time
    fn cluster_created(&self, cluster_type: &str);

    /// An install job was observed succeeding for the first time
    fn cluster_installed(&self, cluster_type: &str);

    /// The deprovision finalizer was removed
    fn cluster_deleted(&self, cluster_type: &str);

    /// Runtime of a completed install job
    fn install_job_duration(&self, duration: Duration);

    /// Container restarts of a completed installation
    fn install_restarts(&self, cluster_type: &str, restarts: i32);

    /// Seconds between deployment creation and install job creation
    fn install_delay(&self, seconds: f64);

    /// Seconds between deployment creation and installer image resolution job creation
    fn imageset_delay(&self, seconds: f64);

    /// Seconds a provision has been underway; 0 clears it
    fn provision_underway(&self, name: &str, namespace: &str, cluster_type: &str, seconds: f64);

    /// Seconds a deprovision has been underway; 0 clears it
    fn deprovision_underway(&self, name: &str, namespace: &str, cluster_type: &str, seconds: f64);

    /// One request issued against the API server
    fn store_request(&self, controller: &str, verb: &str, resource: &str);

    /// A finished reconciliation pass and its outcome (`success`, `requeue` or `error`)
    fn reconciliation(&self, status: &str, duration: Duration);
}

// ============================================================================
// Prometheus
// ============================================================================

/// [`MetricsSink`] backed by a Prometheus registry.
pub struct PrometheusMetrics {
    registry: Registry,
    clusters_created: CounterVec,
    clusters_installed: CounterVec,
    clusters_deleted: CounterVec,
    install_job_duration: Histogram,
    completed_install_restarts: HistogramVec,
    install_delay: Histogram,
    imageset_delay: Histogram,
    provision_underway: GaugeVec,
    deprovision_underway: GaugeVec,
    kube_client_requests: CounterVec,
    reconciliations: CounterVec,
    reconciliation_duration: Histogram,
}

fn metric_name(name: &str) -> String {
    format!("{METRICS_NAMESPACE}_{name}")
}

impl PrometheusMetrics {
    /// Create every metric and register it in a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric definition is invalid or registered twice.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let clusters_created = CounterVec::new(
            Opts::new(
                metric_name("cluster_deployments_created_total"),
                "Counter incremented every time a new cluster is observed",
            ),
            &["cluster_type"],
        )?;
        let clusters_installed = CounterVec::new(
            Opts::new(
                metric_name("cluster_deployments_installed_total"),
                "Counter incremented every time a successful installation is observed",
            ),
            &["cluster_type"],
        )?;
        let clusters_deleted = CounterVec::new(
            Opts::new(
                metric_name("cluster_deployments_deleted_total"),
                "Counter incremented every time a deleted cluster is observed",
            ),
            &["cluster_type"],
        )?;
        let install_job_duration = Histogram::with_opts(
            HistogramOpts::new(
                metric_name("install_job_duration_seconds"),
                "Distribution of the runtime of completed install jobs",
            )
            .buckets(vec![60.0, 300.0, 600.0, 1200.0, 1800.0, 2400.0, 3000.0, 3600.0]),
        )?;
        let completed_install_restarts = HistogramVec::new(
            HistogramOpts::new(
                metric_name("completed_install_restarts"),
                "Distribution of the number of restarts for all completed cluster installations",
            )
            .buckets(vec![0.0, 2.0, 10.0, 20.0, 50.0]),
            &["cluster_type"],
        )?;
        let install_delay = Histogram::with_opts(
            HistogramOpts::new(
                metric_name("install_job_delay_seconds"),
                "Time between cluster deployment creation and creation of its install job",
            )
            .buckets(vec![30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0]),
        )?;
        let imageset_delay = Histogram::with_opts(
            HistogramOpts::new(
                metric_name("imageset_job_delay_seconds"),
                "Time between cluster deployment creation and creation of its installer image resolution job",
            )
            .buckets(vec![10.0, 30.0, 60.0, 300.0, 600.0, 1200.0, 1800.0]),
        )?;
        let provision_underway = GaugeVec::new(
            Opts::new(
                metric_name("provision_underway_seconds"),
                "Seconds since a cluster deployment was created while it is still provisioning",
            ),
            &["cluster_deployment", "namespace", "cluster_type"],
        )?;
        let deprovision_underway = GaugeVec::new(
            Opts::new(
                metric_name("deprovision_underway_seconds"),
                "Seconds since a cluster deployment was deleted while it is still deprovisioning",
            ),
            &["cluster_deployment", "namespace", "cluster_type"],
        )?;
        let kube_client_requests = CounterVec::new(
            Opts::new(
                metric_name("kube_client_requests_total"),
                "Counter incremented for each request sent to the API server",
            ),
            &["controller", "method", "resource"],
        )?;
        let reconciliations = CounterVec::new(
            Opts::new(
                metric_name("reconciliations_total"),
                "Total number of reconciliations by outcome",
            ),
            &["status"],
        )?;
        let reconciliation_duration = Histogram::with_opts(
            HistogramOpts::new(
                metric_name("reconciliation_duration_seconds"),
                "Duration of reconciliations in seconds",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        registry.register(Box::new(clusters_created.clone()))?;
        registry.register(Box::new(clusters_installed.clone()))?;
        registry.register(Box::new(clusters_deleted.clone()))?;
        registry.register(Box::new(install_job_duration.clone()))?;
        registry.register(Box::new(completed_install_restarts.clone()))?;
        registry.register(Box::new(install_delay.clone()))?;
        registry.register(Box::new(imageset_delay.clone()))?;
        registry.register(Box::new(provision_underway.clone()))?;
        registry.register(Box::new(deprovision_underway.clone()))?;
        registry.register(Box::new(kube_client_requests.clone()))?;
        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(reconciliation_duration.clone()))?;

        Ok(Self {
            registry,
            clusters_created,
            clusters_installed,
            clusters_deleted,
            install_job_duration,
            completed_install_restarts,
            install_delay,
            imageset_delay,
            provision_underway,
            deprovision_underway,
            kube_client_requests,
            reconciliations,
            reconciliation_duration,
        })
    }

    /// Gather and encode all metrics in Prometheus text format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
    }
}

impl MetricsSink for PrometheusMetrics {
    fn cluster_created(&self, cluster_type: &str) {
        self.clusters_created.with_label_values(&[cluster_type]).inc();
    }

    fn cluster_installed(&self, cluster_type: &str) {
        self.clusters_installed
            .with_label_values(&[cluster_type])
            .inc();
    }

    fn cluster_deleted(&self, cluster_type: &str) {
        self.clusters_deleted.with_label_values(&[cluster_type]).inc();
    }

    fn install_job_duration(&self, duration: Duration) {
        self.install_job_duration.observe(duration.as_secs_f64());
    }

    fn install_restarts(&self, cluster_type: &str, restarts: i32) {
        self.completed_install_restarts
            .with_label_values(&[cluster_type])
            .observe(f64::from(restarts));
    }

    fn install_delay(&self, seconds: f64) {
        self.install_delay.observe(seconds);
    }

    fn imageset_delay(&self, seconds: f64) {
        self.imageset_delay.observe(seconds);
    }

    fn provision_underway(&self, name: &str, namespace: &str, cluster_type: &str, seconds: f64) {
        self.provision_underway
            .with_label_values(&[name, namespace, cluster_type])
            .set(seconds);
    }

    fn deprovision_underway(&self, name: &str, namespace: &str, cluster_type: &str, seconds: f64) {
        self.deprovision_underway
            .with_label_values(&[name, namespace, cluster_type])
            .set(seconds);
    }

    fn store_request(&self, controller: &str, verb: &str, resource: &str) {
        self.kube_client_requests
            .with_label_values(&[controller, verb, resource])
            .inc();
    }

    fn reconciliation(&self, status: &str, duration: Duration) {
        self.reconciliations.with_label_values(&[status]).inc();
        self.reconciliation_duration.observe(duration.as_secs_f64());
    }
}

// ============================================================================
// In-memory recording
// ============================================================================

/// A single observation captured by [`RecordingMetrics`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    ClusterCreated { cluster_type: String },
    ClusterInstalled { cluster_type: String },
    ClusterDeleted { cluster_type: String },
    InstallJobDuration { seconds: f64 },
    InstallRestarts { cluster_type: String, restarts: i32 },
    InstallDelay { seconds: f64 },
    ImageSetDelay { seconds: f64 },
    ProvisionUnderway { name: String, namespace: String, seconds: f64 },
    DeprovisionUnderway { name: String, namespace: String, seconds: f64 },
    StoreRequest { verb: String, resource: String },
    Reconciliation { status: String },
}

/// [`MetricsSink`] that records every observation in order.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&MetricEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn push(&self, event: MetricEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl MetricsSink for RecordingMetrics {
    fn cluster_created(&self, cluster_type: &str) {
        self.push(MetricEvent::ClusterCreated {
            cluster_type: cluster_type.to_string(),
        });
    }

    fn cluster_installed(&self, cluster_type: &str) {
        self.push(MetricEvent::ClusterInstalled {
            cluster_type: cluster_type.to_string(),
        });
    }

    fn cluster_deleted(&self, cluster_type: &str) {
        self.push(MetricEvent::ClusterDeleted {
            cluster_type: cluster_type.to_string(),
        });
    }

    fn install_job_duration(&self, duration: Duration) {
        self.push(MetricEvent::InstallJobDuration {
            seconds: duration.as_secs_f64(),
        });
    }

    fn install_restarts(&self, cluster_type: &str, restarts: i32) {
        self.push(MetricEvent::InstallRestarts {
            cluster_type: cluster_type.to_string(),
            restarts,
        });
    }

    fn install_delay(&self, seconds: f64) {
        self.push(MetricEvent::InstallDelay { seconds });
    }

    fn imageset_delay(&self, seconds: f64) {
        self.push(MetricEvent::ImageSetDelay { seconds });
    }

    fn provision_underway(&self, name: &str, namespace: &str, _cluster_type: &str, seconds: f64) {
        self.push(MetricEvent::ProvisionUnderway {
            name: name.to_string(),
            namespace: namespace.to_string(),
            seconds,
        });
    }

    fn deprovision_underway(&self, name: &str, namespace: &str, _cluster_type: &str, seconds: f64) {
        self.push(MetricEvent::DeprovisionUnderway {
            name: name.to_string(),
            namespace: namespace.to_string(),
            seconds,
        });
    }

    fn store_request(&self, _controller: &str, verb: &str, resource: &str) {
        self.push(MetricEvent::StoreRequest {
            verb: verb.to_string(),
            resource: resource.to_string(),
        });
    }

    fn reconciliation(&self, status: &str, _duration: Duration) {
        self.push(MetricEvent::Reconciliation {
            status: status.to_string(),
        });
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use clap::Parser;
use clusterward::{
    config::{Cli, OperatorConfig},
    constants::BACKOFF_PRUNE_INTERVAL_SECS,
    context::Context,
    crd::{ClusterDeployment, ClusterDeprovisionRequest, DNSZone},
    errors::ReconcileError,
    metrics::{MetricsSink, PrometheusMetrics},
    reconcilers::{prune_error_backoff, reconcile_clusterdeployment, ReconcileOutcome},
    store::{KubeStore, ObjectKey},
    watch::{cluster_deployment_for_owner, cluster_deployment_for_pod},
};
use futures::StreamExt;
use k8s_openapi::api::{batch::v1::Job, core::v1::Pod};
use kube::{
    runtime::{controller, controller::Action, watcher, Controller},
    Api, Client,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

type ControllerContext = Context<KubeStore>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("clusterward-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(OperatorConfig::from(cli)))
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting ClusterDeployment Controller");
    debug!(?config, "Logging initialized with file and line number tracking");

    let metrics = Arc::new(PrometheusMetrics::new()?);

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let store = KubeStore::new(client.clone(), metrics.clone(), &config.controller_name);
    let metrics_addr = config.metrics_addr.clone();
    let ctx = Arc::new(Context::new(store, config, metrics.clone()));

    // Neither task should ever exit - if one does, we log it and exit the main process
    tokio::select! {
        result = run_metrics_server(metrics_addr, metrics) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
        () = run_backoff_pruner(ctx.clone()) => {
            error!("CRITICAL: error backoff pruner exited unexpectedly");
            anyhow::bail!("error backoff pruner exited unexpectedly")
        }
        result = run_clusterdeployment_controller(client, ctx) => {
            error!("CRITICAL: ClusterDeployment controller exited: {:?}", result);
            result?;
            info!("ClusterDeployment controller shut down");
            Ok(())
        }
    }
}

/// Serve `/metrics` and `/healthz`
async fn run_metrics_server(addr: String, metrics: Arc<PrometheusMetrics>) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(serve_metrics))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(metrics);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Serving metrics on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_metrics(State(metrics): State<Arc<PrometheusMetrics>>) -> (StatusCode, String) {
    match metrics.gather() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Periodically forget the error backoff of deleted deployments
async fn run_backoff_pruner(ctx: Arc<ControllerContext>) {
    let mut interval = tokio::time::interval(Duration::from_secs(BACKOFF_PRUNE_INTERVAL_SECS));
    loop {
        interval.tick().await;
        if let Err(e) = prune_error_backoff(&ctx).await {
            warn!("Failed to prune error backoff: {}", e);
        }
    }
}

/// Run the `ClusterDeployment` controller
///
/// Deployments are re-queued when a child they control changes, and when a pod
/// labelled with their name changes.
async fn run_clusterdeployment_controller(client: Client, ctx: Arc<ControllerContext>) -> Result<()> {
    info!("Starting ClusterDeployment controller");

    let api = Api::<ClusterDeployment>::all(client.clone());
    let concurrency = ctx.config.concurrency;

    Controller::new(api, watcher::Config::default())
        .watches(
            Api::<Job>::all(client.clone()),
            watcher::Config::default(),
            |job| cluster_deployment_for_owner(&job),
        )
        .watches(
            Api::<DNSZone>::all(client.clone()),
            watcher::Config::default(),
            |zone| cluster_deployment_for_owner(&zone),
        )
        .watches(
            Api::<ClusterDeprovisionRequest>::all(client.clone()),
            watcher::Config::default(),
            |request| cluster_deployment_for_owner(&request),
        )
        .watches(
            Api::<Pod>::all(client),
            watcher::Config::default(),
            |pod| cluster_deployment_for_pod(&pod),
        )
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile_clusterdeployment_wrapper, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj_ref, action)) => debug!("Reconciled {}: {:?}", obj_ref, action),
                Err(e) => warn!("Reconciliation error: {}", e),
            }
        })
        .await;

    Ok(())
}

async fn reconcile_clusterdeployment_wrapper(
    cd: Arc<ClusterDeployment>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let key = ObjectKey::of(cd.as_ref());

    match reconcile_clusterdeployment(&ctx, &key).await {
        Ok(outcome) => {
            ctx.backoff.reset(&key.to_string());
            match outcome {
                ReconcileOutcome::Done => {
                    ctx.metrics.reconciliation("success", start.elapsed());
                    Ok(Action::await_change())
                }
                ReconcileOutcome::RequeueAfter(delay) => {
                    ctx.metrics.reconciliation("requeue", start.elapsed());
                    Ok(Action::requeue(delay))
                }
            }
        }
        Err(e) => {
            error!(
                cluster_deployment = %key,
                error_kind = e.kind(),
                "Failed to reconcile ClusterDeployment: {}",
                e
            );
            ctx.metrics.reconciliation("error", start.elapsed());
            Err(e)
        }
    }
}

fn error_policy(cd: Arc<ClusterDeployment>, _err: &ReconcileError, ctx: Arc<ControllerContext>) -> Action {
    let key = ObjectKey::of(cd.as_ref()).to_string();
    let delay = ctx.backoff.next_delay(&key);
    debug!(cluster_deployment = %key, ?delay, "Requeueing after error");
    Action::requeue(delay)
}

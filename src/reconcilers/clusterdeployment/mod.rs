// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ClusterDeployment` reconciliation logic.
//!
//! This module drives a cluster from creation through installation to deprovisioning.
//! Each pass re-reads the deployment, takes at most one step toward the desired state
//! and returns. Waiting is never done in place: a pass either relies on a change
//! notification from an owned resource or asks to be requeued after a delay.
//!
//! The deployment read at the start of a pass (`observed`) is never modified. Changes
//! are made on a copy (`desired`) and status is written only when the two differ.
//!
//! ## Module Structure
//!
//! - [`deletion`] - Teardown of deleted deployments
//! - [`dns`] - Managed DNS zone gate
//! - [`expiry`] - `delete-after` annotation handling
//! - [`images`] - Image resolution and the imageset job
//! - [`install`] - Install job lifecycle
//! - [`migration`] - Legacy wildcard ingress migration
//! - [`status_helpers`] - Status convergence
//! - [`types`] - Shared types and imports

// Submodules
pub mod deletion;
pub mod dns;
pub mod expiry;
pub mod images;
pub mod install;
pub mod migration;
pub mod status_helpers;
pub mod types;

#[cfg(test)]
mod fixtures;

// Re-export public APIs for external use
pub use types::ReconcileOutcome;

// Internal imports
use deletion::{clear_underway_metrics, decide_deletion, sync_deleted, DeletionDecision};
use dns::ensure_managed_dns_zone;
use expiry::{decide_expiry, ExpiryDecision};
use images::{
    resolve_image_set, resolve_installer_image, resolve_operator_image, resolve_release_image,
    ImageSetStep,
};
use install::{load_secret_data, sync_install_job, InstallInputs};
use migration::migrate_wildcard_ingress;
use status_helpers::{converge_status, job_succeeded};
#[allow(clippy::wildcard_imports)]
use types::*;

use crate::constants::SSH_PUBLIC_KEY_SECRET_KEY;
use crate::install_resources::install_job_name;
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, is_terminating};

/// Reconciles the `ClusterDeployment` stored under `key`.
///
/// One pass runs the first applicable step of the following workflow:
/// 1. Returns when the deployment no longer exists
/// 2. Migrates legacy wildcard ingress domains
/// 3. Resolves the referenced `ClusterImageSet`
/// 4. Runs the deletion workflow for deleted deployments
/// 5. Deletes expired deployments
/// 6. Adds the deprovision finalizer
/// 7. Resolves the installer image
/// 8. Waits for the managed DNS zone
/// 9. Creates or replaces the install job
/// 10. Converges status and reports completed installs
///
/// # Arguments
///
/// * `ctx` - Operator context with the store, builders and metrics
/// * `key` - Namespace and name of the deployment
///
/// # Returns
///
/// * `Ok(ReconcileOutcome::Done)` - Nothing to do until the next change
/// * `Ok(ReconcileOutcome::RequeueAfter(_))` - Reconcile again after the delay
///
/// # Errors
///
/// Returns an error if a store operation fails, the deployment is misconfigured, install
/// artifacts cannot be generated, or the installed cluster cannot be queried.
pub async fn reconcile_clusterdeployment<S: ObjectStore>(
    ctx: &Context<S>,
    key: &ObjectKey,
) -> Result<ReconcileOutcome, ReconcileError> {
    let start = std::time::Instant::now();
    info!("Reconciling ClusterDeployment: {}", key);

    let result = reconcile_pass(ctx, key).await;

    debug!(
        cluster_deployment = %key,
        elapsed_ms = start.elapsed().as_millis(),
        "Reconcile complete"
    );
    result
}

async fn reconcile_pass<S: ObjectStore>(
    ctx: &Context<S>,
    key: &ObjectKey,
) -> Result<ReconcileOutcome, ReconcileError> {
    let Some(observed) = ctx.store.get::<ClusterDeployment>(key).await? else {
        info!("ClusterDeployment {} not found", key);
        ctx.backoff.reset(&key.to_string());
        return Ok(ReconcileOutcome::Done);
    };
    let mut desired = observed.clone();
    let namespace = observed.namespace().unwrap_or_default();
    let name = observed.name_any();

    if migrate_wildcard_ingress(&mut desired.spec) {
        info!("Migrating wildcard ingress entries of {}/{}", namespace, name);
        ctx.store.update(&desired).await?;
        return Ok(ReconcileOutcome::Done);
    }

    let image_set = match resolve_image_set(ctx, &mut desired).await? {
        ImageSetStep::StatusUpdated => return Ok(ReconcileOutcome::Done),
        ImageSetStep::Continue(image_set) => image_set,
    };
    let operator_image =
        resolve_operator_image(&desired.spec, image_set.as_ref(), ctx.images());
    let release_image = resolve_release_image(&desired.spec, image_set.as_ref());

    match decide_deletion(&observed) {
        DeletionDecision::Active => {}
        DeletionDecision::ClearMetrics => {
            clear_underway_metrics(ctx, &observed);
            return Ok(ReconcileOutcome::Done);
        }
        DeletionDecision::Deprovision => {
            let cluster_type = cluster_type(&observed);
            ctx.metrics.deprovision_underway(
                &name,
                &namespace,
                &cluster_type,
                seconds_since(observed.metadata.deletion_timestamp.as_ref(), Utc::now()),
            );
            if !is_installed(&observed) {
                ctx.metrics
                    .provision_underway(&name, &namespace, &cluster_type, 0.0);
            }
            return sync_deleted(ctx, &observed).await;
        }
    }

    let mut requeue_after = None;
    match decide_expiry(
        observed.metadata.creation_timestamp.as_ref(),
        observed.annotations().get(DELETE_AFTER_ANNOTATION).map(String::as_str),
        Utc::now(),
        ctx.config.expiry_grace,
    )? {
        ExpiryDecision::NoExpiry => {}
        ExpiryDecision::Expired { expiry } => {
            info!(expiry = %expiry, "Cluster has expired, issuing delete");
            ctx.store
                .delete::<ClusterDeployment>(key, Propagation::Default)
                .await
                .inspect_err(|e| error!(error = %e, "Error deleting expired cluster"))?;
            return Ok(ReconcileOutcome::Done);
        }
        ExpiryDecision::RequeueAfter(delay) => requeue_after = Some(delay),
    }

    if !has_finalizer(&observed, FINALIZER_DEPROVISION) {
        debug!("Adding ClusterDeployment finalizer");
        ensure_finalizer(&ctx.store, &observed, FINALIZER_DEPROVISION)
            .await
            .inspect_err(|e| error!(error = %e, "Error adding finalizer"))?;
        ctx.metrics.cluster_created(&cluster_type(&observed));
        return Ok(ReconcileOutcome::Done);
    }

    debug!("Loading SSH key secret");
    let Some(ssh_key_ref) = desired.spec.ssh_key.as_ref() else {
        error!("Cluster has no ssh key set, unable to launch install");
        return Err(ReconcileError::Config(
            "cluster has no ssh key set, unable to launch install".to_string(),
        ));
    };
    let ssh_key = load_secret_data(
        &ctx.store,
        &namespace,
        &ssh_key_ref.name,
        SSH_PUBLIC_KEY_SECRET_KEY,
    )
    .await
    .inspect_err(|e| error!(error = %e, "Unable to load ssh key from secret"))?;

    let Some(installer_image) = observed
        .status
        .as_ref()
        .and_then(|status| status.installer_image.clone())
        .filter(|image| !image.is_empty())
    else {
        return resolve_installer_image(ctx, &mut desired, image_set.as_ref(), &release_image)
            .await;
    };

    if desired.spec.manage_dns && !ensure_managed_dns_zone(ctx, &desired).await? {
        // The owned DNSZone triggers a new pass once it becomes available
        debug!("DNSZone is not yet available, waiting for zone to become available");
        return Ok(ReconcileOutcome::Done);
    }

    let job_key = ObjectKey::namespaced(&namespace, &install_job_name(&name));
    let existing_job: Option<Job> = ctx.store.get(&job_key).await?;
    if existing_job.as_ref().is_some_and(is_terminating) {
        info!(job = %job_key, "Install job is being deleted, requeueing to wait for deletion");
        return Ok(ReconcileOutcome::RequeueAfter(ctx.config.terminating_requeue));
    }
    let installed = is_installed(&observed);
    let first_installed_observe =
        !installed && existing_job.as_ref().is_some_and(job_succeeded);

    if installed {
        debug!("Cluster is already installed, no processing of install job needed");
    } else {
        let inputs = InstallInputs {
            installer_image: &installer_image,
            operator_image: &operator_image,
            release_image: &release_image,
            ssh_key: &ssh_key,
        };
        if let Some(outcome) =
            sync_install_job(ctx, &mut desired, existing_job.as_ref(), inputs).await?
        {
            return Ok(outcome);
        }
    }

    converge_status(ctx, &mut desired, &observed, existing_job.as_ref()).await?;

    if first_installed_observe {
        report_first_install(ctx, &desired, existing_job.as_ref());
    }

    if let Some(delay) = requeue_after {
        debug!("Cluster will re-sync due to expiry time in: {:?}", delay);
        return Ok(ReconcileOutcome::RequeueAfter(delay));
    }
    Ok(ReconcileOutcome::Done)
}

/// Drop error backoff entries of deployments that no longer exist.
///
/// The controller never reconciles an object once it leaves the cache, so entries of
/// deployments deleted while failing are only released here.
///
/// # Errors
///
/// Returns an error if listing deployments fails.
pub async fn prune_error_backoff<S: ObjectStore>(
    ctx: &Context<S>,
) -> Result<usize, ReconcileError> {
    let live: std::collections::HashSet<String> = ctx
        .store
        .list::<ClusterDeployment>(None, &BTreeMap::new())
        .await?
        .iter()
        .map(|cd| ObjectKey::of(cd).to_string())
        .collect();
    let pruned = ctx.backoff.retain(|key| live.contains(key));
    if pruned > 0 {
        debug!(pruned, "Pruned error backoff of deleted ClusterDeployments");
    }
    Ok(pruned)
}

/// Emit the observations of a completed install job, once per deployment.
fn report_first_install<S: ObjectStore>(
    ctx: &Context<S>,
    cd: &ClusterDeployment,
    job: Option<&Job>,
) {
    let cluster_type = cluster_type(cd);
    let job_status = job.and_then(|job| job.status.as_ref());
    if let Some((started, completed)) = job_status.and_then(|status| {
        status
            .start_time
            .as_ref()
            .zip(status.completion_time.as_ref())
    }) {
        let duration = (completed.0 - started.0).to_std().unwrap_or_default();
        debug!(duration_secs = duration.as_secs_f64(), "Install job completed");
        ctx.metrics.install_job_duration(duration);
    }

    let restarts = cd
        .status
        .as_ref()
        .map(|status| status.install_restarts)
        .unwrap_or_default();
    ctx.metrics.install_restarts(&cluster_type, restarts);
    ctx.metrics.provision_underway(
        &cd.name_any(),
        &cd.namespace().unwrap_or_default(),
        &cluster_type,
        0.0,
    );
    ctx.metrics.cluster_installed(&cluster_type);
}

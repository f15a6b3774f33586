// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deletion workflow for `ClusterDeployment` resources.
//!
//! A deleted deployment keeps the deprovision finalizer until its cloud resources are
//! gone. Each pass advances one step:
//!
//! 1. the managed DNS zone is deleted
//! 2. the install job is deleted
//! 3. a `ClusterDeprovisionRequest` is created and polled until it completes
//!
//! Deployments that never recorded an infrastructure identifier, and installed
//! deployments with `preserveOnDelete`, skip the deprovision request.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::install_resources::{build_deprovision_request, dns_zone_name, install_job_name};
use crate::reconcilers::finalizers::{has_finalizer, is_terminating, remove_finalizer};

/// Where a deployment stands with respect to deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionDecision {
    /// Not deleted
    Active,
    /// Deleted and already released; only metrics need clearing
    ClearMetrics,
    /// Deleted with the deprovision finalizer still present
    Deprovision,
}

/// What to do with the managed zone of a deleted deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneTeardown {
    /// No managed zone left; continue the teardown
    Proceed,
    /// The zone is being deleted; wait for it
    Wait,
    /// The zone was not deleted with its owner; delete it now
    ForceDelete,
}

/// Decide how a deployment is handled with respect to deletion.
#[must_use]
pub fn decide_deletion(cd: &ClusterDeployment) -> DeletionDecision {
    if !is_terminating(cd) {
        DeletionDecision::Active
    } else if has_finalizer(cd, FINALIZER_DEPROVISION) {
        DeletionDecision::Deprovision
    } else {
        DeletionDecision::ClearMetrics
    }
}

/// Decide what to do with the managed zone of a deleted deployment.
#[must_use]
pub fn decide_zone_teardown(manage_dns: bool, zone: Option<&DNSZone>) -> ZoneTeardown {
    match zone {
        _ if !manage_dns => ZoneTeardown::Proceed,
        None => ZoneTeardown::Proceed,
        Some(zone) if is_terminating(zone) => ZoneTeardown::Wait,
        Some(_) => ZoneTeardown::ForceDelete,
    }
}

/// Reset the underway gauges of `cd`.
///
/// The provision gauge is only touched while the deployment is not installed.
pub fn clear_underway_metrics<S: ObjectStore>(ctx: &Context<S>, cd: &ClusterDeployment) {
    let name = cd.name_any();
    let namespace = cd.namespace().unwrap_or_default();
    let cluster_type = cluster_type(cd);
    ctx.metrics
        .deprovision_underway(&name, &namespace, &cluster_type, 0.0);
    if !is_installed(cd) {
        ctx.metrics
            .provision_underway(&name, &namespace, &cluster_type, 0.0);
    }
}

/// Remove the deprovision finalizer of `cd`, releasing it to the garbage collector.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn remove_deprovision_finalizer<S: ObjectStore>(
    ctx: &Context<S>,
    cd: &ClusterDeployment,
) -> Result<ReconcileOutcome, ReconcileError> {
    let removed = remove_finalizer(&ctx.store, cd, FINALIZER_DEPROVISION)
        .await
        .inspect_err(|e| error!(error = %e, "Error removing finalizer"))?;
    if removed.is_some() {
        clear_underway_metrics(ctx, cd);
        ctx.metrics.cluster_deleted(&cluster_type(cd));
    }
    Ok(ReconcileOutcome::Done)
}

/// Advance the teardown of a deleted deployment by one step.
///
/// # Errors
///
/// Returns an error if a store operation fails.
pub async fn sync_deleted<S: ObjectStore>(
    ctx: &Context<S>,
    cd: &ClusterDeployment,
) -> Result<ReconcileOutcome, ReconcileError> {
    let namespace = cd.namespace().unwrap_or_default();
    let name = cd.name_any();

    let zone_key = ObjectKey::namespaced(&namespace, &dns_zone_name(&name));
    let zone: Option<DNSZone> = if cd.spec.manage_dns {
        ctx.store.get(&zone_key).await?
    } else {
        None
    };
    match decide_zone_teardown(cd.spec.manage_dns, zone.as_ref()) {
        ZoneTeardown::Proceed => debug!("No managed DNSZone to clean up"),
        ZoneTeardown::Wait => {
            debug!(zone = %zone_key, "Managed DNSZone is being deleted, waiting for its deletion to complete");
            return Ok(ReconcileOutcome::RequeueAfter(ctx.config.terminating_requeue));
        }
        ZoneTeardown::ForceDelete => {
            warn!(
                zone = %zone_key,
                "Managed DNSZone was not deleted with its ClusterDeployment, deleting manually"
            );
            ctx.store
                .delete::<DNSZone>(&zone_key, Propagation::Foreground)
                .await?;
            return Ok(ReconcileOutcome::RequeueAfter(ctx.config.terminating_requeue));
        }
    }

    let job_key = ObjectKey::namespaced(&namespace, &install_job_name(&name));
    match ctx.store.get::<Job>(&job_key).await? {
        None => debug!("Install job no longer exists, nothing to clean up"),
        Some(job) if is_terminating(&job) => {
            debug!(job = %job_key, "Install job is being deleted, requeueing to wait for deletion");
            return Ok(ReconcileOutcome::RequeueAfter(ctx.config.terminating_requeue));
        }
        Some(_) => {
            ctx.store
                .delete::<Job>(&job_key, Propagation::Foreground)
                .await?;
            info!(job = %job_key, "Install job deleted");
            return Ok(ReconcileOutcome::Done);
        }
    }

    if cd.spec.preserve_on_delete {
        if is_installed(cd) {
            warn!("Skipping creation of deprovision request for installed cluster due to preserveOnDelete");
            return remove_deprovision_finalizer(ctx, cd).await;
        }
        info!("preserveOnDelete is set but creating deprovision request as cluster was never successfully provisioned");
    }

    let infra_id = cd
        .status
        .as_ref()
        .and_then(|status| status.infra_id.as_deref())
        .unwrap_or_default();
    if infra_id.is_empty() {
        warn!("Skipping uninstall for cluster that never had infraID set");
        return remove_deprovision_finalizer(ctx, cd).await;
    }

    let request_key = ObjectKey::namespaced(&namespace, &name);
    let Some(existing) = ctx
        .store
        .get::<ClusterDeprovisionRequest>(&request_key)
        .await?
    else {
        info!(request = %request_key, "Creating deprovision request for ClusterDeployment");
        return create_deprovision_request(ctx, cd).await;
    };

    if existing.status.as_ref().is_some_and(|status| status.completed) {
        info!(request = %request_key, "Deprovision request completed, removing finalizer");
        return remove_deprovision_finalizer(ctx, cd).await;
    }
    debug!(request = %request_key, "Deprovision request not yet completed");
    Ok(ReconcileOutcome::Done)
}

async fn create_deprovision_request<S: ObjectStore>(
    ctx: &Context<S>,
    cd: &ClusterDeployment,
) -> Result<ReconcileOutcome, ReconcileError> {
    let Err(create_err) = ctx.store.create(&build_deprovision_request(cd)).await else {
        return Ok(ReconcileOutcome::Done);
    };
    error!(error = %create_err, "Error creating deprovision request");

    // A namespace being torn down rejects creates; give up on deprovisioning
    let namespace = cd.namespace().unwrap_or_default();
    let ns: Option<Namespace> = match ctx.store.get(&ObjectKey::cluster(&namespace)).await {
        Ok(ns) => ns,
        Err(e) => {
            error!(error = %e, "Error checking for deletionTimestamp on namespace");
            return Err(create_err.into());
        }
    };
    if ns.as_ref().is_some_and(is_terminating) {
        warn!(
            namespace = %namespace,
            "Namespace deleted before deprovision request could be created, giving up on deprovision and removing finalizer"
        );
        return remove_deprovision_finalizer(ctx, cd).await;
    }
    Err(create_err.into())
}

#[cfg(test)]
#[path = "deletion_tests.rs"]
mod deletion_tests;

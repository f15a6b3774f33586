// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Image resolution for `ClusterDeployment` resources.
//!
//! Three images drive an installation:
//!
//! - the operator image runs the install manager: spec, then image set, then the
//!   operator default
//! - the release image is the payload to install: spec, then image set, else empty
//! - the installer image provides the installer binary: spec, then image set, else a
//!   one-shot imageset job resolves it from the release image
//!
//! Empty strings never win. Once the installer image is recorded in status it is
//! never resolved again.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use super::install::ensure_installer_rbac;
use super::status_helpers::{job_finished, job_succeeded};
use crate::config::ImageDefaults;
use crate::constants::INSTALLER_SERVICE_ACCOUNT;
use crate::install_resources::{imageset_job_name, set_controller_reference, ImageSetJobParams};
use crate::reconcilers::finalizers::is_terminating;
use crate::reconcilers::status::{clear_condition, set_condition, UpdateConditionPolicy};
use crate::status_reasons::{
    CONDITION_STATUS_TRUE, CONDITION_TYPE_CLUSTER_IMAGE_SET_NOT_FOUND,
    REASON_CLUSTER_IMAGE_SET_FOUND, REASON_CLUSTER_IMAGE_SET_NOT_FOUND,
};

/// Where the installer image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerImageSource {
    /// `spec.images.installerImage`
    FromSpec(String),
    /// `installerImage` of the referenced image set
    FromImageSet(String),
    /// Nothing names it; an imageset job must resolve it
    ResolveWithJob,
}

/// What to do with the imageset job of a deployment whose installer image is unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSetJobAction {
    /// The job is being deleted; wait for it to go away
    RequeueTerminating,
    /// The job finished without the image being recorded; delete it so it can run again
    DeleteFinished { succeeded: bool },
    /// No job yet
    Create,
    /// The job is still running
    Wait,
}

/// Result of looking up the referenced image set.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSetStep {
    /// Carry on with the image set, if any
    Continue(Option<ClusterImageSet>),
    /// The `ClusterImageSetNotFound` condition changed and was persisted
    StatusUpdated,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Operator image: spec, then image set, then the configured default.
#[must_use]
pub fn resolve_operator_image(
    spec: &ClusterDeploymentSpec,
    image_set: Option<&ClusterImageSet>,
    defaults: &dyn ImageDefaults,
) -> String {
    non_empty(spec.images.operator_image.as_ref())
        .or_else(|| image_set.and_then(|set| non_empty(set.spec.operator_image.as_ref())))
        .map_or_else(|| defaults.default_operator_image(), str::to_string)
}

/// Release image: spec, then image set, else empty.
#[must_use]
pub fn resolve_release_image(
    spec: &ClusterDeploymentSpec,
    image_set: Option<&ClusterImageSet>,
) -> String {
    non_empty(spec.images.release_image.as_ref())
        .or_else(|| image_set.and_then(|set| non_empty(set.spec.release_image.as_ref())))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Installer image: spec, then image set, else a resolution job.
#[must_use]
pub fn decide_installer_image(
    spec: &ClusterDeploymentSpec,
    image_set: Option<&ClusterImageSet>,
) -> InstallerImageSource {
    if let Some(image) = non_empty(spec.images.installer_image.as_ref()) {
        return InstallerImageSource::FromSpec(image.to_string());
    }
    if let Some(image) = image_set.and_then(|set| non_empty(set.spec.installer_image.as_ref())) {
        return InstallerImageSource::FromImageSet(image.to_string());
    }
    InstallerImageSource::ResolveWithJob
}

/// Decide what to do with the observed imageset job.
#[must_use]
pub fn decide_imageset_job(existing: Option<&Job>) -> ImageSetJobAction {
    match existing {
        None => ImageSetJobAction::Create,
        Some(job) if is_terminating(job) => ImageSetJobAction::RequeueTerminating,
        Some(job) if job_finished(job) => ImageSetJobAction::DeleteFinished {
            succeeded: job_succeeded(job),
        },
        Some(_) => ImageSetJobAction::Wait,
    }
}

/// Look up the image set referenced by `desired` and keep its not-found condition current.
///
/// # Errors
///
/// Returns an error if the image set cannot be read or the status cannot be written.
pub async fn resolve_image_set<S: ObjectStore>(
    ctx: &Context<S>,
    desired: &mut ClusterDeployment,
) -> Result<ImageSetStep, ReconcileError> {
    let Some(name) = desired
        .spec
        .image_set
        .as_ref()
        .map(|set| set.name.clone())
        .filter(|name| !name.is_empty())
    else {
        return Ok(ImageSetStep::Continue(None));
    };

    let image_set: Option<ClusterImageSet> = ctx.store.get(&ObjectKey::cluster(&name)).await?;
    let conditions = &mut desired.status.get_or_insert_with(Default::default).conditions;

    let changed = match &image_set {
        None => {
            warn!(
                clusterimageset = %name,
                "ClusterDeployment references non-existent ClusterImageSet"
            );
            set_condition(
                conditions,
                CONDITION_TYPE_CLUSTER_IMAGE_SET_NOT_FOUND,
                CONDITION_STATUS_TRUE,
                REASON_CLUSTER_IMAGE_SET_NOT_FOUND,
                &format!("ClusterImageSet {name} is not available"),
                UpdateConditionPolicy::Never,
            )
        }
        Some(_) => clear_condition(
            conditions,
            CONDITION_TYPE_CLUSTER_IMAGE_SET_NOT_FOUND,
            REASON_CLUSTER_IMAGE_SET_FOUND,
            &format!("ClusterImageSet {name} is available"),
        ),
    };

    if changed {
        info!(
            clusterimageset = %name,
            found = image_set.is_some(),
            "Updating ClusterImageSetNotFound condition"
        );
        ctx.store.update_status(&*desired).await?;
        return Ok(ImageSetStep::StatusUpdated);
    }
    Ok(ImageSetStep::Continue(image_set))
}

/// Record the installer image of `desired`, running an imageset job when nothing names it.
///
/// # Errors
///
/// Returns an error if a store operation fails.
pub async fn resolve_installer_image<S: ObjectStore>(
    ctx: &Context<S>,
    desired: &mut ClusterDeployment,
    image_set: Option<&ClusterImageSet>,
    release_image: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();

    let image = match decide_installer_image(&desired.spec, image_set) {
        InstallerImageSource::FromSpec(image) => {
            debug!(image = %image, "Setting status.installerImage from spec.images.installerImage");
            image
        }
        InstallerImageSource::FromImageSet(image) => {
            debug!(image = %image, "Setting status.installerImage from the ClusterImageSet");
            image
        }
        InstallerImageSource::ResolveWithJob => {
            return run_imageset_job(ctx, desired, release_image).await;
        }
    };

    info!("Resolved installer image {} for {}/{}", image, namespace, name);
    desired
        .status
        .get_or_insert_with(Default::default)
        .installer_image = Some(image);
    ctx.store.update_status(&*desired).await?;
    Ok(ReconcileOutcome::Done)
}

async fn run_imageset_job<S: ObjectStore>(
    ctx: &Context<S>,
    cd: &ClusterDeployment,
    release_image: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    let namespace = cd.namespace().unwrap_or_default();
    let job_name = imageset_job_name(&cd.name_any());
    let job_key = ObjectKey::namespaced(&namespace, &job_name);

    let existing: Option<Job> = ctx.store.get(&job_key).await?;
    match decide_imageset_job(existing.as_ref()) {
        ImageSetJobAction::RequeueTerminating => {
            debug!(job = %job_key, "Imageset job is being deleted, will recreate once deleted");
            Ok(ReconcileOutcome::RequeueAfter(ctx.config.terminating_requeue))
        }
        ImageSetJobAction::DeleteFinished { succeeded } => {
            warn!(
                job = %job_key,
                successful = succeeded,
                "Finished imageset job found but installer image is not yet resolved, deleting"
            );
            ctx.store
                .delete::<Job>(&job_key, Propagation::Foreground)
                .await?;
            Ok(ReconcileOutcome::Done)
        }
        ImageSetJobAction::Create => {
            let cli_image = ctx.images().default_cli_image();
            let mut job = ctx.builder.build_imageset_job(&ImageSetJobParams {
                cluster_deployment: cd,
                cli_image: &cli_image,
                release_image,
                service_account: INSTALLER_SERVICE_ACCOUNT,
            });
            set_controller_reference(&mut job.metadata, cd);

            info!(job = %job_key, release_image = %release_image, "Creating imageset job");
            ensure_installer_rbac(ctx, &namespace).await?;
            ctx.store.create(&job).await?;

            let elapsed = seconds_since(cd.metadata.creation_timestamp.as_ref(), Utc::now());
            info!(elapsed = elapsed, "Calculated time to imageset job seconds");
            ctx.metrics.imageset_delay(elapsed);
            Ok(ReconcileOutcome::Done)
        }
        ImageSetJobAction::Wait => {
            debug!(job = %job_key, "Imageset job exists and is in progress");
            Ok(ReconcileOutcome::Done)
        }
    }
}

#[cfg(test)]
#[path = "images_tests.rs"]
mod images_tests;

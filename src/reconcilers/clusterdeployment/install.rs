// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Install job management for `ClusterDeployment` resources.
//!
//! Every pass regenerates the install job and its install-config `ConfigMap` from the
//! current spec. The generated job carries a hash of its spec; an existing job is
//! replaced when its hash differs or when it was generated for an older generation of
//! the deployment. Replacement takes two passes: this pass deletes, a later pass
//! creates.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::constants::{INSTALLER_SERVICE_ACCOUNT, PULL_SECRET_KEY};
use crate::install_resources::{
    build_installer_role, build_installer_role_binding, build_installer_service_account,
    calculate_job_spec_hash, install_pod_labels, set_controller_reference, InstallParams,
};
use crate::store::StoreObject;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};

/// What to do with an install job that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingJobAction {
    /// The job was generated for an older generation of the deployment
    DeleteOutdatedGeneration,
    /// The job spec no longer matches the generated one, or carries no hash
    DeleteOnHashChange,
    /// The job is current
    Keep,
}

/// Images and key material an install job is generated from.
#[derive(Debug, Clone, Copy)]
pub struct InstallInputs<'a> {
    pub installer_image: &'a str,
    pub operator_image: &'a str,
    pub release_image: &'a str,
    pub ssh_key: &'a str,
}

fn generation_annotation(annotations: &BTreeMap<String, String>) -> Option<i64> {
    annotations
        .get(CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION)
        .map(|value| value.parse().unwrap_or(0))
}

/// Decide whether `existing` must be deleted so a fresh install job can be created.
///
/// The generation check only applies to jobs carrying a generation annotation. A job
/// without a hash annotation predates hashing and is always replaced.
#[must_use]
pub fn decide_existing_install_job(
    existing: &Job,
    generated_hash: &str,
    cd_generation: i64,
) -> ExistingJobAction {
    let annotations = existing.annotations();
    if generation_annotation(annotations).is_some_and(|generation| generation < cd_generation) {
        return ExistingJobAction::DeleteOutdatedGeneration;
    }
    match annotations.get(JOB_HASH_ANNOTATION) {
        Some(hash) if hash == generated_hash => ExistingJobAction::Keep,
        _ => ExistingJobAction::DeleteOnHashChange,
    }
}

/// Whether an existing install-config `ConfigMap` was generated for an older generation.
#[must_use]
pub fn config_map_outdated(existing: &ConfigMap, cd_generation: i64) -> bool {
    generation_annotation(existing.annotations()).is_some_and(|generation| generation < cd_generation)
}

/// Total container restarts across `pods`.
#[must_use]
pub fn sum_container_restarts(pods: &[Pod]) -> i32 {
    pods.iter()
        .filter_map(|pod| pod.status.as_ref())
        .filter_map(|status| status.container_statuses.as_ref())
        .flatten()
        .map(|container| container.restart_count)
        .sum()
}

async fn create_if_absent<S: ObjectStore, K: StoreObject>(
    store: &S,
    obj: &K,
) -> Result<(), StoreError> {
    let key = ObjectKey::of(obj);
    if store.get::<K>(&key).await?.is_some() {
        return Ok(());
    }
    info!("Creating {} {}", K::kind(&()), key);
    match store.create(obj).await {
        Err(e) if e.is_already_exists() => Ok(()),
        other => other.map(|_| ()),
    }
}

/// Make sure the installer service account, role and role binding exist in `namespace`.
///
/// # Errors
///
/// Returns an error if any of the objects cannot be read or created.
pub async fn ensure_installer_rbac<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
) -> Result<(), StoreError> {
    create_if_absent::<S, ServiceAccount>(&ctx.store, &build_installer_service_account(namespace))
        .await?;
    create_if_absent::<S, Role>(&ctx.store, &build_installer_role(namespace)).await?;
    create_if_absent::<S, RoleBinding>(&ctx.store, &build_installer_role_binding(namespace)).await
}

/// Load `key` of secret `name` in `namespace` as a string.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] for a missing secret and [`ReconcileError::Config`]
/// for a missing or non UTF-8 key.
pub async fn load_secret_data<S: ObjectStore>(
    store: &S,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, ReconcileError> {
    let secret_key = ObjectKey::namespaced(namespace, name);
    let secret: Secret = store
        .get(&secret_key)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            kind: "Secret".to_string(),
            key: secret_key.to_string(),
        })?;
    let data = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| ReconcileError::Config(format!("secret {secret_key} has no key {key}")))?;
    String::from_utf8(data.0.clone())
        .map_err(|_| ReconcileError::Config(format!("secret {secret_key} key {key} is not UTF-8")))
}

async fn count_install_restarts<S: ObjectStore>(
    ctx: &Context<S>,
    cd: &ClusterDeployment,
) -> Result<i32, StoreError> {
    let pods: Vec<Pod> = ctx
        .store
        .list(cd.namespace().as_deref(), &install_pod_labels(&cd.name_any()))
        .await?;
    Ok(sum_container_restarts(&pods))
}

/// Drive the install job of a deployment that is not installed yet.
///
/// Returns `Some` when this pass must stop after deleting or rewriting an artifact, and
/// `None` when status convergence should run.
///
/// # Errors
///
/// Returns an error if the pull secret cannot be loaded, the artifacts cannot be built,
/// or a store operation fails.
pub async fn sync_install_job<S: ObjectStore>(
    ctx: &Context<S>,
    desired: &mut ClusterDeployment,
    existing_job: Option<&Job>,
    inputs: InstallInputs<'_>,
) -> Result<Option<ReconcileOutcome>, ReconcileError> {
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();
    let generation = desired.metadata.generation.unwrap_or_default();

    ctx.metrics.provision_underway(
        &name,
        &namespace,
        &cluster_type(desired),
        seconds_since(desired.metadata.creation_timestamp.as_ref(), Utc::now()),
    );

    debug!("Loading pull secret");
    let pull_secret = load_secret_data(
        &ctx.store,
        &namespace,
        &desired.spec.pull_secret.name,
        PULL_SECRET_KEY,
    )
    .await?;

    let (mut job, mut config_map) = ctx.builder.build_install(&InstallParams {
        cluster_deployment: desired,
        installer_image: inputs.installer_image,
        operator_image: inputs.operator_image,
        release_image: inputs.release_image,
        service_account: INSTALLER_SERVICE_ACCOUNT,
        ssh_key: inputs.ssh_key,
        pull_secret: &pull_secret,
    })?;
    let job_hash = calculate_job_spec_hash(&job)?;
    job.annotations_mut()
        .insert(JOB_HASH_ANNOTATION.to_string(), job_hash.clone());
    set_controller_reference(&mut job.metadata, desired);
    set_controller_reference(&mut config_map.metadata, desired);

    let job_key = ObjectKey::of(&job);
    let config_map_key = ObjectKey::of(&config_map);

    debug!(config_map = %config_map_key, "Checking if install-config ConfigMap exists");
    let existing_config_map: Option<ConfigMap> = ctx.store.get(&config_map_key).await?;
    if existing_config_map.is_none() {
        info!(config_map = %config_map_key, "Creating install-config ConfigMap");
        ctx.store.create(&config_map).await?;
    }

    let Some(existing_job) = existing_job else {
        info!(job = %job_key, "Creating install job");
        ensure_installer_rbac(ctx, &namespace).await?;
        ctx.store.create(&job).await?;

        let elapsed = seconds_since(desired.metadata.creation_timestamp.as_ref(), Utc::now());
        info!(job = %job_key, elapsed = elapsed, "Calculated time to install job seconds");
        ctx.metrics.install_delay(elapsed);
        return Ok(None);
    };

    debug!(job = %job_key, "Install job exists");
    match count_install_restarts(ctx, desired).await {
        Ok(restarts) => {
            if restarts > 0 {
                warn!(job = %job_key, restarts = restarts, "Install pod has restarted");
            }
            desired
                .status
                .get_or_insert_with(Default::default)
                .install_restarts = restarts;
        }
        Err(e) => {
            warn!(
                job = %job_key,
                error = %e,
                "Error listing pods, unable to calculate pod restarts but continuing"
            );
        }
    }

    let action = decide_existing_install_job(existing_job, &job_hash, generation);
    let mut generation_changed = false;
    if action == ExistingJobAction::DeleteOutdatedGeneration {
        info!(job = %job_key, "Deleting outdated install job due to ClusterDeployment generation change");
        ctx.store
            .delete::<Job>(&job_key, Propagation::Foreground)
            .await?;
        generation_changed = true;
    }
    if let Some(mut outdated) =
        existing_config_map.filter(|existing| config_map_outdated(existing, generation))
    {
        info!(config_map = %config_map_key, "Updating outdated install-config ConfigMap due to ClusterDeployment generation change");
        outdated.data = config_map.data.take();
        outdated.metadata.annotations = config_map.metadata.annotations.take();
        ctx.store.update(&outdated).await?;
        generation_changed = true;
    }
    if generation_changed {
        return Ok(Some(ReconcileOutcome::Done));
    }

    if action == ExistingJobAction::DeleteOnHashChange {
        info!(job = %job_key, "Install job spec has changed, deleting existing job");
        ctx.store
            .delete::<Job>(&job_key, Propagation::Foreground)
            .await?;
        return Ok(Some(ReconcileOutcome::Done));
    }
    Ok(None)
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod install_tests;

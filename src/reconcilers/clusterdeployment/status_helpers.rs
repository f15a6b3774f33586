// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status convergence for `ClusterDeployment` resources.
//!
//! The installed flag follows the install job. Once installed, the admin kubeconfig
//! secret is normalized and used to discover the API and web console URLs of the new
//! cluster. Status is written only when it differs from what was read at the start of
//! the pass.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::constants::{
    ADMIN_KUBECONFIG_KEY, ADMIN_KUBECONFIG_SUFFIX, CONSOLE_ROUTE_NAME, CONSOLE_ROUTE_NAMESPACE,
    RAW_ADMIN_KUBECONFIG_KEY,
};
use crate::remote::{api_url_from_kubeconfig, fixup_kubeconfig};
use crate::status_reasons::CONDITION_STATUS_TRUE;

const JOB_CONDITION_COMPLETE: &str = "Complete";
const JOB_CONDITION_FAILED: &str = "Failed";

fn has_job_condition(job: &Job, condition_type: &str) -> bool {
    job.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == condition_type && c.status == CONDITION_STATUS_TRUE)
        })
}

/// Whether `job` has succeeded: a succeeded pod or a `Complete=True` condition.
#[must_use]
pub fn job_succeeded(job: &Job) -> bool {
    job.status
        .as_ref()
        .and_then(|status| status.succeeded)
        .is_some_and(|succeeded| succeeded > 0)
        || has_job_condition(job, JOB_CONDITION_COMPLETE)
}

/// Whether `job` has finished, successfully or not.
#[must_use]
pub fn job_finished(job: &Job) -> bool {
    has_job_condition(job, JOB_CONDITION_COMPLETE) || has_job_condition(job, JOB_CONDITION_FAILED)
}

/// Name of the admin kubeconfig secret of `cd_name`.
#[must_use]
pub fn admin_kubeconfig_secret_name(cd_name: &str) -> String {
    format!("{cd_name}-{ADMIN_KUBECONFIG_SUFFIX}")
}

/// Normalize the data of an admin kubeconfig secret.
///
/// The original kubeconfig is preserved under `raw-kubeconfig` before the first fixup,
/// and `kubeconfig` always holds the fixed-up raw copy.
///
/// Returns the new data, or `None` when nothing changed.
///
/// # Errors
///
/// Returns [`ReconcileError::Kubeconfig`] if the secret holds no kubeconfig or it
/// cannot be fixed up.
pub fn fixup_admin_kubeconfig_data(
    data: &BTreeMap<String, ByteString>,
) -> Result<Option<BTreeMap<String, ByteString>>, ReconcileError> {
    let mut fixed = data.clone();
    let raw = match data.get(RAW_ADMIN_KUBECONFIG_KEY) {
        Some(raw) => raw.clone(),
        None => {
            let raw = data.get(ADMIN_KUBECONFIG_KEY).cloned().ok_or_else(|| {
                ReconcileError::Kubeconfig("admin kubeconfig secret has no kubeconfig".to_string())
            })?;
            fixed.insert(RAW_ADMIN_KUBECONFIG_KEY.to_string(), raw.clone());
            raw
        }
    };
    fixed.insert(
        ADMIN_KUBECONFIG_KEY.to_string(),
        ByteString(fixup_kubeconfig(&raw.0)?),
    );
    Ok((fixed != *data).then_some(fixed))
}

async fn sync_admin_kubeconfig<S: ObjectStore>(
    ctx: &Context<S>,
    desired: &mut ClusterDeployment,
    secret_name: &str,
) -> Result<(), ReconcileError> {
    let namespace = desired.namespace().unwrap_or_default();
    let secret_key = ObjectKey::namespaced(&namespace, secret_name);
    let Some(mut secret) = ctx.store.get::<Secret>(&secret_key).await? else {
        warn!(secret = %secret_key, "Admin kubeconfig does not yet exist");
        return Ok(());
    };

    let data = secret.data.clone().unwrap_or_default();
    let data = match fixup_admin_kubeconfig_data(&data)? {
        Some(fixed) => {
            info!(secret = %secret_key, "Updating admin kubeconfig secret");
            secret.data = Some(fixed.clone());
            ctx.store.update(&secret).await?;
            fixed
        }
        None => {
            debug!(secret = %secret_key, "Secret data has not changed, no need to update");
            data
        }
    };

    let status = desired.status.get_or_insert_with(Default::default);
    if status.api_url.is_some() && status.web_console_url.is_some() {
        return Ok(());
    }

    let kubeconfig = data
        .get(ADMIN_KUBECONFIG_KEY)
        .map(|bytes| bytes.0.as_slice())
        .unwrap_or_default();
    let remote = ctx.remote.build(kubeconfig).await.inspect_err(|e| {
        error!(error = %e, "Error building remote cluster client");
    })?;

    let api_url = api_url_from_kubeconfig(kubeconfig, &desired.spec.cluster_name)?;
    debug!(api_url = %api_url, "Found cluster API URL in kubeconfig");

    let host = remote
        .route_host(CONSOLE_ROUTE_NAMESPACE, CONSOLE_ROUTE_NAME)
        .await
        .inspect_err(|e| {
            error!(error = %e, "Error fetching remote console route");
        })?;

    let status = desired.status.get_or_insert_with(Default::default);
    status.api_url = Some(api_url);
    status.web_console_url = Some(format!("https://{host}"));
    Ok(())
}

/// Converge `desired.status` and persist it if it differs from `observed.status`.
///
/// # Errors
///
/// Returns an error if the admin kubeconfig cannot be fixed up, the remote cluster
/// cannot be queried, or the status cannot be written.
pub async fn converge_status<S: ObjectStore>(
    ctx: &Context<S>,
    desired: &mut ClusterDeployment,
    observed: &ClusterDeployment,
    job: Option<&Job>,
) -> Result<(), ReconcileError> {
    debug!("Updating ClusterDeployment status");
    let cd_name = desired.name_any();
    let status = desired.status.get_or_insert_with(Default::default);

    // installed never reverts
    if let Some(job) = job.filter(|_| !status.installed) {
        status.installed = job_succeeded(job);
    }

    let secret_unset = status
        .admin_kubeconfig_secret
        .as_ref()
        .is_none_or(|secret| secret.name.is_empty());
    if status.installed && secret_unset {
        status.admin_kubeconfig_secret = Some(SecretReference {
            name: admin_kubeconfig_secret_name(&cd_name),
        });
    }

    let secret_name = status
        .admin_kubeconfig_secret
        .as_ref()
        .map(|secret| secret.name.clone())
        .filter(|name| !name.is_empty());
    if let Some(secret_name) = secret_name {
        sync_admin_kubeconfig(ctx, desired, &secret_name).await?;
    }

    let desired_status = desired.status.clone().unwrap_or_default();
    if desired_status == observed.status.clone().unwrap_or_default() {
        debug!("ClusterDeployment status unchanged");
        return Ok(());
    }

    info!(
        "Status has changed, updating ClusterDeployment {}/{}",
        desired.namespace().unwrap_or_default(),
        cd_name
    );
    ctx.store.update_status(&*desired).await?;
    Ok(())
}

#[cfg(test)]
#[path = "status_helpers_tests.rs"]
mod status_helpers_tests;

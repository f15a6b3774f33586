// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Managed DNS zone gate for `ClusterDeployment` resources.
//!
//! With `manageDNS` set, installation waits for a `DNSZone` owned by the deployment to
//! report `Available=True`. The gate never requeues: the zone's own status change
//! triggers the next reconciliation.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::install_resources::{build_dns_zone, dns_zone_name};
use crate::reconcilers::status::is_condition_true;
use crate::status_reasons::CONDITION_TYPE_DNS_ZONE_AVAILABLE;

/// State of the managed zone as seen by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneGate {
    /// No zone yet; create it
    Create,
    /// The zone exists but is not available
    Waiting,
    /// The zone is available; installation may proceed
    Available,
}

/// Decide the gate state from the observed zone.
#[must_use]
pub fn decide_managed_zone(observed: Option<&DNSZone>) -> ZoneGate {
    match observed {
        None => ZoneGate::Create,
        Some(zone) => {
            let available = zone.status.as_ref().is_some_and(|status| {
                is_condition_true(&status.conditions, CONDITION_TYPE_DNS_ZONE_AVAILABLE)
            });
            if available {
                ZoneGate::Available
            } else {
                ZoneGate::Waiting
            }
        }
    }
}

/// Make sure the managed zone of `cd` exists and report whether it is available.
///
/// # Errors
///
/// Returns [`ReconcileError::Config`] unless both the AWS platform and the AWS platform
/// secrets are set, and a store error if the zone cannot be read or created.
pub async fn ensure_managed_dns_zone<S: ObjectStore>(
    ctx: &Context<S>,
    cd: &ClusterDeployment,
) -> Result<bool, ReconcileError> {
    let (Some(aws), Some(secrets)) = (
        cd.spec.platform.aws.as_ref(),
        cd.spec.platform_secrets.aws.as_ref(),
    ) else {
        error!("ClusterDeployment platform is not AWS, cannot manage DNS zone");
        return Err(ReconcileError::Config(
            "only AWS managed DNS is supported".to_string(),
        ));
    };

    let zone_key = ObjectKey::namespaced(
        &cd.namespace().unwrap_or_default(),
        &dns_zone_name(&cd.name_any()),
    );
    let observed: Option<DNSZone> = ctx.store.get(&zone_key).await?;

    match decide_managed_zone(observed.as_ref()) {
        ZoneGate::Create => {
            info!(zone = %zone_key, "Creating new DNSZone for ClusterDeployment");
            ctx.store.create(&build_dns_zone(cd, aws, secrets)).await?;
            info!(zone = %zone_key, "DNSZone created");
            Ok(false)
        }
        ZoneGate::Waiting => {
            debug!(zone = %zone_key, "DNSZone is not yet available");
            Ok(false)
        }
        ZoneGate::Available => Ok(true),
    }
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod dns_tests;

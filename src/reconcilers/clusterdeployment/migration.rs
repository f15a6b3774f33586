// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Migration of legacy wildcard ingress domains.
//!
//! Older deployments were allowed to declare ingress domains such as
//! `*.apps.bar.example.com`. The wildcard is now implied, so the prefix is stripped
//! before any other work happens.

#[allow(clippy::wildcard_imports)]
use super::types::*;

const WILDCARD_PREFIX: &str = "*.";

/// Strip a leading `*.` from every ingress domain of `spec`.
///
/// Returns `true` if any entry changed.
pub fn migrate_wildcard_ingress(spec: &mut ClusterDeploymentSpec) -> bool {
    let mut migrated = false;
    for ingress in &mut spec.ingress {
        if let Some(stripped) = ingress.domain.strip_prefix(WILDCARD_PREFIX) {
            debug!(
                ingress = %ingress.name,
                domain = %ingress.domain,
                "Stripping wildcard from ingress domain"
            );
            let stripped = stripped.to_string();
            ingress.domain = stripped;
            migrated = true;
        }
    }
    migrated
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod migration_tests;

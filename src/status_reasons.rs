// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition types and reasons for clusterward resources.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: ClusterImageSetNotFound
//!       status: "True"
//!       reason: ClusterImageSetNotFound
//!       message: "ClusterImageSet openshift-4.2 is not available"
//! ```

// ============================================================================
// Condition Status Values
// ============================================================================

/// Condition status value for a condition that holds
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status value for a condition that does not hold
pub const CONDITION_STATUS_FALSE: &str = "False";

/// Condition status value for a condition that could not be determined
pub const CONDITION_STATUS_UNKNOWN: &str = "Unknown";

// ============================================================================
// ClusterDeployment Conditions
// ============================================================================

/// Condition type set when the referenced `ClusterImageSet` cannot be found.
pub const CONDITION_TYPE_CLUSTER_IMAGE_SET_NOT_FOUND: &str = "ClusterImageSetNotFound";

/// The referenced `ClusterImageSet` does not exist.
///
/// **Usage:** reason for `ClusterImageSetNotFound=True`
pub const REASON_CLUSTER_IMAGE_SET_NOT_FOUND: &str = "ClusterImageSetNotFound";

/// The referenced `ClusterImageSet` exists again after having been missing.
///
/// **Usage:** reason for `ClusterImageSetNotFound=False`
pub const REASON_CLUSTER_IMAGE_SET_FOUND: &str = "ClusterImageSetFound";

// ============================================================================
// DNSZone Conditions
// ============================================================================

/// Condition type on a `DNSZone` reporting that the zone is provisioned and usable.
///
/// A managed zone gates install job creation until this condition is `True`.
pub const CONDITION_TYPE_DNS_ZONE_AVAILABLE: &str = "Available";

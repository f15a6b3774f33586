// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for Kubernetes resources.
//!
//! This module provides utility functions for creating and managing Kubernetes
//! status conditions following the standard conventions.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (e.g., "Available")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastProbeTime`: RFC3339 timestamp of the last refresh
//! - `lastTransitionTime`: RFC3339 timestamp when the status changed
//!
//! # Example
//!
//! ```rust,no_run
//! use clusterward::reconcilers::status::{set_condition, UpdateConditionPolicy};
//!
//! let mut conditions = Vec::new();
//! let changed = set_condition(
//!     &mut conditions,
//!     "ClusterImageSetNotFound",
//!     "True",
//!     "ClusterImageSetNotFound",
//!     "ClusterImageSet openshift-v4.2 is not available",
//!     UpdateConditionPolicy::Never,
//! );
//! assert!(changed);
//! ```

use crate::crd::Condition;
use crate::status_reasons::{CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE};
use chrono::Utc;

/// When an existing condition with an unchanged status gets a new reason and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateConditionPolicy {
    /// Always refresh reason, message and probe time
    Always,
    /// Refresh only when reason or message differ
    IfReasonOrMessageChange,
    /// Leave the condition alone unless its status flips
    Never,
}

impl UpdateConditionPolicy {
    fn allows(
        self,
        old_reason: Option<&str>,
        old_message: Option<&str>,
        new_reason: &str,
        new_message: &str,
    ) -> bool {
        match self {
            Self::Always => true,
            Self::IfReasonOrMessageChange => {
                old_reason != Some(new_reason) || old_message != Some(new_message)
            }
            Self::Never => false,
        }
    }
}

/// Create a new condition stamped with the current time.
///
/// # Example
///
/// ```rust,no_run
/// # use clusterward::reconcilers::status::create_condition;
/// let condition = create_condition(
///     "Available",
///     "True",
///     "ZoneAvailable",
///     "Hosted zone is ready"
/// );
/// assert_eq!(condition.r#type, "Available");
/// assert_eq!(condition.status, "True");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    let now = Utc::now().to_rfc3339();
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_probe_time: Some(now.clone()),
        last_transition_time: Some(now),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Whether the condition `condition_type` exists with status `True`.
#[must_use]
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).is_some_and(|c| c.status == CONDITION_STATUS_TRUE)
}

/// Set a condition in a conditions list (in-memory, no API call).
///
/// - an absent condition is only added when `status` is `True`
/// - a status change always updates the condition and its transition time
/// - with an unchanged status, `policy` decides whether reason and message are refreshed
///
/// Returns `true` if `conditions` changed.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    policy: UpdateConditionPolicy,
) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) else {
        if status == CONDITION_STATUS_TRUE {
            conditions.push(create_condition(condition_type, status, reason, message));
            return true;
        }
        return false;
    };

    let status_changed = existing.status != status;
    if !status_changed
        && !policy.allows(
            existing.reason.as_deref(),
            existing.message.as_deref(),
            reason,
            message,
        )
    {
        return false;
    }

    let now = Utc::now().to_rfc3339();
    if status_changed {
        existing.last_transition_time = Some(now.clone());
    }
    existing.status = status.to_string();
    existing.reason = Some(reason.to_string());
    existing.message = Some(message.to_string());
    existing.last_probe_time = Some(now);
    true
}

/// Flip an existing `True` condition to `False`. Absent or already false conditions are
/// left alone.
///
/// Returns `true` if `conditions` changed.
pub fn clear_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    reason: &str,
    message: &str,
) -> bool {
    if !is_condition_true(conditions, condition_type) {
        return false;
    }
    set_condition(
        conditions,
        condition_type,
        CONDITION_STATUS_FALSE,
        reason,
        message,
        UpdateConditionPolicy::Never,
    )
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;

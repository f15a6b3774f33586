// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Expiry of deployments carrying a `delete-after` annotation.
//!
//! The annotation holds a duration such as `8h` or `1h30m`, counted from the creation
//! timestamp of the deployment. Durations use the unit suffixes `ns`, `us` (or `µs`),
//! `ms`, `s`, `m` and `h`, may be fractional and may be combined.

#[allow(clippy::wildcard_imports)]
use super::types::*;

/// What the `delete-after` annotation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryDecision {
    /// No annotation, or no creation timestamp to count from
    NoExpiry,
    /// The deployment outlived its lifetime and must be deleted
    Expired { expiry: DateTime<Utc> },
    /// Not expired yet; reconcile again shortly after the expiry instant
    RequeueAfter(Duration),
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// Parse a duration string such as `300ms`, `-1.5h` or `2h45m`.
///
/// # Errors
///
/// Returns a message describing why `input` is not a valid duration.
pub fn parse_duration(input: &str) -> Result<chrono::Duration, String> {
    let invalid = || format!("invalid duration {input:?}");

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    if rest == "0" {
        return Ok(chrono::Duration::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let whole_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let whole = &rest[..whole_len];
        rest = &rest[whole_len..];

        let mut fraction = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let fraction_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            fraction = &after_dot[..fraction_len];
            rest = &after_dot[fraction_len..];
        }
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map_or(rest.len(), |(i, _)| i);
        if unit_len == 0 {
            return Err(format!("missing unit in duration {input:?}"));
        }
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        let scale =
            unit_nanos(unit).ok_or_else(|| format!("unknown unit {unit:?} in duration {input:?}"))?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut value = whole.checked_mul(scale).ok_or_else(invalid)?;
        if !fraction.is_empty() {
            let digits = u32::try_from(fraction.len()).map_err(|_| invalid())?;
            let denominator = 10u128.checked_pow(digits).ok_or_else(invalid)?;
            let numerator: u128 = fraction.parse().map_err(|_| invalid())?;
            value = value
                .checked_add(numerator.checked_mul(scale).ok_or_else(invalid)? / denominator)
                .ok_or_else(invalid)?;
        }
        total = total.checked_add(value).ok_or_else(invalid)?;
    }

    let nanos = i64::try_from(total).map_err(|_| invalid())?;
    let duration = chrono::Duration::nanoseconds(nanos);
    Ok(if negative { -duration } else { duration })
}

/// Decide whether a deployment created at `created` has expired at `now`.
///
/// `grace` is added to the requeue delay so the next pass lands after the expiry instant.
///
/// # Errors
///
/// Returns [`ReconcileError::Config`] if the annotation is not a valid duration.
pub fn decide_expiry(
    created: Option<&Time>,
    delete_after: Option<&str>,
    now: DateTime<Utc>,
    grace: Duration,
) -> Result<ExpiryDecision, ReconcileError> {
    let Some(delete_after) = delete_after else {
        return Ok(ExpiryDecision::NoExpiry);
    };
    debug!("Found delete-after annotation: {}", delete_after);

    let lifetime = parse_duration(delete_after).map_err(|e| {
        ReconcileError::Config(format!(
            "error parsing {DELETE_AFTER_ANNOTATION} as a duration: {e}"
        ))
    })?;
    let Some(created) = created else {
        return Ok(ExpiryDecision::NoExpiry);
    };

    let expiry = created.0.checked_add_signed(lifetime).ok_or_else(|| {
        ReconcileError::Config(format!("{DELETE_AFTER_ANNOTATION} {delete_after} is out of range"))
    })?;
    debug!("Cluster expires at: {}", expiry);
    if now > expiry {
        return Ok(ExpiryDecision::Expired { expiry });
    }
    let remaining = (expiry - now).to_std().unwrap_or_default();
    Ok(ExpiryDecision::RequeueAfter(remaining.saturating_add(grace)))
}

#[cfg(test)]
#[path = "expiry_tests.rs"]
mod expiry_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management helpers for Kubernetes resources.
//!
//! Finalizers keep a resource around until its cleanup has finished. The helpers here
//! change the finalizer list on a copy of the resource and persist it with a replace,
//! so a concurrent writer surfaces as a conflict instead of being overwritten.

use crate::errors::StoreError;
use crate::store::{ObjectStore, StoreObject};
use kube::ResourceExt;
use tracing::info;

/// Whether `resource` carries `finalizer`.
#[must_use]
pub fn has_finalizer<T: ResourceExt>(resource: &T, finalizer: &str) -> bool {
    resource.finalizers().iter().any(|f| f == finalizer)
}

/// Whether `resource` has a deletion timestamp.
#[must_use]
pub fn is_terminating<T: ResourceExt>(resource: &T) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// Add `finalizer` to `resource` if it is not already present.
///
/// Returns the stored resource, or `None` when nothing had to be written.
///
/// # Errors
///
/// Returns a [`StoreError`] if the update fails.
pub async fn ensure_finalizer<S, T>(
    store: &S,
    resource: &T,
    finalizer: &str,
) -> Result<Option<T>, StoreError>
where
    S: ObjectStore,
    T: StoreObject,
{
    if has_finalizer(resource, finalizer) {
        return Ok(None);
    }

    info!(
        "Adding finalizer {} to {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        T::kind(&())
    );

    let mut updated = resource.clone();
    updated.finalizers_mut().push(finalizer.to_string());
    store.update(&updated).await.map(Some)
}

/// Remove `finalizer` from `resource` if present.
///
/// Returns the stored resource, or `None` when nothing had to be written.
///
/// # Errors
///
/// Returns a [`StoreError`] if the update fails.
pub async fn remove_finalizer<S, T>(
    store: &S,
    resource: &T,
    finalizer: &str,
) -> Result<Option<T>, StoreError>
where
    S: ObjectStore,
    T: StoreObject,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(None);
    }

    info!(
        "Removing finalizer {} from {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        T::kind(&())
    );

    let mut updated = resource.clone();
    updated.finalizers_mut().retain(|f| f != finalizer);
    store.update(&updated).await.map(Some)
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed object store used by the reconcilers.
//!
//! Reconcilers never call the Kubernetes API directly. They read and write through an
//! [`ObjectStore`], which has two implementations:
//!
//! - [`kube::KubeStore`] - production store backed by `kube::Api`
//! - [`memory::MemoryStore`] - in-memory store with API server semantics, used by tests
//!
//! Every kind the reconcilers touch implements [`StoreObject`], which knows how to build
//! a scoped `Api` for itself.

pub mod kube;
pub mod memory;

pub use self::kube::KubeStore;
pub use self::memory::MemoryStore;

use crate::crd::{ClusterDeployment, ClusterDeprovisionRequest, ClusterImageSet, DNSZone};
use crate::errors::StoreError;
use ::kube::{Api, Client, Resource, ResourceExt};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace of the object, `None` for cluster-scoped kinds
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Key of a namespaced object
    #[must_use]
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    /// Key of a cluster-scoped object
    #[must_use]
    pub fn cluster(name: &str) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
        }
    }

    /// Key of an existing object, taken from its metadata
    #[must_use]
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace(),
            name: obj.name_any(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// How dependents of a deleted object are garbage collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Delete the object now, dependents afterwards
    Background,
    /// Keep the object, marked for deletion, until every dependent is gone
    Foreground,
    /// Whatever the API server defaults to for the kind
    Default,
}

/// A kind that can be read and written through an [`ObjectStore`].
pub trait StoreObject:
    Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// `Api` for this kind, scoped to `namespace` (all namespaces when `None`).
    fn api(client: &Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! namespaced_object {
    ($($kind:ty),* $(,)?) => {
        $(
            impl StoreObject for $kind {
                fn api(client: &Client, namespace: Option<&str>) -> Api<Self> {
                    match namespace {
                        Some(ns) => Api::namespaced(client.clone(), ns),
                        None => Api::all(client.clone()),
                    }
                }
            }
        )*
    };
}

macro_rules! cluster_object {
    ($($kind:ty),* $(,)?) => {
        $(
            impl StoreObject for $kind {
                fn api(client: &Client, _namespace: Option<&str>) -> Api<Self> {
                    Api::all(client.clone())
                }
            }
        )*
    };
}

namespaced_object!(
    ClusterDeployment,
    DNSZone,
    ClusterDeprovisionRequest,
    Job,
    ConfigMap,
    Secret,
    Pod,
    ServiceAccount,
    Role,
    RoleBinding,
);

cluster_object!(ClusterImageSet, Namespace);

/// Typed get/create/update/delete/list with API server semantics.
///
/// - `get` maps "not found" to `Ok(None)`
/// - `create` fails with [`StoreError::AlreadyExists`] on a name collision
/// - `update` and `update_status` fail with [`StoreError::Conflict`] when the object's
///   `resourceVersion` is stale
/// - `delete` of a missing object succeeds
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    async fn delete<K: StoreObject>(
        &self,
        key: &ObjectKey,
        propagation: Propagation,
    ) -> Result<(), StoreError>;

    /// Objects of kind `K` in `namespace` (all namespaces when `None`) carrying every label in `labels`.
    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError>;
}

/// Render a label map as a Kubernetes equality selector (`a=b,c=d`).
#[must_use]
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

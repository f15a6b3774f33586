// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Production [`ObjectStore`] backed by the Kubernetes API.
//!
//! Every request is counted per controller, verb and resource through the injected
//! [`MetricsSink`] so API load can be attributed to the controller that caused it.

use super::{label_selector, ObjectKey, ObjectStore, Propagation, StoreObject};
use crate::errors::StoreError;
use crate::metrics::MetricsSink;
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// [`ObjectStore`] issuing requests through a `kube::Client`.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    metrics: Arc<dyn MetricsSink>,
    controller: String,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, metrics: Arc<dyn MetricsSink>, controller: &str) -> Self {
        Self {
            client,
            metrics,
            controller: controller.to_string(),
        }
    }

    /// Underlying client, for callers that need raw API access
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn count<K: StoreObject>(&self, verb: &str) {
        // group/version/resource only, never object names, to keep cardinality bounded
        let resource = format!("{}/{}", K::api_version(&()), K::plural(&()));
        self.metrics.store_request(&self.controller, verb, &resource);
    }
}

fn identify<K: StoreObject>(obj: &K) -> Result<(Option<String>, String), StoreError> {
    let name = obj.meta().name.clone().ok_or_else(|| StoreError::Invalid {
        kind: K::kind(&()).to_string(),
        reason: "metadata.name is required".to_string(),
    })?;
    Ok((obj.namespace(), name))
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        self.count::<K>("GET");
        let api = K::api(&self.client, key.namespace.as_deref());
        api.get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), &key.to_string()))
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = identify(obj)?;
        let key = ObjectKey { namespace, name };
        self.count::<K>("POST");
        debug!(kind = %K::kind(&()), object = %key, "Creating object");

        let api = K::api(&self.client, key.namespace.as_deref());
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), &key.to_string()))
    }

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = identify(obj)?;
        let key = ObjectKey { namespace, name };
        self.count::<K>("PUT");
        debug!(kind = %K::kind(&()), object = %key, "Replacing object");

        let api = K::api(&self.client, key.namespace.as_deref());
        api.replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), &key.to_string()))
    }

    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = identify(obj)?;
        let key = ObjectKey { namespace, name };
        self.count::<K>("PATCH");

        let value = serde_json::to_value(obj)?;
        // resourceVersion in a merge patch turns it into an optimistic-concurrency write
        let patch = json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": value.get("status").cloned().unwrap_or_default(),
        });
        debug!(kind = %K::kind(&()), object = %key, "Patching status");

        let api = K::api(&self.client, key.namespace.as_deref());
        api.patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), &key.to_string()))
    }

    async fn delete<K: StoreObject>(
        &self,
        key: &ObjectKey,
        propagation: Propagation,
    ) -> Result<(), StoreError> {
        self.count::<K>("DELETE");
        let params = match propagation {
            Propagation::Background => DeleteParams::background(),
            Propagation::Foreground => DeleteParams::foreground(),
            Propagation::Default => DeleteParams::default(),
        };
        debug!(kind = %K::kind(&()), object = %key, ?propagation, "Deleting object");

        let api = K::api(&self.client, key.namespace.as_deref());
        match api.delete(&key.name, &params).await {
            Ok(_) => Ok(()),
            Err(e) => match StoreError::from_kube(e, &K::kind(&()), &key.to_string()) {
                StoreError::NotFound { .. } => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError> {
        self.count::<K>("LIST");
        let api = K::api(&self.client, namespace);
        let mut params = ListParams::default();
        if !labels.is_empty() {
            params = params.labels(&label_selector(labels));
        }

        api.list(&params)
            .await
            .map(|list| list.items)
            .map_err(|e| {
                StoreError::from_kube(e, &K::kind(&()), namespace.unwrap_or("<all namespaces>"))
            })
    }
}

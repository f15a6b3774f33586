// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to installed clusters through their admin kubeconfig.
//!
//! - [`RemoteClusterFactory`] turns kubeconfig bytes into a [`RemoteCluster`] client
//! - [`fixup_kubeconfig`] normalizes the kubeconfig written by the installer
//! - [`api_url_from_kubeconfig`] extracts the API server URL of a named cluster entry

use crate::constants::{ROUTE_API_GROUP, ROUTE_API_VERSION, ROUTE_KIND};
use crate::errors::{ReconcileError, RemoteError};
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use serde_yaml::Value;
use tracing::debug;

/// Plural resource name of the remote route kind
const ROUTE_PLURAL: &str = "routes";

/// Client for an installed cluster.
#[async_trait]
pub trait RemoteCluster: Send + Sync {
    /// `spec.host` of the route `namespace/name`.
    async fn route_host(&self, namespace: &str, name: &str) -> Result<String, RemoteError>;
}

/// Builds [`RemoteCluster`] clients from kubeconfig bytes.
#[async_trait]
pub trait RemoteClusterFactory: Send + Sync {
    async fn build(&self, kubeconfig: &[u8]) -> Result<Box<dyn RemoteCluster>, RemoteError>;
}

/// Production [`RemoteClusterFactory`] creating `kube::Client`s.
#[derive(Debug, Default, Clone)]
pub struct KubeRemoteClusterFactory;

/// [`RemoteCluster`] backed by a `kube::Client` connected to the installed cluster.
pub struct KubeRemoteCluster {
    client: Client,
}

#[async_trait]
impl RemoteClusterFactory for KubeRemoteClusterFactory {
    async fn build(&self, kubeconfig: &[u8]) -> Result<Box<dyn RemoteCluster>, RemoteError> {
        let kubeconfig = parse_kubeconfig(kubeconfig).map_err(RemoteError::Kubeconfig)?;
        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| RemoteError::Kubeconfig(e.to_string()))?;
        let client = Client::try_from(config)?;
        Ok(Box::new(KubeRemoteCluster { client }))
    }
}

#[async_trait]
impl RemoteCluster for KubeRemoteCluster {
    async fn route_host(&self, namespace: &str, name: &str) -> Result<String, RemoteError> {
        let gvk = kube::core::GroupVersionKind {
            group: ROUTE_API_GROUP.to_string(),
            version: ROUTE_API_VERSION.to_string(),
            kind: ROUTE_KIND.to_string(),
        };
        let api_resource = kube::api::ApiResource::from_gvk_with_plural(&gvk, ROUTE_PLURAL);
        let api = kube::api::Api::<kube::api::DynamicObject>::namespaced_with(
            self.client.clone(),
            namespace,
            &api_resource,
        );

        let route = api.get(name).await?;
        debug!(namespace = %namespace, name = %name, "Read remote route");

        route
            .data
            .get("spec")
            .and_then(|spec| spec.get("host"))
            .and_then(serde_json::Value::as_str)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::MissingField {
                kind: ROUTE_KIND.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                field: "spec.host".to_string(),
            })
    }
}

fn parse_kubeconfig(raw: &[u8]) -> Result<Kubeconfig, String> {
    let text = std::str::from_utf8(raw).map_err(|e| format!("kubeconfig is not UTF-8: {e}"))?;
    Kubeconfig::from_yaml(text).map_err(|e| e.to_string())
}

/// API server URL of the cluster entry named `cluster_name`.
///
/// # Errors
///
/// Returns [`ReconcileError::Kubeconfig`] if the kubeconfig cannot be parsed or has no
/// cluster entry named `cluster_name` with a server.
pub fn api_url_from_kubeconfig(raw: &[u8], cluster_name: &str) -> Result<String, ReconcileError> {
    let kubeconfig = parse_kubeconfig(raw).map_err(ReconcileError::Kubeconfig)?;

    kubeconfig
        .clusters
        .iter()
        .find(|named| named.name == cluster_name)
        .and_then(|named| named.cluster.as_ref())
        .and_then(|cluster| cluster.server.clone())
        .ok_or_else(|| {
            ReconcileError::Kubeconfig(format!(
                "admin kubeconfig has no server for cluster {cluster_name}"
            ))
        })
}

/// Normalize an admin kubeconfig.
///
/// - `current-context` is set to the first context when missing or empty
/// - trailing `/` are trimmed from every cluster `server`
///
/// Applying it to its own output changes nothing.
///
/// # Errors
///
/// Returns [`ReconcileError::Kubeconfig`] if the input is not a YAML mapping.
pub fn fixup_kubeconfig(raw: &[u8]) -> Result<Vec<u8>, ReconcileError> {
    let mut doc: Value = serde_yaml::from_slice(raw)
        .map_err(|e| ReconcileError::Kubeconfig(format!("cannot parse kubeconfig: {e}")))?;
    let Some(root) = doc.as_mapping_mut() else {
        return Err(ReconcileError::Kubeconfig(
            "kubeconfig is not a YAML mapping".to_string(),
        ));
    };

    let current_context_missing = root
        .get("current-context")
        .and_then(Value::as_str)
        .is_none_or(str::is_empty);
    if current_context_missing {
        let first_context = root
            .get("contexts")
            .and_then(Value::as_sequence)
            .and_then(|contexts| contexts.first())
            .and_then(|context| context.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(name) = first_context {
            root.insert(Value::from("current-context"), Value::from(name));
        }
    }

    if let Some(clusters) = root.get_mut("clusters").and_then(Value::as_sequence_mut) {
        for entry in clusters.iter_mut() {
            let Some(cluster) = entry.get_mut("cluster").and_then(Value::as_mapping_mut) else {
                continue;
            };
            let trimmed = cluster
                .get("server")
                .and_then(Value::as_str)
                .map(|server| server.trim_end_matches('/').to_string());
            if let Some(server) = trimmed {
                cluster.insert(Value::from("server"), Value::from(server));
            }
        }
    }

    serde_yaml::to_string(&doc)
        .map(String::into_bytes)
        .map_err(|e| ReconcileError::Kubeconfig(format!("cannot render kubeconfig: {e}")))
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod remote_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for cluster lifecycle management.
//!
//! This module defines the Kubernetes Custom Resource Definitions used by clusterward
//! to provision and deprovision clusters declaratively.
//!
//! # Resource Types
//!
//! - [`ClusterDeployment`] - The desired cluster, reconciled by the operator
//! - [`ClusterImageSet`] - Cluster-scoped set of fallback images
//! - [`DNSZone`] - A managed DNS zone created for a deployment when `manageDNS` is set
//! - [`ClusterDeprovisionRequest`] - Created on deletion to tear down cloud resources
//!
//! # Example: Describing a Cluster
//!
//! ```rust,no_run
//! use clusterward::crd::{ClusterDeploymentSpec, ClusterIngress, SecretReference};
//!
//! let spec = ClusterDeploymentSpec {
//!     cluster_name: "bar".to_string(),
//!     base_domain: "clusters.example.com".to_string(),
//!     ingress: vec![ClusterIngress {
//!         name: "default".to_string(),
//!         domain: "apps.bar.clusters.example.com".to_string(),
//!     }],
//!     ssh_key: Some(SecretReference { name: "ssh-key".to_string() }),
//!     pull_secret: SecretReference { name: "pull-secret".to_string() },
//!     ..Default::default()
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to a secret in the same namespace as the referencing resource.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct SecretReference {
    /// Name of the secret.
    pub name: String,
}

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `ClusterImageSetNotFound` or `Available`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition was refreshed (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// ============================================================================
// ClusterDeployment
// ============================================================================

/// Ingress entry published by the provisioned cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIngress {
    /// Name of the ingress controller.
    pub name: String,

    /// Domain served by the ingress controller. Never carries a leading `*.`.
    pub domain: String,
}

/// Image overrides taking precedence over the image set and operator defaults.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionImages {
    /// Image providing the installer binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_image: Option<String>,

    /// Release payload image to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_image: Option<String>,

    /// Image running the install manager inside install jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_image: Option<String>,
}

/// Reference to a cluster-scoped [`ClusterImageSet`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct ClusterImageSetReference {
    /// Name of the image set.
    pub name: String,
}

/// AWS platform parameters.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AwsPlatform {
    /// AWS region the cluster lives in.
    pub region: String,

    /// Tags applied to every AWS resource created for the cluster.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_tags: BTreeMap<String, String>,
}

/// Cloud platform the cluster is provisioned on.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct Platform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsPlatform>,
}

/// AWS credentials used for provisioning and deprovisioning.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct AwsPlatformSecrets {
    /// Secret holding the AWS access key pair.
    pub credentials: SecretReference,
}

/// Platform credentials, keyed by platform.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct PlatformSecrets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsPlatformSecrets>,
}

/// `ClusterDeployment` describes a cluster that should be provisioned, kept, and eventually
/// deprovisioned by the operator.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "clusterward.firestoned.io",
    version = "v1alpha1",
    derive = "PartialEq",
    kind = "ClusterDeployment",
    namespaced,
    shortname = "cd",
    doc = "ClusterDeployment describes a remote cluster. The operator runs install jobs until the cluster is installed and requests deprovisioning when the resource is deleted."
)]
#[kube(status = "ClusterDeploymentStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    /// Name of the target cluster; also the kubeconfig cluster entry used for the API URL.
    pub cluster_name: String,

    /// Base DNS domain of the cluster.
    pub base_domain: String,

    /// Ingress controllers to configure on the cluster.
    #[serde(default)]
    pub ingress: Vec<ClusterIngress>,

    /// Image overrides.
    #[serde(default)]
    pub images: ProvisionImages,

    /// Image set supplying fallback images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_set: Option<ClusterImageSetReference>,

    /// Secret with the SSH public key under `ssh-publickey`. Required to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<SecretReference>,

    /// Secret with the image pull secret under `.dockerconfigjson`.
    pub pull_secret: SecretReference,

    /// Cloud platform parameters.
    #[serde(default)]
    pub platform: Platform,

    /// Cloud platform credentials.
    #[serde(default)]
    pub platform_secrets: PlatformSecrets,

    /// Create and wait for a managed [`DNSZone`] for `baseDomain` before installing.
    #[serde(default, rename = "manageDNS")]
    pub manage_dns: bool,

    /// Skip deprovisioning of an installed cluster when this resource is deleted.
    #[serde(default)]
    pub preserve_on_delete: bool,
}

/// Observed state of a [`ClusterDeployment`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentStatus {
    /// Set once the install job has succeeded. Never reverts.
    #[serde(default)]
    pub installed: bool,

    /// Installer image resolved from the spec, the image set, or a resolution job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_image: Option<String>,

    /// Infrastructure identifier reported by the installer.
    #[serde(default, rename = "infraID", skip_serializing_if = "Option::is_none")]
    pub infra_id: Option<String>,

    /// Cluster identifier reported by the installer.
    #[serde(default, rename = "clusterID", skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    /// Container restarts observed across install pods.
    #[serde(default)]
    pub install_restarts: i32,

    /// Secret holding the admin kubeconfig of the installed cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_kubeconfig_secret: Option<SecretReference>,

    /// API server URL of the installed cluster.
    #[serde(default, rename = "apiURL", skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Web console URL of the installed cluster.
    #[serde(default, rename = "webConsoleURL", skip_serializing_if = "Option::is_none")]
    pub web_console_url: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// ============================================================================
// ClusterImageSet
// ============================================================================

/// `ClusterImageSet` supplies fallback images for deployments referencing it.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "clusterward.firestoned.io",
    version = "v1alpha1",
    derive = "PartialEq",
    kind = "ClusterImageSet",
    shortname = "imgset",
    doc = "ClusterImageSet is a cluster-scoped set of images used when a ClusterDeployment does not override them."
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterImageSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_image: Option<String>,
}

// ============================================================================
// DNSZone
// ============================================================================

/// Tag applied to AWS resources backing a zone.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct AwsResourceTag {
    pub key: String,
    pub value: String,
}

/// AWS parameters of a managed zone.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AwsDnsZoneSpec {
    /// Secret with the AWS credentials used to manage the zone.
    pub account_secret: SecretReference,

    /// AWS region used for API calls.
    pub region: String,

    /// Tags applied to the hosted zone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_tags: Vec<AwsResourceTag>,
}

/// `DNSZone` is a DNS zone managed on behalf of a `ClusterDeployment`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "clusterward.firestoned.io",
    version = "v1alpha1",
    derive = "PartialEq",
    kind = "DNSZone",
    namespaced,
    doc = "DNSZone is a cloud DNS zone created for a ClusterDeployment with manageDNS set. Install jobs wait until its Available condition is True."
)]
#[kube(status = "DNSZoneStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSZoneSpec {
    /// Zone name, the deployment's base domain.
    pub zone: String,

    /// Delegate the zone from its parent domain.
    #[serde(default)]
    pub link_to_parent_domain: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsDnsZoneSpec>,
}

/// `DNSZone` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct DNSZoneStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// ============================================================================
// ClusterDeprovisionRequest
// ============================================================================

/// AWS parameters copied into a deprovision request.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct AwsClusterDeprovisionRequest {
    /// AWS region to clean up.
    pub region: String,

    /// Secret holding the AWS credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<SecretReference>,
}

/// Platform parameters of a deprovision request.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct ClusterDeprovisionRequestPlatform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsClusterDeprovisionRequest>,
}

/// `ClusterDeprovisionRequest` asks for the cloud resources of a cluster to be destroyed.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "clusterward.firestoned.io",
    version = "v1alpha1",
    derive = "PartialEq",
    kind = "ClusterDeprovisionRequest",
    namespaced,
    shortname = "cdr",
    doc = "ClusterDeprovisionRequest is created when a ClusterDeployment with recorded infrastructure is deleted. The deployment keeps its finalizer until the request reports completion."
)]
#[kube(status = "ClusterDeprovisionRequestStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeprovisionRequestSpec {
    /// Infrastructure identifier of the cluster to destroy.
    #[serde(rename = "infraID")]
    pub infra_id: String,

    /// Cluster identifier of the cluster to destroy.
    #[serde(default, rename = "clusterID")]
    pub cluster_id: String,

    #[serde(default)]
    pub platform: ClusterDeprovisionRequestPlatform,
}

/// `ClusterDeprovisionRequest` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct ClusterDeprovisionRequestStatus {
    /// Set once every cloud resource of the cluster has been removed.
    #[serde(default)]
    pub completed: bool,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;

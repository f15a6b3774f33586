// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label, annotation and finalizer constants used across the reconcilers.
//!
//! This module defines the standard Kubernetes labels and clusterward-specific
//! labels/annotations so every child resource is tagged consistently.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Value for `app.kubernetes.io/part-of` and `app.kubernetes.io/managed-by`
pub const PART_OF_CLUSTERWARD: &str = "clusterward";

// ============================================================================
// Clusterward Labels
// ============================================================================

/// Label carrying the owning `ClusterDeployment` name on jobs and their pods
pub const CLUSTER_DEPLOYMENT_NAME_LABEL: &str = "clusterward.firestoned.io/cluster-deployment-name";

/// Label marking install job pods
pub const INSTALL_JOB_LABEL: &str = "clusterward.firestoned.io/install-job";

/// Label marking installer image resolution job pods
pub const IMAGESET_JOB_LABEL: &str = "clusterward.firestoned.io/imageset-job";

/// Label on a `ClusterDeployment` used as the `cluster_type` metrics dimension
pub const CLUSTER_TYPE_LABEL: &str = "clusterward.firestoned.io/cluster-type";

/// Metrics dimension used when a deployment carries no cluster type label
pub const DEFAULT_CLUSTER_TYPE: &str = "unspecified";

// ============================================================================
// Clusterward Annotations
// ============================================================================

/// Annotation holding a duration after which the `ClusterDeployment` is deleted
pub const DELETE_AFTER_ANNOTATION: &str = "clusterward.firestoned.io/delete-after";

/// Annotation holding the content hash of an install job's spec
pub const JOB_HASH_ANNOTATION: &str = "clusterward.firestoned.io/jobhash";

/// Annotation holding the `ClusterDeployment` generation a child was generated from
pub const CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION: &str =
    "clusterward.firestoned.io/cluster-deployment-generation";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer guaranteeing deprovisioning runs before a `ClusterDeployment` disappears
pub const FINALIZER_DEPROVISION: &str = "clusterward.firestoned.io/deprovision";

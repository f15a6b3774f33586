// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the clusterward operator.
//!
//! This module contains the numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all clusterward CRDs
pub const API_GROUP: &str = "clusterward.firestoned.io";

/// API version for all clusterward CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "clusterward.firestoned.io/v1alpha1";

/// Kind name for `ClusterDeployment` resource
pub const KIND_CLUSTER_DEPLOYMENT: &str = "ClusterDeployment";

/// Kind name for `ClusterImageSet` resource
pub const KIND_CLUSTER_IMAGE_SET: &str = "ClusterImageSet";

/// Kind name for `DNSZone` resource
pub const KIND_DNS_ZONE: &str = "DNSZone";

/// Kind name for `ClusterDeprovisionRequest` resource
pub const KIND_CLUSTER_DEPROVISION_REQUEST: &str = "ClusterDeprovisionRequest";

// ============================================================================
// Controller Constants
// ============================================================================

/// Name reported in logs and request metrics for the `ClusterDeployment` controller
pub const CLUSTER_DEPLOYMENT_CONTROLLER: &str = "clusterdeployment";

/// Default number of `ClusterDeployment` reconciliations allowed to run at once
pub const DEFAULT_CONCURRENCY: u16 = 5;

/// Default wait before re-checking a child that is being deleted (seconds)
pub const DEFAULT_TERMINATING_REQUEUE_SECS: u64 = 10;

/// Grace added past the expiry instant before the expiry re-check (seconds)
pub const DEFAULT_EXPIRY_GRACE_SECS: u64 = 60;

/// Initial delay after a failed reconciliation (seconds)
pub const DEFAULT_ERROR_BACKOFF_BASE_SECS: u64 = 5;

/// Upper bound for the delay after repeated failed reconciliations (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Interval between sweeps of error backoff entries of deleted deployments
pub const BACKOFF_PRUNE_INTERVAL_SECS: u64 = 300;

/// Default listen address for the metrics and health endpoints
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Image Defaults
// ============================================================================

/// Operator image used by install jobs when neither the deployment nor its image set names one
pub const DEFAULT_OPERATOR_IMAGE: &str = "ghcr.io/firestoned/clusterward:latest";

/// CLI image used by the installer-image resolution job
pub const DEFAULT_CLI_IMAGE: &str = "quay.io/openshift/origin-cli:latest";

// ============================================================================
// Child Resource Naming
// ============================================================================

/// Suffix of the install job name (`<cluster>-install`)
pub const INSTALL_JOB_SUFFIX: &str = "install";

/// Suffix of the install config map name (`<cluster>-install-config`)
pub const INSTALL_CONFIG_SUFFIX: &str = "install-config";

/// Suffix of the installer image resolution job name (`<cluster>-imageset`)
pub const IMAGESET_JOB_SUFFIX: &str = "imageset";

/// Suffix of the managed DNS zone name (`<cluster>-zone`)
pub const DNS_ZONE_SUFFIX: &str = "zone";

/// Suffix of the admin kubeconfig secret name (`<cluster>-admin-kubeconfig`)
pub const ADMIN_KUBECONFIG_SUFFIX: &str = "admin-kubeconfig";

/// Service account, role and role binding name used by install and imageset jobs
pub const INSTALLER_SERVICE_ACCOUNT: &str = "cluster-installer";

/// Key within the install config map holding the rendered install config
pub const INSTALL_CONFIG_KEY: &str = "install-config.yaml";

// ============================================================================
// Secret Keys
// ============================================================================

/// Key within the SSH key secret holding the public key
pub const SSH_PUBLIC_KEY_SECRET_KEY: &str = "ssh-publickey";

/// Key within the pull secret holding the docker config
pub const PULL_SECRET_KEY: &str = ".dockerconfigjson";

/// Key within the admin kubeconfig secret holding the fixed-up kubeconfig
pub const ADMIN_KUBECONFIG_KEY: &str = "kubeconfig";

/// Key within the admin kubeconfig secret preserving the kubeconfig as written by the installer
pub const RAW_ADMIN_KUBECONFIG_KEY: &str = "raw-kubeconfig";

// ============================================================================
// Remote Cluster Constants
// ============================================================================

/// Namespace of the console route on an installed cluster
pub const CONSOLE_ROUTE_NAMESPACE: &str = "openshift-console";

/// Name of the console route on an installed cluster
pub const CONSOLE_ROUTE_NAME: &str = "console";

/// API group of the remote route resource
pub const ROUTE_API_GROUP: &str = "route.openshift.io";

/// API version of the remote route resource
pub const ROUTE_API_VERSION: &str = "v1";

/// Kind of the remote route resource
pub const ROUTE_KIND: &str = "Route";

// ============================================================================
// Job Constants
// ============================================================================

/// Retry budget for install jobs; failures are surfaced via pod restarts rather than new pods
pub const INSTALL_JOB_BACKOFF_LIMIT: i32 = 123_456;

/// Retry budget for installer image resolution jobs
pub const IMAGESET_JOB_BACKOFF_LIMIT: i32 = 2;

/// Mount path of the shared binaries volume inside install pods
pub const INSTALLER_BIN_MOUNT_PATH: &str = "/output";

/// Mount path of the install config volume inside install pods
pub const INSTALL_CONFIG_MOUNT_PATH: &str = "/installconfig";

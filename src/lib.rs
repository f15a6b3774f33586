// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Clusterward - ClusterDeployment Lifecycle Operator for Kubernetes
//!
//! Clusterward is a Kubernetes operator written in Rust that provisions, installs and
//! deprovisions clusters described by `ClusterDeployment` custom resources.
//!
//! ## Overview
//!
//! This library provides the core functionality for the operator, including:
//!
//! - Custom Resource Definitions (CRDs) for deployments, image sets, DNS zones and
//!   deprovision requests
//! - Reconciliation logic driving a deployment from creation to deletion
//! - Generation of install jobs, install configs and their RBAC
//! - Normalization of the admin kubeconfig of installed clusters
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic
//! - [`context`] - Shared context handed to the reconcilers
//! - [`store`] - API server access, backed by kube or by memory
//! - [`install_resources`] - Install job and child resource builders
//! - [`remote`] - Clients for installed clusters
//! - [`watch`] - Mapping of child notifications to deployments
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use clusterward::crd::{ClusterDeployment, ClusterDeploymentSpec, SecretReference};
//!
//! let spec = ClusterDeploymentSpec {
//!     cluster_name: "dev".to_string(),
//!     base_domain: "clusters.example.com".to_string(),
//!     pull_secret: SecretReference {
//!         name: "pull-secret".to_string(),
//!     },
//!     ..Default::default()
//! };
//! let cd = ClusterDeployment::new("dev", spec);
//! ```
//!
//! ## Features
//!
//! - **Level Triggered** - Every pass re-reads state and takes one step
//! - **Managed DNS** - Optional per-cluster hosted zones
//! - **Expiry** - `delete-after` annotation for short-lived clusters
//! - **Status Tracking** - Full status subresources

pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod install_resources;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod remote;
pub mod status_reasons;
pub mod store;
pub mod watch;

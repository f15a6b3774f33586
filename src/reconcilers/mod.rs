// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for cluster provisioning resources.
//!
//! This module contains the reconciliation logic for `ClusterDeployment` resources and the
//! helpers it is built from.
//!
//! # Reconciliation Architecture
//!
//! Clusterward follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor deployments and the children they own
//! 2. **Reconcile** - Take one step from the observed state toward the desired state
//! 3. **Status** - Report results back on the deployment status subresource
//! 4. **Requeue** - Come back after a delay, or wait for the next change notification
//!
//! # Available Reconcilers
//!
//! - [`reconcile_clusterdeployment`] - Provisions, installs and deprovisions clusters
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use clusterward::context::Context;
//! use clusterward::reconcilers::{reconcile_clusterdeployment, ReconcileOutcome};
//! use clusterward::store::{KubeStore, ObjectKey};
//!
//! async fn reconcile_one(ctx: &Context<KubeStore>) -> anyhow::Result<()> {
//!     let key = ObjectKey::namespaced("clusters", "dev-cluster");
//!     match reconcile_clusterdeployment(ctx, &key).await? {
//!         ReconcileOutcome::Done => {}
//!         ReconcileOutcome::RequeueAfter(delay) => println!("again in {delay:?}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod clusterdeployment;
pub mod finalizers;
pub mod status;

pub use clusterdeployment::{prune_error_backoff, reconcile_clusterdeployment, ReconcileOutcome};

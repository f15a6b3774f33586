// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mapping of watch events onto `ClusterDeployment` reconcile requests.
//!
//! The controller watches `ClusterDeployment`s directly, the children they own, and
//! install pods. Each mapper here is pure so the triggering rules can be tested without
//! an API server.

use crate::constants::{API_GROUP_VERSION, KIND_CLUSTER_DEPLOYMENT};
use crate::crd::ClusterDeployment;
use crate::labels::CLUSTER_DEPLOYMENT_NAME_LABEL;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use std::fmt;
use tracing::debug;

/// What caused a `ClusterDeployment` to be queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotificationSource {
    /// The deployment itself changed
    Primary,
    /// A child controlled by the deployment changed
    Owned { kind: String },
    /// A pod labelled with the deployment name changed
    InstallPod,
}

impl fmt::Display for NotificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "{KIND_CLUSTER_DEPLOYMENT}"),
            Self::Owned { kind } => write!(f, "owned {kind}"),
            Self::InstallPod => write!(f, "install pod"),
        }
    }
}

/// Deployment named by the `cluster-deployment-name` label of `pod`, in the pod's namespace.
#[must_use]
pub fn cluster_deployment_for_pod(pod: &Pod) -> Option<ObjectRef<ClusterDeployment>> {
    let namespace = pod.namespace()?;
    let name = pod.labels().get(CLUSTER_DEPLOYMENT_NAME_LABEL)?;

    debug!(
        trigger = %NotificationSource::InstallPod,
        pod = %pod.name_any(),
        namespace = %namespace,
        cluster_deployment = %name,
        "Queueing cluster deployment"
    );
    Some(ObjectRef::new(name).within(&namespace))
}

/// Deployment holding the controller owner reference of `obj`.
///
/// Objects without a `ClusterDeployment` controller are ignored.
#[must_use]
pub fn cluster_deployment_for_owner<K>(obj: &K) -> Option<ObjectRef<ClusterDeployment>>
where
    K: Resource<DynamicType = ()>,
{
    let namespace = obj.namespace()?;
    let owner = obj.owner_references().iter().find(|owner| {
        owner.controller == Some(true)
            && owner.kind == KIND_CLUSTER_DEPLOYMENT
            && owner.api_version == API_GROUP_VERSION
    })?;

    debug!(
        trigger = %NotificationSource::Owned { kind: K::kind(&()).to_string() },
        object = %obj.name_any(),
        namespace = %namespace,
        cluster_deployment = %owner.name,
        "Queueing cluster deployment"
    );
    Some(ObjectRef::new(&owner.name).within(&namespace))
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;

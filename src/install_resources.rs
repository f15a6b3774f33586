// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes resource builders for cluster installation.
//!
//! This module builds every child object the `ClusterDeployment` reconciler creates:
//! install jobs and their install-config `ConfigMap`, installer image resolution jobs,
//! installer RBAC, managed `DNSZone`s and `ClusterDeprovisionRequest`s.
//! All functions are pure and easily testable.
//!
//! Job templating sits behind the [`ArtifactBuilder`] trait so the reconciler can be
//! driven with alternative templates; [`TemplateArtifactBuilder`] is the production one.

use crate::constants::{
    API_GROUP, API_GROUP_VERSION, DNS_ZONE_SUFFIX, IMAGESET_JOB_BACKOFF_LIMIT,
    IMAGESET_JOB_SUFFIX, INSTALLER_BIN_MOUNT_PATH, INSTALLER_SERVICE_ACCOUNT,
    INSTALL_CONFIG_KEY, INSTALL_CONFIG_MOUNT_PATH, INSTALL_CONFIG_SUFFIX,
    INSTALL_JOB_BACKOFF_LIMIT, INSTALL_JOB_SUFFIX, KIND_CLUSTER_DEPLOYMENT,
};
use crate::crd::{
    AwsClusterDeprovisionRequest, AwsDnsZoneSpec, AwsPlatform, AwsPlatformSecrets,
    AwsResourceTag, ClusterDeployment, ClusterDeprovisionRequest, ClusterDeprovisionRequestPlatform,
    ClusterDeprovisionRequestSpec, ClusterIngress, DNSZone, DNSZoneSpec, Platform,
};
use crate::errors::BuildError;
use crate::labels::{
    CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION, CLUSTER_DEPLOYMENT_NAME_LABEL, IMAGESET_JOB_LABEL,
    INSTALL_JOB_LABEL, K8S_MANAGED_BY, K8S_PART_OF, PART_OF_CLUSTERWARD,
};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EmptyDirVolumeSource, EnvVar, PodSpec,
    PodTemplateSpec, ServiceAccount, Volume, VolumeMount,
};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

// Container and volume names inside install pods
const CONTAINER_INSTALLER: &str = "installer";
const CONTAINER_INSTALL_MANAGER: &str = "installmanager";
const CONTAINER_IMAGESET: &str = "imageset";
const VOLUME_INSTALLER_BIN: &str = "installer-bin";
const VOLUME_INSTALL_CONFIG: &str = "install-config";

// Entry points inside the images
const INSTALLER_BINARY: &str = "/bin/installer";
const INSTALL_MANAGER_BINARY: &str = "/usr/local/bin/installmanager";
const RESOLVE_INSTALLER_IMAGE_BINARY: &str = "/usr/local/bin/resolve-installer-image";

/// Inputs of [`ArtifactBuilder::build_install`].
#[derive(Clone, Debug)]
pub struct InstallParams<'a> {
    pub cluster_deployment: &'a ClusterDeployment,
    pub installer_image: &'a str,
    pub operator_image: &'a str,
    /// Empty when neither the deployment nor its image set names one
    pub release_image: &'a str,
    pub service_account: &'a str,
    pub ssh_key: &'a str,
    pub pull_secret: &'a str,
}

/// Inputs of [`ArtifactBuilder::build_imageset_job`].
#[derive(Clone, Debug)]
pub struct ImageSetJobParams<'a> {
    pub cluster_deployment: &'a ClusterDeployment,
    pub cli_image: &'a str,
    pub release_image: &'a str,
    pub service_account: &'a str,
}

/// Produces the workloads that install a cluster.
///
/// Returned objects carry names, namespaces, labels and the generation annotation.
/// Owner references and the job hash are added by the caller.
pub trait ArtifactBuilder: Send + Sync {
    /// Build the install job and its install-config `ConfigMap`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when a required input is missing or the install config
    /// cannot be rendered.
    fn build_install(&self, params: &InstallParams<'_>) -> Result<(Job, ConfigMap), BuildError>;

    /// Build the job resolving the installer image from the release image.
    fn build_imageset_job(&self, params: &ImageSetJobParams<'_>) -> Job;
}

/// Production [`ArtifactBuilder`].
#[derive(Debug, Default, Clone)]
pub struct TemplateArtifactBuilder;

/// `install-config.yaml` document consumed by the installer.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstallConfig<'a> {
    api_version: &'static str,
    base_domain: &'a str,
    metadata: InstallConfigMetadata<'a>,
    platform: &'a Platform,
    pull_secret: &'a str,
    ssh_key: &'a str,
    #[serde(skip_serializing_if = "<[ClusterIngress]>::is_empty")]
    ingress: &'a [ClusterIngress],
}

#[derive(Serialize)]
struct InstallConfigMetadata<'a> {
    name: &'a str,
}

/// Name of the install job of `cd_name`.
#[must_use]
pub fn install_job_name(cd_name: &str) -> String {
    format!("{cd_name}-{INSTALL_JOB_SUFFIX}")
}

/// Name of the install-config `ConfigMap` of `cd_name`.
#[must_use]
pub fn install_config_name(cd_name: &str) -> String {
    format!("{cd_name}-{INSTALL_CONFIG_SUFFIX}")
}

/// Name of the installer image resolution job of `cd_name`.
#[must_use]
pub fn imageset_job_name(cd_name: &str) -> String {
    format!("{cd_name}-{IMAGESET_JOB_SUFFIX}")
}

/// Name of the managed `DNSZone` of `cd_name`.
#[must_use]
pub fn dns_zone_name(cd_name: &str) -> String {
    format!("{cd_name}-{DNS_ZONE_SUFFIX}")
}

/// Labels selecting the install pods of `cd_name`.
#[must_use]
pub fn install_pod_labels(cd_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_DEPLOYMENT_NAME_LABEL.to_string(), cd_name.to_string()),
        (INSTALL_JOB_LABEL.to_string(), "true".to_string()),
    ])
}

fn imageset_pod_labels(cd_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_DEPLOYMENT_NAME_LABEL.to_string(), cd_name.to_string()),
        (IMAGESET_JOB_LABEL.to_string(), "true".to_string()),
    ])
}

fn generation_annotations(cd: &ClusterDeployment) -> BTreeMap<String, String> {
    BTreeMap::from([(
        CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION.to_string(),
        cd.metadata.generation.unwrap_or_default().to_string(),
    )])
}

fn env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

/// Builds the controller owner reference pointing at `cd`.
#[must_use]
pub fn build_owner_reference(cd: &ClusterDeployment) -> OwnerReference {
    OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_CLUSTER_DEPLOYMENT.to_string(),
        name: cd.name_any(),
        uid: cd.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Makes `cd` the controller owner of the object described by `meta`.
///
/// Any previous controller reference is replaced; other owners are kept.
pub fn set_controller_reference(meta: &mut ObjectMeta, cd: &ClusterDeployment) {
    let mut owners: Vec<OwnerReference> = meta
        .owner_references
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|owner| owner.controller != Some(true))
        .collect();
    owners.push(build_owner_reference(cd));
    meta.owner_references = Some(owners);
}

/// Hash of `job.spec`, used to detect changes of the generated install job.
///
/// Only the spec is hashed, so annotations and owner references never affect the result.
///
/// # Errors
///
/// Returns [`BuildError::Hash`] if the spec cannot be serialized.
pub fn calculate_job_spec_hash(job: &Job) -> Result<String, BuildError> {
    let bytes = serde_json::to_vec(&job.spec).map_err(BuildError::Hash)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

impl TemplateArtifactBuilder {
    fn render_install_config(params: &InstallParams<'_>) -> Result<String, BuildError> {
        let cd = params.cluster_deployment;
        let config = InstallConfig {
            api_version: "v1",
            base_domain: &cd.spec.base_domain,
            metadata: InstallConfigMetadata {
                name: &cd.spec.cluster_name,
            },
            platform: &cd.spec.platform,
            pull_secret: params.pull_secret,
            ssh_key: params.ssh_key,
            ingress: &cd.spec.ingress,
        };
        Ok(serde_yaml::to_string(&config)?)
    }

    fn install_pod_spec(params: &InstallParams<'_>, config_map_name: &str) -> PodSpec {
        let cd = params.cluster_deployment;

        let installer = Container {
            name: CONTAINER_INSTALLER.to_string(),
            image: Some(params.installer_image.to_string()),
            command: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                format!("cp -v {INSTALLER_BINARY} {INSTALLER_BIN_MOUNT_PATH}/"),
            ]),
            volume_mounts: Some(vec![VolumeMount {
                name: VOLUME_INSTALLER_BIN.to_string(),
                mount_path: INSTALLER_BIN_MOUNT_PATH.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let mut manager_env = vec![env("CLUSTER_NAME", &cd.spec.cluster_name)];
        if !params.release_image.is_empty() {
            manager_env.push(env("RELEASE_IMAGE", params.release_image));
        }

        let install_manager = Container {
            name: CONTAINER_INSTALL_MANAGER.to_string(),
            image: Some(params.operator_image.to_string()),
            command: Some(vec![INSTALL_MANAGER_BINARY.to_string()]),
            args: Some(vec![
                "--work-dir".to_string(),
                INSTALLER_BIN_MOUNT_PATH.to_string(),
                "--install-config".to_string(),
                format!("{INSTALL_CONFIG_MOUNT_PATH}/{INSTALL_CONFIG_KEY}"),
                "--namespace".to_string(),
                cd.namespace().unwrap_or_default(),
                "--cluster-deployment".to_string(),
                cd.name_any(),
            ]),
            env: Some(manager_env),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: VOLUME_INSTALLER_BIN.to_string(),
                    mount_path: INSTALLER_BIN_MOUNT_PATH.to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: VOLUME_INSTALL_CONFIG.to_string(),
                    mount_path: INSTALL_CONFIG_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        PodSpec {
            service_account_name: Some(params.service_account.to_string()),
            restart_policy: Some("OnFailure".to_string()),
            init_containers: Some(vec![installer]),
            containers: vec![install_manager],
            volumes: Some(vec![
                Volume {
                    name: VOLUME_INSTALLER_BIN.to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                },
                Volume {
                    name: VOLUME_INSTALL_CONFIG.to_string(),
                    config_map: Some(ConfigMapVolumeSource {
                        name: config_map_name.to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }
    }
}

impl ArtifactBuilder for TemplateArtifactBuilder {
    fn build_install(&self, params: &InstallParams<'_>) -> Result<(Job, ConfigMap), BuildError> {
        let cd = params.cluster_deployment;
        let namespace = cd
            .namespace()
            .ok_or_else(|| BuildError::MissingInput("cluster deployment namespace".into()))?;
        if params.installer_image.is_empty() {
            return Err(BuildError::MissingInput("installer image".into()));
        }
        if params.pull_secret.is_empty() {
            return Err(BuildError::MissingInput("pull secret".into()));
        }

        let cd_name = cd.name_any();
        let config_map_name = install_config_name(&cd_name);
        let labels = install_pod_labels(&cd_name);

        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some(config_map_name.clone()),
                namespace: Some(namespace.clone()),
                labels: Some(BTreeMap::from([(
                    CLUSTER_DEPLOYMENT_NAME_LABEL.to_string(),
                    cd_name.clone(),
                )])),
                annotations: Some(generation_annotations(cd)),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                INSTALL_CONFIG_KEY.to_string(),
                Self::render_install_config(params)?,
            )])),
            ..Default::default()
        };

        let job = Job {
            metadata: ObjectMeta {
                name: Some(install_job_name(&cd_name)),
                namespace: Some(namespace),
                labels: Some(labels.clone()),
                annotations: Some(generation_annotations(cd)),
                ..Default::default()
            },
            spec: Some(JobSpec {
                backoff_limit: Some(INSTALL_JOB_BACKOFF_LIMIT),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(Self::install_pod_spec(params, &config_map_name)),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        debug!(
            namespace = ?job.metadata.namespace,
            job = ?job.metadata.name,
            "Built install artifacts"
        );
        Ok((job, config_map))
    }

    fn build_imageset_job(&self, params: &ImageSetJobParams<'_>) -> Job {
        let cd = params.cluster_deployment;
        let cd_name = cd.name_any();
        let namespace = cd.namespace().unwrap_or_default();
        let labels = imageset_pod_labels(&cd_name);

        let mut job_env = Vec::new();
        if !params.release_image.is_empty() {
            job_env.push(env("RELEASE_IMAGE", params.release_image));
        }
        job_env.push(env("CLUSTER_DEPLOYMENT_NAME", &cd_name));
        job_env.push(env("CLUSTER_DEPLOYMENT_NAMESPACE", &namespace));

        let mut metadata = ObjectMeta {
            name: Some(imageset_job_name(&cd_name)),
            namespace: Some(namespace),
            labels: Some(labels.clone()),
            ..Default::default()
        };
        set_controller_reference(&mut metadata, cd);

        Job {
            metadata,
            spec: Some(JobSpec {
                backoff_limit: Some(IMAGESET_JOB_BACKOFF_LIMIT),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        service_account_name: Some(params.service_account.to_string()),
                        restart_policy: Some("OnFailure".to_string()),
                        containers: vec![Container {
                            name: CONTAINER_IMAGESET.to_string(),
                            image: Some(params.cli_image.to_string()),
                            command: Some(vec![RESOLVE_INSTALLER_IMAGE_BINARY.to_string()]),
                            env: Some(job_env),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

// ============================================================================
// Installer RBAC
// ============================================================================

fn installer_meta(namespace: &str) -> ObjectMeta {
    // Shared by every deployment in the namespace, so no owner references
    ObjectMeta {
        name: Some(INSTALLER_SERVICE_ACCOUNT.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(BTreeMap::from([
            (K8S_MANAGED_BY.to_string(), PART_OF_CLUSTERWARD.to_string()),
            (K8S_PART_OF.to_string(), PART_OF_CLUSTERWARD.to_string()),
        ])),
        ..Default::default()
    }
}

/// Service account install and imageset pods run as.
#[must_use]
pub fn build_installer_service_account(namespace: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: installer_meta(namespace),
        ..Default::default()
    }
}

/// Role letting install pods publish their results.
#[must_use]
pub fn build_installer_role(namespace: &str) -> Role {
    let verbs = |v: &[&str]| v.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
    Role {
        metadata: installer_meta(namespace),
        rules: Some(vec![
            PolicyRule {
                api_groups: Some(vec![String::new()]),
                resources: Some(verbs(&["secrets", "configmaps", "pods", "pods/log"])),
                verbs: verbs(&["get", "list", "watch", "create", "update", "patch"]),
                ..Default::default()
            },
            PolicyRule {
                api_groups: Some(vec![API_GROUP.to_string()]),
                resources: Some(verbs(&[
                    "clusterdeployments",
                    "clusterdeployments/status",
                ])),
                verbs: verbs(&["get", "update", "patch"]),
                ..Default::default()
            },
        ]),
    }
}

/// Binds [`build_installer_role`] to [`build_installer_service_account`].
#[must_use]
pub fn build_installer_role_binding(namespace: &str) -> RoleBinding {
    RoleBinding {
        metadata: installer_meta(namespace),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: INSTALLER_SERVICE_ACCOUNT.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: INSTALLER_SERVICE_ACCOUNT.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

// ============================================================================
// Managed DNS and deprovisioning
// ============================================================================

/// Managed zone for the base domain of `cd`, owned by `cd`.
///
/// User tags become additional zone tags, ordered by key.
#[must_use]
pub fn build_dns_zone(
    cd: &ClusterDeployment,
    aws: &AwsPlatform,
    secrets: &AwsPlatformSecrets,
) -> DNSZone {
    // BTreeMap iteration keeps the tags ordered by key
    let additional_tags = aws
        .user_tags
        .iter()
        .map(|(key, value)| AwsResourceTag {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();

    let mut zone = DNSZone::new(
        &dns_zone_name(&cd.name_any()),
        DNSZoneSpec {
            zone: cd.spec.base_domain.clone(),
            link_to_parent_domain: true,
            aws: Some(AwsDnsZoneSpec {
                account_secret: secrets.credentials.clone(),
                region: aws.region.clone(),
                additional_tags,
            }),
        },
    );
    zone.metadata.namespace = cd.namespace();
    set_controller_reference(&mut zone.metadata, cd);
    zone
}

/// Request to destroy the cloud resources recorded in the status of `cd`.
#[must_use]
pub fn build_deprovision_request(cd: &ClusterDeployment) -> ClusterDeprovisionRequest {
    let status = cd.status.clone().unwrap_or_default();
    let aws = AwsClusterDeprovisionRequest {
        region: cd
            .spec
            .platform
            .aws
            .as_ref()
            .map(|aws| aws.region.clone())
            .unwrap_or_default(),
        credentials: cd
            .spec
            .platform_secrets
            .aws
            .as_ref()
            .map(|secrets| secrets.credentials.clone()),
    };

    let mut request = ClusterDeprovisionRequest::new(
        &cd.name_any(),
        ClusterDeprovisionRequestSpec {
            infra_id: status.infra_id.unwrap_or_default(),
            cluster_id: status.cluster_id.unwrap_or_default(),
            platform: ClusterDeprovisionRequestPlatform { aws: Some(aws) },
        },
    );
    request.metadata.namespace = cd.namespace();
    set_controller_reference(&mut request.metadata, cd);
    request
}

#[cfg(test)]
#[path = "install_resources_tests.rs"]
mod install_resources_tests;

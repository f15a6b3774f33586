// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for `ClusterDeployment` reconciliation tests.

use crate::config::OperatorConfig;
use crate::constants::{
    ADMIN_KUBECONFIG_KEY, PULL_SECRET_KEY, SSH_PUBLIC_KEY_SECRET_KEY,
};
use crate::context::Context;
use crate::crd::{
    AwsPlatform, AwsPlatformSecrets, ClusterDeployment, ClusterDeploymentSpec,
    ClusterDeploymentStatus, ClusterIngress, Platform, PlatformSecrets, SecretReference,
};
use crate::errors::RemoteError;
use crate::labels::FINALIZER_DEPROVISION;
use crate::metrics::RecordingMetrics;
use crate::reconcilers::backoff::ErrorBackoff;
use crate::remote::{RemoteCluster, RemoteClusterFactory};
use crate::store::{MemoryStore, ObjectKey};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_NAMESPACE: &str = "default";
pub const TEST_NAME: &str = "foo-lqmsh";
pub const TEST_CLUSTER_NAME: &str = "bar";
pub const TEST_INFRA_ID: &str = "testFooInfraID";
pub const TEST_CLUSTER_ID: &str = "testFooClusterUUID";
pub const TEST_INSTALLER_IMAGE: &str = "installer-image:latest";
pub const TEST_RELEASE_IMAGE: &str = "test-release-image:latest";
pub const TEST_IMAGE_SET: &str = "test-image-set";
pub const TEST_SSH_KEY_SECRET: &str = "ssh-key";
pub const TEST_PULL_SECRET: &str = "pull-secret";
pub const TEST_API_URL: &str = "https://bar-api.clusters.example.com:6443";
pub const TEST_CONSOLE_HOST: &str = "bar-api.clusters.example.com:6443/console";
pub const TEST_TERMINATING_REQUEUE: Duration = Duration::from_secs(10);

pub const ADMIN_KUBECONFIG: &str = r"apiVersion: v1
kind: Config
clusters:
- cluster:
    certificate-authority-data: JUNK
    server: https://bar-api.clusters.example.com:6443
  name: bar
contexts:
- context:
    cluster: bar
    user: admin
  name: admin
users:
- name: admin
  user:
    token: secret
";

/// Remote cluster factory answering every route lookup with a fixed host.
#[derive(Default)]
pub struct FakeRemoteFactory {
    pub builds: AtomicUsize,
    pub fail: bool,
}

impl FakeRemoteFactory {
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

struct FakeRemoteCluster;

#[async_trait]
impl RemoteCluster for FakeRemoteCluster {
    async fn route_host(&self, _namespace: &str, _name: &str) -> Result<String, RemoteError> {
        Ok(TEST_CONSOLE_HOST.to_string())
    }
}

#[async_trait]
impl RemoteClusterFactory for FakeRemoteFactory {
    async fn build(&self, _kubeconfig: &[u8]) -> Result<Box<dyn RemoteCluster>, RemoteError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RemoteError::Kubeconfig("remote unreachable".to_string()));
        }
        Ok(Box::new(FakeRemoteCluster))
    }
}

/// Handles to the collaborators of a test context.
pub struct Harness {
    pub ctx: Context<MemoryStore>,
    pub metrics: Arc<RecordingMetrics>,
    pub remote: Arc<FakeRemoteFactory>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_remote(FakeRemoteFactory::default())
    }

    pub fn with_remote(remote: FakeRemoteFactory) -> Self {
        let metrics = Arc::new(RecordingMetrics::new());
        let remote = Arc::new(remote);
        let config = OperatorConfig {
            terminating_requeue: TEST_TERMINATING_REQUEUE,
            ..Default::default()
        };
        let ctx = Context::new(MemoryStore::new(), config, metrics.clone())
            .with_remote(remote.clone())
            .with_backoff(ErrorBackoff::without_jitter(
                Duration::from_secs(1),
                Duration::from_secs(8),
            ));
        Self {
            ctx,
            metrics,
            remote,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.ctx.store
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::namespaced(TEST_NAMESPACE, TEST_NAME)
    }

    /// Seed the ssh key and pull secrets the install job needs.
    pub fn seed_secrets(&self) {
        self.store()
            .insert(&secret(TEST_SSH_KEY_SECRET, SSH_PUBLIC_KEY_SECRET_KEY, "ssh-rsa AAAA"))
            .unwrap();
        self.store()
            .insert(&secret(TEST_PULL_SECRET, PULL_SECRET_KEY, "{\"auths\":{}}"))
            .unwrap();
    }

    pub fn seed(&self, cd: &ClusterDeployment) -> ClusterDeployment {
        self.seed_secrets();
        self.store().insert(cd).unwrap()
    }
}

pub fn secret(name: &str, key: &str, value: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            key.to_string(),
            ByteString(value.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

pub fn admin_kubeconfig_secret() -> Secret {
    secret(
        &format!("{TEST_NAME}-admin-kubeconfig"),
        ADMIN_KUBECONFIG_KEY,
        ADMIN_KUBECONFIG,
    )
}

/// A deployment with the deprovision finalizer and a resolved installer image.
pub fn test_cluster_deployment() -> ClusterDeployment {
    let mut cd = ClusterDeployment::new(
        TEST_NAME,
        ClusterDeploymentSpec {
            cluster_name: TEST_CLUSTER_NAME.into(),
            base_domain: "clusters.example.com".into(),
            ingress: vec![ClusterIngress {
                name: "default".into(),
                domain: "apps.bar.clusters.example.com".into(),
            }],
            ssh_key: Some(SecretReference {
                name: TEST_SSH_KEY_SECRET.into(),
            }),
            pull_secret: SecretReference {
                name: TEST_PULL_SECRET.into(),
            },
            platform: Platform {
                aws: Some(AwsPlatform {
                    region: "us-east-1".into(),
                    user_tags: BTreeMap::new(),
                }),
            },
            platform_secrets: PlatformSecrets {
                aws: Some(AwsPlatformSecrets {
                    credentials: SecretReference {
                        name: "aws-credentials".into(),
                    },
                }),
            },
            ..Default::default()
        },
    );
    cd.metadata.namespace = Some(TEST_NAMESPACE.into());
    cd.metadata.uid = Some("1234".into());
    cd.metadata.finalizers = Some(vec![FINALIZER_DEPROVISION.to_string()]);
    cd.status = Some(ClusterDeploymentStatus {
        installer_image: Some(TEST_INSTALLER_IMAGE.into()),
        infra_id: Some(TEST_INFRA_ID.into()),
        cluster_id: Some(TEST_CLUSTER_ID.into()),
        ..Default::default()
    });
    cd
}

pub fn without_finalizer(mut cd: ClusterDeployment) -> ClusterDeployment {
    cd.metadata.finalizers = None;
    cd
}

pub fn installed(mut cd: ClusterDeployment) -> ClusterDeployment {
    let status = cd.status.get_or_insert_with(Default::default);
    status.installed = true;
    cd
}

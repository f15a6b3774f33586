// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `install.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::reconcilers::clusterdeployment::fixtures::*;
    use crate::reconcilers::clusterdeployment::types::*;
    use crate::store::memory::Verb;
    use k8s_openapi::api::core::v1::{ContainerStatus, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    const HASH: &str = "0f1e2d";

    fn job_with(annotations: &[(&str, &str)]) -> Job {
        Job {
            metadata: ObjectMeta {
                name: Some("foo-lqmsh-install".into()),
                annotations: Some(
                    annotations
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn pod(restarts: &[i32]) -> Pod {
        Pod {
            status: Some(PodStatus {
                container_statuses: Some(
                    restarts
                        .iter()
                        .map(|r| ContainerStatus {
                            restart_count: *r,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_hash_is_kept() {
        let job = job_with(&[(JOB_HASH_ANNOTATION, HASH), (CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION, "2")]);
        assert_eq!(decide_existing_install_job(&job, HASH, 2), ExistingJobAction::Keep);
    }

    #[test]
    fn test_missing_hash_forces_recreate() {
        let job = job_with(&[(CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION, "2")]);
        assert_eq!(
            decide_existing_install_job(&job, HASH, 2),
            ExistingJobAction::DeleteOnHashChange
        );
        let bare = Job::default();
        assert_eq!(
            decide_existing_install_job(&bare, HASH, 2),
            ExistingJobAction::DeleteOnHashChange
        );
    }

    #[test]
    fn test_changed_hash_forces_recreate() {
        let job = job_with(&[(JOB_HASH_ANNOTATION, "stale")]);
        assert_eq!(
            decide_existing_install_job(&job, HASH, 1),
            ExistingJobAction::DeleteOnHashChange
        );
    }

    #[test]
    fn test_older_generation_wins_over_hash() {
        let job = job_with(&[(JOB_HASH_ANNOTATION, HASH), (CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION, "1")]);
        assert_eq!(
            decide_existing_install_job(&job, HASH, 2),
            ExistingJobAction::DeleteOutdatedGeneration
        );
        // Unparseable generations count as zero
        let job = job_with(&[(JOB_HASH_ANNOTATION, HASH), (CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION, "x")]);
        assert_eq!(
            decide_existing_install_job(&job, HASH, 1),
            ExistingJobAction::DeleteOutdatedGeneration
        );
    }

    #[test]
    fn test_config_map_outdated() {
        let mut config_map = ConfigMap::default();
        assert!(!config_map_outdated(&config_map, 3));

        config_map.metadata.annotations = Some(BTreeMap::from([(
            CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION.to_string(),
            "2".to_string(),
        )]));
        assert!(config_map_outdated(&config_map, 3));
        assert!(!config_map_outdated(&config_map, 2));
    }

    #[test]
    fn test_sum_container_restarts() {
        assert_eq!(sum_container_restarts(&[]), 0);
        assert_eq!(sum_container_restarts(&[pod(&[1, 2]), pod(&[3]), Pod::default()]), 6);
    }

    #[tokio::test]
    async fn test_ensure_installer_rbac_is_idempotent() {
        let harness = Harness::new();
        ensure_installer_rbac(&harness.ctx, TEST_NAMESPACE).await.unwrap();
        ensure_installer_rbac(&harness.ctx, TEST_NAMESPACE).await.unwrap();

        assert_eq!(harness.store().writes_of(Verb::Create, "ServiceAccount").len(), 1);
        assert_eq!(harness.store().writes_of(Verb::Create, "Role").len(), 1);
        assert_eq!(harness.store().writes_of(Verb::Create, "RoleBinding").len(), 1);
    }

    #[tokio::test]
    async fn test_load_secret_data() {
        let harness = Harness::new();
        harness.seed_secrets();

        let key = load_secret_data(harness.store(), TEST_NAMESPACE, TEST_SSH_KEY_SECRET, "ssh-publickey")
            .await
            .unwrap();
        assert_eq!(key, "ssh-rsa AAAA");

        let missing_key = load_secret_data(harness.store(), TEST_NAMESPACE, TEST_SSH_KEY_SECRET, "other")
            .await
            .unwrap_err();
        assert!(matches!(missing_key, ReconcileError::Config(_)));

        let missing_secret = load_secret_data(harness.store(), TEST_NAMESPACE, "nope", "ssh-publickey")
            .await
            .unwrap_err();
        assert!(matches!(missing_secret, ReconcileError::Store(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_restart_list_failure_is_not_fatal() {
        let harness = Harness::new();
        let cd = harness.seed(&test_cluster_deployment());
        let inputs = InstallInputs {
            installer_image: TEST_INSTALLER_IMAGE,
            operator_image: "operator:latest",
            release_image: "",
            ssh_key: "ssh-rsa AAAA",
        };

        let mut desired = cd.clone();
        assert_eq!(sync_install_job(&harness.ctx, &mut desired, None, inputs).await.unwrap(), None);
        let job: Job = harness
            .store()
            .get(&ObjectKey::namespaced(TEST_NAMESPACE, "foo-lqmsh-install"))
            .await
            .unwrap()
            .unwrap();

        harness.store().fail(Verb::List, "Pod");
        let mut desired = cd.clone();
        let outcome = sync_install_job(&harness.ctx, &mut desired, Some(&job), inputs)
            .await
            .unwrap();
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn test_outdated_config_map_is_rewritten() {
        let harness = Harness::new();
        let cd = harness.seed(&test_cluster_deployment());
        let inputs = InstallInputs {
            installer_image: TEST_INSTALLER_IMAGE,
            operator_image: "operator:latest",
            release_image: "",
            ssh_key: "ssh-rsa AAAA",
        };
        let mut desired = cd.clone();
        sync_install_job(&harness.ctx, &mut desired, None, inputs).await.unwrap();

        let config_map_key = ObjectKey::namespaced(TEST_NAMESPACE, "foo-lqmsh-install-config");
        let mut config_map: ConfigMap = harness.store().get(&config_map_key).await.unwrap().unwrap();
        config_map.annotations_mut().insert(
            CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION.to_string(),
            "0".to_string(),
        );
        config_map.data = Some(BTreeMap::from([("stale".to_string(), "yes".to_string())]));
        harness.store().update(&config_map).await.unwrap();

        let job: Job = harness
            .store()
            .get(&ObjectKey::namespaced(TEST_NAMESPACE, "foo-lqmsh-install"))
            .await
            .unwrap()
            .unwrap();
        let mut desired = cd.clone();
        let outcome = sync_install_job(&harness.ctx, &mut desired, Some(&job), inputs)
            .await
            .unwrap();
        assert_eq!(outcome, Some(ReconcileOutcome::Done));

        let rewritten: ConfigMap = harness.store().get(&config_map_key).await.unwrap().unwrap();
        assert_eq!(
            rewritten.annotations().get(CLUSTER_DEPLOYMENT_GENERATION_ANNOTATION).map(String::as_str),
            Some("1")
        );
        assert!(rewritten.data.unwrap().contains_key("install-config.yaml"));
        // The job was current and stays
        assert!(harness.store().writes_of(Verb::Delete, "Job").is_empty());
    }
}

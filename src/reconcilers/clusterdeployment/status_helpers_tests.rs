// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status_helpers.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::{ADMIN_KUBECONFIG_KEY, RAW_ADMIN_KUBECONFIG_KEY};
    use crate::reconcilers::clusterdeployment::fixtures::*;
    use crate::reconcilers::clusterdeployment::types::*;
    use crate::store::memory::Verb;
    use k8s_openapi::api::batch::v1::{JobCondition, JobStatus};

    fn job_with(succeeded: Option<i32>, condition: Option<(&str, &str)>) -> Job {
        Job {
            status: Some(JobStatus {
                succeeded,
                conditions: condition.map(|(type_, status)| {
                    vec![JobCondition {
                        type_: type_.to_string(),
                        status: status.to_string(),
                        ..Default::default()
                    }]
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn kubeconfig_data(raw: &str) -> BTreeMap<String, ByteString> {
        BTreeMap::from([(
            ADMIN_KUBECONFIG_KEY.to_string(),
            ByteString(raw.as_bytes().to_vec()),
        )])
    }

    #[test]
    fn test_job_succeeded_and_finished() {
        assert!(!job_succeeded(&Job::default()));
        assert!(!job_finished(&Job::default()));
        assert!(job_succeeded(&job_with(Some(1), None)));
        assert!(!job_finished(&job_with(Some(1), None)));
        assert!(job_succeeded(&job_with(None, Some(("Complete", "True")))));
        assert!(job_finished(&job_with(None, Some(("Complete", "True")))));
        assert!(!job_succeeded(&job_with(Some(0), Some(("Failed", "True")))));
        assert!(job_finished(&job_with(Some(0), Some(("Failed", "True")))));
        assert!(!job_finished(&job_with(None, Some(("Complete", "False")))));
    }

    #[test]
    fn test_admin_kubeconfig_secret_name() {
        assert_eq!(
            admin_kubeconfig_secret_name(TEST_NAME),
            "foo-lqmsh-admin-kubeconfig"
        );
    }

    #[test]
    fn test_fixup_preserves_raw_copy() {
        let data = kubeconfig_data(ADMIN_KUBECONFIG);
        let fixed = fixup_admin_kubeconfig_data(&data).unwrap().unwrap();

        assert_eq!(fixed[RAW_ADMIN_KUBECONFIG_KEY].0, ADMIN_KUBECONFIG.as_bytes());
        let kubeconfig = String::from_utf8(fixed[ADMIN_KUBECONFIG_KEY].0.clone()).unwrap();
        assert!(kubeconfig.contains("current-context: admin"));

        // A second pass over fixed data changes nothing
        assert!(fixup_admin_kubeconfig_data(&fixed).unwrap().is_none());
    }

    #[test]
    fn test_fixup_rebuilds_from_raw_copy() {
        let mut data = kubeconfig_data("apiVersion: v1\nkind: Config\n");
        data.insert(
            RAW_ADMIN_KUBECONFIG_KEY.to_string(),
            ByteString(ADMIN_KUBECONFIG.as_bytes().to_vec()),
        );
        let fixed = fixup_admin_kubeconfig_data(&data).unwrap().unwrap();
        let kubeconfig = String::from_utf8(fixed[ADMIN_KUBECONFIG_KEY].0.clone()).unwrap();
        assert!(kubeconfig.contains("bar-api.clusters.example.com"));
    }

    #[test]
    fn test_fixup_without_kubeconfig_fails() {
        let err = fixup_admin_kubeconfig_data(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ReconcileError::Kubeconfig(_)));
    }

    #[tokio::test]
    async fn test_successful_job_marks_installed_and_fills_urls() {
        let harness = Harness::new();
        let observed = harness.seed(&test_cluster_deployment());
        harness.store().insert(&admin_kubeconfig_secret()).unwrap();

        let mut desired = observed.clone();
        let job = job_with(Some(1), None);
        converge_status(&harness.ctx, &mut desired, &observed, Some(&job))
            .await
            .unwrap();

        let stored: ClusterDeployment = harness.store().get(&harness.key()).await.unwrap().unwrap();
        let status = stored.status.unwrap();
        assert!(status.installed);
        assert_eq!(
            status.admin_kubeconfig_secret.unwrap().name,
            "foo-lqmsh-admin-kubeconfig"
        );
        assert_eq!(status.api_url.as_deref(), Some(TEST_API_URL));
        assert_eq!(
            status.web_console_url,
            Some(format!("https://{TEST_CONSOLE_HOST}"))
        );
        assert_eq!(harness.store().writes_of(Verb::Update, "Secret").len(), 1);
        assert_eq!(harness.remote.build_count(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_written() {
        let harness = Harness::new();
        let mut cd = installed(test_cluster_deployment());
        let status = cd.status.as_mut().unwrap();
        status.admin_kubeconfig_secret = Some(SecretReference {
            name: admin_kubeconfig_secret_name(TEST_NAME),
        });
        status.api_url = Some(TEST_API_URL.into());
        status.web_console_url = Some(format!("https://{TEST_CONSOLE_HOST}"));
        let observed = harness.seed(&cd);
        let fixed = fixup_admin_kubeconfig_data(&admin_kubeconfig_secret().data.unwrap())
            .unwrap()
            .unwrap();
        let mut secret = admin_kubeconfig_secret();
        secret.data = Some(fixed);
        harness.store().insert(&secret).unwrap();

        let mut desired = observed.clone();
        converge_status(&harness.ctx, &mut desired, &observed, None)
            .await
            .unwrap();

        assert!(harness.store().writes().is_empty());
        assert_eq!(harness.remote.build_count(), 0);
    }

    #[tokio::test]
    async fn test_installed_never_reverts() {
        let harness = Harness::new();
        let observed = harness.seed(&installed(test_cluster_deployment()));

        let mut desired = observed.clone();
        let failed = job_with(Some(0), Some(("Failed", "True")));
        converge_status(&harness.ctx, &mut desired, &observed, Some(&failed))
            .await
            .unwrap();

        assert!(desired.status.unwrap().installed);
    }

    #[tokio::test]
    async fn test_missing_admin_secret_is_skipped() {
        let harness = Harness::new();
        let observed = harness.seed(&test_cluster_deployment());

        let mut desired = observed.clone();
        converge_status(&harness.ctx, &mut desired, &observed, Some(&job_with(Some(1), None)))
            .await
            .unwrap();

        let status = desired.status.unwrap();
        assert!(status.installed);
        assert!(status.api_url.is_none());
        assert_eq!(harness.remote.build_count(), 0);
        assert_eq!(
            harness.store().writes_of(Verb::UpdateStatus, "ClusterDeployment").len(),
            1
        );
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_an_error() {
        let harness = Harness::with_remote(FakeRemoteFactory {
            fail: true,
            ..Default::default()
        });
        let observed = harness.seed(&installed(test_cluster_deployment()));
        harness.store().insert(&admin_kubeconfig_secret()).unwrap();

        let mut desired = observed.clone();
        let err = converge_status(&harness.ctx, &mut desired, &observed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Remote(_)));
        assert!(harness
            .store()
            .writes_of(Verb::UpdateStatus, "ClusterDeployment")
            .is_empty());
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dns.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{DNSZoneSpec, DNSZoneStatus};
    use crate::reconcilers::clusterdeployment::fixtures::*;
    use crate::reconcilers::clusterdeployment::types::*;
    use crate::reconcilers::status::create_condition;
    use crate::store::memory::Verb;

    fn zone(available: Option<&str>) -> DNSZone {
        let mut zone = DNSZone::new("foo-lqmsh-zone", DNSZoneSpec::default());
        zone.status = available.map(|status| DNSZoneStatus {
            conditions: vec![create_condition("Available", status, "ZoneReady", "zone")],
        });
        zone
    }

    #[test]
    fn test_decide_managed_zone() {
        assert_eq!(decide_managed_zone(None), ZoneGate::Create);
        assert_eq!(decide_managed_zone(Some(&zone(None))), ZoneGate::Waiting);
        assert_eq!(decide_managed_zone(Some(&zone(Some("False")))), ZoneGate::Waiting);
        assert_eq!(decide_managed_zone(Some(&zone(Some("True")))), ZoneGate::Available);
    }

    #[tokio::test]
    async fn test_zone_is_created_then_waited_on() {
        let harness = Harness::new();
        let mut cd = test_cluster_deployment();
        cd.spec.manage_dns = true;
        cd.spec.platform.aws.as_mut().unwrap().user_tags = BTreeMap::from([
            ("owner".to_string(), "team-b".to_string()),
            ("env".to_string(), "dev".to_string()),
        ]);
        let cd = harness.seed(&cd);

        assert!(!ensure_managed_dns_zone(&harness.ctx, &cd).await.unwrap());
        let created: DNSZone = harness
            .store()
            .get(&ObjectKey::namespaced(TEST_NAMESPACE, "foo-lqmsh-zone"))
            .await
            .unwrap()
            .unwrap();
        let aws = created.spec.aws.unwrap();
        assert_eq!(created.spec.zone, "clusters.example.com");
        assert!(created.spec.link_to_parent_domain);
        assert_eq!(aws.region, "us-east-1");
        assert_eq!(aws.account_secret.name, "aws-credentials");
        let keys: Vec<&str> = aws.additional_tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["env", "owner"]);

        assert!(!ensure_managed_dns_zone(&harness.ctx, &cd).await.unwrap());
        assert_eq!(harness.store().writes_of(Verb::Create, "DNSZone").len(), 1);
    }

    #[tokio::test]
    async fn test_non_aws_platform_is_rejected() {
        let harness = Harness::new();
        let mut cd = test_cluster_deployment();
        cd.spec.manage_dns = true;
        cd.spec.platform_secrets.aws = None;
        let cd = harness.seed(&cd);

        let err = ensure_managed_dns_zone(&harness.ctx, &cd).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Config(ref m) if m == "only AWS managed DNS is supported"));
        assert_eq!(harness.store().count("DNSZone"), 0);
    }
}

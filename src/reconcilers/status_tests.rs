// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::Condition;
    use crate::reconcilers::status::{
        clear_condition, create_condition, find_condition, is_condition_true, set_condition,
        UpdateConditionPolicy,
    };

    const CONDITION_TYPE: &str = "ClusterImageSetNotFound";
    const STATUS_TRUE: &str = "True";
    const STATUS_FALSE: &str = "False";
    const REASON_NOT_FOUND: &str = "ClusterImageSetNotFound";
    const MESSAGE_NOT_FOUND: &str = "ClusterImageSet openshift-v4.2 is not available";

    fn stale(status: &str) -> Condition {
        Condition {
            r#type: CONDITION_TYPE.to_string(),
            status: status.to_string(),
            reason: Some(REASON_NOT_FOUND.to_string()),
            message: Some(MESSAGE_NOT_FOUND.to_string()),
            last_probe_time: Some("2020-01-01T00:00:00+00:00".to_string()),
            last_transition_time: Some("2020-01-01T00:00:00+00:00".to_string()),
        }
    }

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(CONDITION_TYPE, STATUS_TRUE, REASON_NOT_FOUND, MESSAGE_NOT_FOUND);

        assert_eq!(condition.r#type, CONDITION_TYPE);
        assert_eq!(condition.status, STATUS_TRUE);
        assert_eq!(condition.reason.as_deref(), Some(REASON_NOT_FOUND));
        assert_eq!(condition.message.as_deref(), Some(MESSAGE_NOT_FOUND));
        assert!(condition.last_probe_time.is_some());
        assert_eq!(condition.last_probe_time, condition.last_transition_time);
    }

    #[test]
    fn test_find_condition() {
        let conditions = vec![stale(STATUS_TRUE)];
        assert!(find_condition(&conditions, CONDITION_TYPE).is_some());
        assert!(find_condition(&conditions, "Available").is_none());
        assert!(is_condition_true(&conditions, CONDITION_TYPE));
        assert!(!is_condition_true(&[stale(STATUS_FALSE)], CONDITION_TYPE));
    }

    #[test]
    fn test_absent_true_condition_is_added() {
        let mut conditions = Vec::new();
        let changed = set_condition(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_TRUE,
            REASON_NOT_FOUND,
            MESSAGE_NOT_FOUND,
            UpdateConditionPolicy::Never,
        );
        assert!(changed);
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_absent_false_condition_is_not_added() {
        let mut conditions = Vec::new();
        let changed = set_condition(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_FALSE,
            "ClusterImageSetFound",
            "found",
            UpdateConditionPolicy::Always,
        );
        assert!(!changed);
        assert!(conditions.is_empty());
    }

    #[test]
    fn test_status_flip_updates_transition_time() {
        let mut conditions = vec![stale(STATUS_TRUE)];
        let changed = set_condition(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_FALSE,
            "ClusterImageSetFound",
            "found",
            UpdateConditionPolicy::Never,
        );
        assert!(changed);
        assert_eq!(conditions[0].status, STATUS_FALSE);
        assert_eq!(conditions[0].reason.as_deref(), Some("ClusterImageSetFound"));
        assert_ne!(
            conditions[0].last_transition_time,
            stale(STATUS_TRUE).last_transition_time
        );
    }

    #[test]
    fn test_never_policy_keeps_same_status() {
        let mut conditions = vec![stale(STATUS_TRUE)];
        let changed = set_condition(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_TRUE,
            "OtherReason",
            "other message",
            UpdateConditionPolicy::Never,
        );
        assert!(!changed);
        assert_eq!(conditions[0], stale(STATUS_TRUE));
    }

    #[test]
    fn test_if_reason_or_message_change_policy() {
        let mut conditions = vec![stale(STATUS_TRUE)];
        assert!(!set_condition(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_TRUE,
            REASON_NOT_FOUND,
            MESSAGE_NOT_FOUND,
            UpdateConditionPolicy::IfReasonOrMessageChange,
        ));

        assert!(set_condition(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_TRUE,
            REASON_NOT_FOUND,
            "new message",
            UpdateConditionPolicy::IfReasonOrMessageChange,
        ));
        assert_eq!(conditions[0].message.as_deref(), Some("new message"));
        // Same status keeps the transition time
        assert_eq!(
            conditions[0].last_transition_time,
            stale(STATUS_TRUE).last_transition_time
        );
    }

    #[test]
    fn test_always_policy_refreshes_probe_time() {
        let mut conditions = vec![stale(STATUS_TRUE)];
        assert!(set_condition(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_TRUE,
            REASON_NOT_FOUND,
            MESSAGE_NOT_FOUND,
            UpdateConditionPolicy::Always,
        ));
        assert_ne!(conditions[0].last_probe_time, stale(STATUS_TRUE).last_probe_time);
    }

    #[test]
    fn test_clear_condition() {
        let mut conditions = vec![stale(STATUS_TRUE)];
        assert!(clear_condition(&mut conditions, CONDITION_TYPE, "ClusterImageSetFound", "found"));
        assert_eq!(conditions[0].status, STATUS_FALSE);

        assert!(!clear_condition(&mut conditions, CONDITION_TYPE, "ClusterImageSetFound", "found"));

        let mut empty = Vec::new();
        assert!(!clear_condition(&mut empty, CONDITION_TYPE, "ClusterImageSetFound", "found"));
    }
}

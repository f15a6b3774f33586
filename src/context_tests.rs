// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for context.rs

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::OperatorConfig;
    use crate::metrics::RecordingMetrics;
    use crate::store::MemoryStore;
    use std::time::Duration;

    #[test]
    fn test_images_come_from_config() {
        let config = OperatorConfig {
            operator_image: "operator:test".into(),
            cli_image: "cli:test".into(),
            ..Default::default()
        };
        let ctx = Context::new(MemoryStore::new(), config, Arc::new(RecordingMetrics::new()));

        assert_eq!(ctx.images().default_operator_image(), "operator:test");
        assert_eq!(ctx.images().default_cli_image(), "cli:test");
    }

    #[test]
    fn test_backoff_follows_config() {
        let config = OperatorConfig {
            error_backoff_base: Duration::from_secs(2),
            error_backoff_max: Duration::from_secs(8),
            ..Default::default()
        };
        let ctx = Context::new(MemoryStore::new(), config, Arc::new(RecordingMetrics::new()));

        assert_eq!(ctx.backoff.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(ctx.backoff.delay_for_attempt(10), Duration::from_secs(8));
    }

    #[test]
    fn test_with_backoff_replaces_backoff() {
        let ctx = Context::new(
            MemoryStore::new(),
            OperatorConfig::default(),
            Arc::new(RecordingMetrics::new()),
        )
        .with_backoff(ErrorBackoff::without_jitter(
            Duration::from_secs(1),
            Duration::from_secs(4),
        ));
        assert_eq!(ctx.backoff.next_delay("default/foo"), Duration::from_secs(1));
        assert_eq!(ctx.backoff.next_delay("default/foo"), Duration::from_secs(2));
    }
}

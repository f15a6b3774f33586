// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::{Cli, ImageDefaults, OperatorConfig};
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn test_default_config_values() {
        let config = OperatorConfig::default();

        assert_eq!(config.concurrency, 5);
        assert_eq!(config.metrics_addr, "0.0.0.0:8080");
        assert_eq!(config.terminating_requeue, Duration::from_secs(10));
        assert_eq!(config.expiry_grace, Duration::from_secs(60));
        assert_eq!(config.error_backoff_base, Duration::from_secs(5));
        assert_eq!(config.error_backoff_max, Duration::from_secs(300));
        assert_eq!(config.controller_name, "clusterdeployment");
    }

    #[test]
    fn test_cli_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "clusterward",
            "--concurrency",
            "12",
            "--operator-image",
            "registry.example.com/operator:v2",
            "--cli-image",
            "registry.example.com/cli:v2",
            "--terminating-requeue-secs",
            "3",
            "--expiry-grace-secs",
            "30",
        ])
        .expect("flags should parse");

        let config = OperatorConfig::from(cli);
        assert_eq!(config.concurrency, 12);
        assert_eq!(config.default_operator_image(), "registry.example.com/operator:v2");
        assert_eq!(config.default_cli_image(), "registry.example.com/cli:v2");
        assert_eq!(config.terminating_requeue, Duration::from_secs(3));
        assert_eq!(config.expiry_grace, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let cli = Cli::try_parse_from(["clusterward", "--concurrency", "0"])
            .expect("flags should parse");
        assert_eq!(OperatorConfig::from(cli).concurrency, 1);
    }

    #[test]
    fn test_backoff_max_never_below_base() {
        let cli = Cli::try_parse_from([
            "clusterward",
            "--error-backoff-base",
            "60",
            "--error-backoff-max",
            "10",
        ])
        .expect("flags should parse");

        let config = OperatorConfig::from(cli);
        assert_eq!(config.error_backoff_max, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["clusterward", "--no-such-flag"]).is_err());
    }
}

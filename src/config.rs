// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Settings come from command-line flags with environment variable fallbacks
//! (see [`Cli`]) and are turned into an [`OperatorConfig`] shared by all reconcilers.
//!
//! # Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use clusterward::config::{Cli, OperatorConfig};
//!
//! let cli = Cli::parse();
//! let config = OperatorConfig::from(cli);
//! println!("running {} workers", config.concurrency);
//! ```

use crate::constants::{
    CLUSTER_DEPLOYMENT_CONTROLLER, DEFAULT_CLI_IMAGE, DEFAULT_CONCURRENCY,
    DEFAULT_ERROR_BACKOFF_BASE_SECS, DEFAULT_ERROR_BACKOFF_MAX_SECS, DEFAULT_EXPIRY_GRACE_SECS,
    DEFAULT_METRICS_ADDR, DEFAULT_OPERATOR_IMAGE, DEFAULT_TERMINATING_REQUEUE_SECS,
};
use clap::Parser;
use std::time::Duration;

/// Supplies the images used when neither a `ClusterDeployment` nor its image set names one.
pub trait ImageDefaults: Send + Sync {
    /// Image running the install manager inside install jobs
    fn default_operator_image(&self) -> String;

    /// Image running the installer image resolution job
    fn default_cli_image(&self) -> String;
}

/// Command-line interface of the operator binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "clusterward", version, about = "ClusterDeployment lifecycle operator")]
pub struct Cli {
    /// Number of ClusterDeployments reconciled concurrently
    #[arg(long, env = "CLUSTERWARD_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: u16,

    /// Listen address of the /metrics and /healthz endpoints
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: String,

    /// Default image running the install manager
    #[arg(long, env = "OPERATOR_IMAGE", default_value = DEFAULT_OPERATOR_IMAGE)]
    pub operator_image: String,

    /// Image running the installer image resolution job
    #[arg(long, env = "CLI_IMAGE", default_value = DEFAULT_CLI_IMAGE)]
    pub cli_image: String,

    /// Seconds to wait before re-checking a child that is being deleted
    #[arg(long, env = "TERMINATING_REQUEUE_SECS", default_value_t = DEFAULT_TERMINATING_REQUEUE_SECS)]
    pub terminating_requeue_secs: u64,

    /// Seconds added past a deployment's expiry before it is re-checked
    #[arg(long, env = "EXPIRY_GRACE_SECS", default_value_t = DEFAULT_EXPIRY_GRACE_SECS)]
    pub expiry_grace_secs: u64,

    /// Initial delay in seconds after a failed reconciliation
    #[arg(long, env = "ERROR_BACKOFF_BASE_SECS", default_value_t = DEFAULT_ERROR_BACKOFF_BASE_SECS)]
    pub error_backoff_base: u64,

    /// Maximum delay in seconds after repeated failed reconciliations
    #[arg(long, env = "ERROR_BACKOFF_MAX_SECS", default_value_t = DEFAULT_ERROR_BACKOFF_MAX_SECS)]
    pub error_backoff_max: u64,

    /// Controller name reported in logs and request metrics
    #[arg(long, env = "CONTROLLER_NAME", default_value = CLUSTER_DEPLOYMENT_CONTROLLER)]
    pub controller_name: String,
}

/// Runtime configuration shared by the controller and its reconcilers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    pub concurrency: u16,
    pub metrics_addr: String,
    pub operator_image: String,
    pub cli_image: String,
    /// Delay used while a child object carries a deletion timestamp
    pub terminating_requeue: Duration,
    /// Grace added past the expiry instant for the expiry re-check
    pub expiry_grace: Duration,
    pub error_backoff_base: Duration,
    pub error_backoff_max: Duration,
    pub controller_name: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            metrics_addr: DEFAULT_METRICS_ADDR.to_string(),
            operator_image: DEFAULT_OPERATOR_IMAGE.to_string(),
            cli_image: DEFAULT_CLI_IMAGE.to_string(),
            terminating_requeue: Duration::from_secs(DEFAULT_TERMINATING_REQUEUE_SECS),
            expiry_grace: Duration::from_secs(DEFAULT_EXPIRY_GRACE_SECS),
            error_backoff_base: Duration::from_secs(DEFAULT_ERROR_BACKOFF_BASE_SECS),
            error_backoff_max: Duration::from_secs(DEFAULT_ERROR_BACKOFF_MAX_SECS),
            controller_name: CLUSTER_DEPLOYMENT_CONTROLLER.to_string(),
        }
    }
}

impl From<Cli> for OperatorConfig {
    fn from(cli: Cli) -> Self {
        Self {
            concurrency: cli.concurrency.max(1),
            metrics_addr: cli.metrics_addr,
            operator_image: cli.operator_image,
            cli_image: cli.cli_image,
            terminating_requeue: Duration::from_secs(cli.terminating_requeue_secs),
            expiry_grace: Duration::from_secs(cli.expiry_grace_secs),
            error_backoff_base: Duration::from_secs(cli.error_backoff_base),
            error_backoff_max: Duration::from_secs(cli.error_backoff_max.max(cli.error_backoff_base)),
            controller_name: cli.controller_name,
        }
    }
}

impl ImageDefaults for OperatorConfig {
    fn default_operator_image(&self) -> String {
        self.operator_image.clone()
    }

    fn default_cli_image(&self) -> String {
        self.cli_image.clone()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

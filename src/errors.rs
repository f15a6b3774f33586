// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for clusterward.
//!
//! This module provides the error taxonomy used by the reconcilers:
//! - [`StoreError`] - failures reading or writing objects through an [`crate::store::ObjectStore`]
//! - [`BuildError`] - failures generating install artifacts or hashing them
//! - [`RemoteError`] - failures talking to an installed cluster
//! - [`ReconcileError`] - the error returned by a reconciliation pass
//!
//! Locally recoverable states (a child being deleted, a missing optional object) are
//! never errors; they are expressed as requeues or no-ops by the reconcilers.

use thiserror::Error;

/// HTTP status code returned by the API server for a missing object
pub const HTTP_NOT_FOUND: u16 = 404;

/// HTTP status code returned by the API server for conflicting writes
pub const HTTP_CONFLICT: u16 = 409;

/// Reason reported by the API server when a created object already exists
const REASON_ALREADY_EXISTS: &str = "AlreadyExists";

/// Errors that can occur while reading or writing objects.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An object with the same name already exists
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        /// Kind of the object
        kind: String,
        /// `namespace/name` or `name` of the object
        key: String,
    },

    /// The write was based on a stale `resourceVersion`
    #[error("conflict writing {kind} {key}: the object has been modified")]
    Conflict {
        /// Kind of the object
        kind: String,
        /// `namespace/name` or `name` of the object
        key: String,
    },

    /// The object to update does not exist
    #[error("{kind} {key} not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// `namespace/name` or `name` of the object
        key: String,
    },

    /// The object cannot be stored as given (missing name, bad metadata)
    #[error("invalid {kind} object: {reason}")]
    Invalid {
        /// Kind of the object
        kind: String,
        /// What is wrong with it
        reason: String,
    },

    /// Any other failure returned by the API server or the client
    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),

    /// The object could not be converted to or from JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Translate a kube client error into a store error for `kind`/`key`.
    ///
    /// 404 becomes [`StoreError::NotFound`], 409 becomes [`StoreError::AlreadyExists`]
    /// or [`StoreError::Conflict`] depending on the reason reported by the API server.
    #[must_use]
    pub fn from_kube(err: kube::Error, kind: &str, key: &str) -> Self {
        match &err {
            kube::Error::Api(status) if status.code == HTTP_NOT_FOUND => Self::NotFound {
                kind: kind.to_string(),
                key: key.to_string(),
            },
            kube::Error::Api(status) if status.code == HTTP_CONFLICT => {
                if status.reason == REASON_ALREADY_EXISTS {
                    Self::AlreadyExists {
                        kind: kind.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    Self::Conflict {
                        kind: kind.to_string(),
                        key: key.to_string(),
                    }
                }
            }
            _ => Self::Api(err),
        }
    }

    /// Whether this error reports a missing object
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error reports a name collision on create
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Errors that can occur while generating install artifacts.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A value required to render the artifacts is missing
    #[error("missing {0} for install artifacts")]
    MissingInput(String),

    /// The job spec could not be serialized for hashing
    #[error("failed to serialize job spec: {0}")]
    Hash(#[source] serde_json::Error),

    /// The install config could not be rendered
    #[error("failed to render install config: {0}")]
    Render(#[from] serde_yaml::Error),
}

/// Errors that can occur while talking to an installed cluster.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The kubeconfig could not be turned into a client configuration
    #[error("invalid remote kubeconfig: {0}")]
    Kubeconfig(String),

    /// The remote API server returned an error
    #[error("remote cluster API error: {0}")]
    Api(#[from] kube::Error),

    /// The remote object exists but lacks the expected field
    #[error("remote {kind} {namespace}/{name} has no {field}")]
    MissingField {
        /// Kind of the remote object
        kind: String,
        /// Namespace of the remote object
        namespace: String,
        /// Name of the remote object
        name: String,
        /// Field that was expected
        field: String,
    },
}

/// Error returned by a reconciliation pass.
///
/// Every variant is retried by the controller's error policy with exponential backoff.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Reading or writing an object failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The `ClusterDeployment` or its referenced objects are misconfigured
    #[error("configuration error: {0}")]
    Config(String),

    /// Install artifacts could not be generated
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The installed cluster could not be queried
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The admin kubeconfig is invalid or cannot be fixed up
    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),
}

impl ReconcileError {
    /// Short label describing the error class, used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Config(_) => "config",
            Self::Build(_) => "build",
            Self::Remote(_) => "remote",
            Self::Kubeconfig(_) => "kubeconfig",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;

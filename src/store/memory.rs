// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`] with API server semantics.
//!
//! Objects are kept as JSON keyed by kind, namespace and name. The store mimics the
//! parts of the API server the reconcilers depend on:
//!
//! - every write bumps a global `resourceVersion`; stale writes fail with a conflict
//! - `update` never changes status, `update_status` only changes status
//! - deleting an object with finalizers, or with foreground propagation, only sets
//!   `deletionTimestamp`; clearing the last finalizer of such an object removes it
//! - [`MemoryStore::finish_terminating`] completes pending foreground deletions the way
//!   the garbage collector would
//!
//! Every successful write is appended to a log ([`MemoryStore::writes`]) so tests can
//! assert on side effects, and failures can be injected per verb and kind.

use super::{ObjectKey, ObjectStore, Propagation, StoreObject};
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Finalizer the API server adds to objects deleted with foreground propagation
pub const FOREGROUND_DELETION_FINALIZER: &str = "foregroundDeletion";

/// Kind of write recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verb {
    Create,
    Update,
    UpdateStatus,
    Delete,
    List,
}

/// A successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub verb: Verb,
    pub kind: String,
    pub key: ObjectKey,
}

type StoreKey = (String, Option<String>, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<StoreKey, Value>,
    resource_version: u64,
    writes: Vec<WriteRecord>,
    failures: BTreeSet<(Verb, String)>,
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// [`ObjectStore`] holding every object in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn store_key<K: StoreObject>(key: &ObjectKey) -> StoreKey {
    (K::kind(&()).to_string(), key.namespace.clone(), key.name.clone())
}

fn metadata_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get("metadata")?.get(field)?.as_str()
}

fn set_metadata(value: &mut Value, field: &str, field_value: Value) {
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert(field.to_string(), field_value);
    }
}

fn finalizers(value: &Value) -> Vec<String> {
    value
        .get("metadata")
        .and_then(|m| m.get("finalizers"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn is_terminating(value: &Value) -> bool {
    value
        .get("metadata")
        .and_then(|m| m.get("deletionTimestamp"))
        .is_some_and(|t| !t.is_null())
}

fn labels_match(value: &Value, wanted: &BTreeMap<String, String>) -> bool {
    let labels = value.get("metadata").and_then(|m| m.get("labels"));
    wanted.iter().all(|(k, v)| {
        labels
            .and_then(|l| l.get(k))
            .and_then(Value::as_str)
            .is_some_and(|actual| actual == v)
    })
}

fn now() -> Value {
    serde_json::to_value(Time(Utc::now())).unwrap_or(Value::Null)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object as if it had been created earlier, without logging a write.
    ///
    /// Missing `uid`, `creationTimestamp` and `generation` are filled in, and the
    /// object gets a fresh `resourceVersion`. An existing object is overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be serialized or has no name.
    pub fn insert<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let mut value = serde_json::to_value(obj)?;
        let key = key_of(obj)?;
        let mut state = self.lock();
        let rv = state.next_resource_version();
        fill_server_fields(&mut value, &rv);
        set_metadata(&mut value, "resourceVersion", Value::String(rv));
        state
            .objects
            .insert(store_key::<K>(&key), value.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Every successful write since creation or the last [`MemoryStore::clear_writes`]
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// Successful writes of `verb` against `kind`
    #[must_use]
    pub fn writes_of(&self, verb: Verb, kind: &str) -> Vec<WriteRecord> {
        self.lock()
            .writes
            .iter()
            .filter(|w| w.verb == verb && w.kind == kind)
            .cloned()
            .collect()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Make every future `verb` against `kind` fail with a 500 from the API server
    pub fn fail(&self, verb: Verb, kind: &str) {
        self.lock().failures.insert((verb, kind.to_string()));
    }

    /// Stop failing `verb` against `kind`
    pub fn recover(&self, verb: Verb, kind: &str) {
        self.lock().failures.remove(&(verb, kind.to_string()));
    }

    /// Complete pending deletions: objects marked for deletion whose only remaining
    /// finalizer is the foreground-deletion one are removed.
    pub fn finish_terminating(&self) {
        self.lock().objects.retain(|_, value| {
            !(is_terminating(value)
                && finalizers(value)
                    .iter()
                    .all(|f| f == FOREGROUND_DELETION_FINALIZER))
        });
    }

    /// Number of objects of `kind` currently stored
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.lock()
            .objects
            .keys()
            .filter(|(k, _, _)| k == kind)
            .count()
    }

    fn check_failure<K: StoreObject>(state: &State, verb: Verb) -> Result<(), StoreError> {
        if state.failures.contains(&(verb, K::kind(&()).to_string())) {
            return Err(StoreError::Api(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("injected {verb:?} failure for {}", K::kind(&())),
                reason: "InternalError".to_string(),
                code: 500,
            })));
        }
        Ok(())
    }

    fn record(state: &mut State, verb: Verb, kind: &str, key: &ObjectKey) {
        state.writes.push(WriteRecord {
            verb,
            kind: kind.to_string(),
            key: key.clone(),
        });
    }
}

fn key_of<K: StoreObject>(obj: &K) -> Result<ObjectKey, StoreError> {
    let name = obj.meta().name.clone().ok_or_else(|| StoreError::Invalid {
        kind: K::kind(&()).to_string(),
        reason: "metadata.name is required".to_string(),
    })?;
    Ok(ObjectKey {
        namespace: obj.meta().namespace.clone(),
        name,
    })
}

fn fill_server_fields(value: &mut Value, rv: &str) {
    if metadata_str(value, "uid").is_none() {
        set_metadata(value, "uid", Value::String(format!("uid-{rv}")));
    }
    if metadata_str(value, "creationTimestamp").is_none() {
        set_metadata(value, "creationTimestamp", now());
    }
    let has_generation = value
        .get("metadata")
        .and_then(|m| m.get("generation"))
        .is_some_and(|g| !g.is_null());
    if !has_generation {
        set_metadata(value, "generation", Value::from(1));
    }
}

fn check_resource_version<K: StoreObject>(
    incoming: &Value,
    stored: &Value,
    key: &ObjectKey,
) -> Result<(), StoreError> {
    match metadata_str(incoming, "resourceVersion") {
        Some(rv) if Some(rv) != metadata_str(stored, "resourceVersion") => {
            Err(StoreError::Conflict {
                kind: K::kind(&()).to_string(),
                key: key.to_string(),
            })
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let value = self.lock().objects.get(&store_key::<K>(key)).cloned();
        match value {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_of(obj)?;
        let mut value = serde_json::to_value(obj)?;
        let mut state = self.lock();
        Self::check_failure::<K>(&state, Verb::Create)?;

        let skey = store_key::<K>(&key);
        if state.objects.contains_key(&skey) {
            return Err(StoreError::AlreadyExists {
                kind: K::kind(&()).to_string(),
                key: key.to_string(),
            });
        }

        let rv = state.next_resource_version();
        if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.remove("uid");
            metadata.remove("creationTimestamp");
            metadata.remove("deletionTimestamp");
            metadata.remove("generation");
        }
        fill_server_fields(&mut value, &rv);
        set_metadata(&mut value, "resourceVersion", Value::String(rv));
        state.objects.insert(skey, value.clone());
        Self::record(&mut state, Verb::Create, &K::kind(&()), &key);
        Ok(serde_json::from_value(value)?)
    }

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_of(obj)?;
        let mut value = serde_json::to_value(obj)?;
        let mut state = self.lock();
        Self::check_failure::<K>(&state, Verb::Update)?;

        let skey = store_key::<K>(&key);
        let stored = state.objects.get(&skey).cloned().ok_or_else(|| StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            key: key.to_string(),
        })?;
        check_resource_version::<K>(&value, &stored, &key)?;

        // Server-owned fields survive a replace
        for field in ["uid", "creationTimestamp", "deletionTimestamp", "generation"] {
            let kept = stored
                .get("metadata")
                .and_then(|m| m.get(field))
                .cloned()
                .unwrap_or(Value::Null);
            set_metadata(&mut value, field, kept);
        }
        if let Some(object) = value.as_object_mut() {
            match stored.get("status") {
                Some(status) => object.insert("status".to_string(), status.clone()),
                None => object.remove("status"),
            };
        }
        if value.get("spec") != stored.get("spec") {
            let generation = stored
                .get("metadata")
                .and_then(|m| m.get("generation"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            set_metadata(&mut value, "generation", Value::from(generation + 1));
        }

        let rv = state.next_resource_version();
        set_metadata(&mut value, "resourceVersion", Value::String(rv));
        Self::record(&mut state, Verb::Update, &K::kind(&()), &key);

        if is_terminating(&value) && finalizers(&value).is_empty() {
            state.objects.remove(&skey);
        } else {
            state.objects.insert(skey, value.clone());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_of(obj)?;
        let value = serde_json::to_value(obj)?;
        let mut state = self.lock();
        Self::check_failure::<K>(&state, Verb::UpdateStatus)?;

        let skey = store_key::<K>(&key);
        let mut stored = state.objects.get(&skey).cloned().ok_or_else(|| StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            key: key.to_string(),
        })?;
        check_resource_version::<K>(&value, &stored, &key)?;

        if let Some(object) = stored.as_object_mut() {
            match value.get("status") {
                Some(status) => object.insert("status".to_string(), status.clone()),
                None => object.remove("status"),
            };
        }
        let rv = state.next_resource_version();
        set_metadata(&mut stored, "resourceVersion", Value::String(rv));
        state.objects.insert(skey, stored.clone());
        Self::record(&mut state, Verb::UpdateStatus, &K::kind(&()), &key);
        Ok(serde_json::from_value(stored)?)
    }

    async fn delete<K: StoreObject>(
        &self,
        key: &ObjectKey,
        propagation: Propagation,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        Self::check_failure::<K>(&state, Verb::Delete)?;

        let skey = store_key::<K>(key);
        let Some(mut stored) = state.objects.get(&skey).cloned() else {
            return Ok(());
        };

        let mut pending = finalizers(&stored);
        if propagation == Propagation::Foreground
            && !pending.iter().any(|f| f == FOREGROUND_DELETION_FINALIZER)
        {
            pending.push(FOREGROUND_DELETION_FINALIZER.to_string());
        }

        if pending.is_empty() {
            state.objects.remove(&skey);
        } else if !is_terminating(&stored) {
            set_metadata(&mut stored, "deletionTimestamp", now());
            set_metadata(&mut stored, "finalizers", Value::from(pending));
            let rv = state.next_resource_version();
            set_metadata(&mut stored, "resourceVersion", Value::String(rv));
            state.objects.insert(skey, stored);
        }
        Self::record(&mut state, Verb::Delete, &K::kind(&()), key);
        Ok(())
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError> {
        let state = self.lock();
        Self::check_failure::<K>(&state, Verb::List)?;

        let kind = K::kind(&()).to_string();
        state
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && (namespace.is_none() || ns.as_deref() == namespace))
            .filter(|(_, value)| labels_match(value, labels))
            .map(|(_, value)| serde_json::from_value(value.clone()).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;

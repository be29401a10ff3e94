//! Workload index: replica counts of the controllers that own pods.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::owner::ControllerKind;

/// Read access to a cache of controller objects.
///
/// `Ok(None)` means the controller is not in the cache. A controller with
/// no replica configuration reports `Ok(Some(0))`. Jobs have no replica
/// field and are rejected with [`IndexError::UnsupportedKind`].
pub trait WorkloadIndex: Send + Sync {
    fn lookup(
        &self,
        kind: ControllerKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<u32>, IndexError>;
}

/// A controller object as seen by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRecord {
    pub kind: ControllerKind,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    /// `spec.replicas`, absent for DaemonSets.
    #[serde(default)]
    pub replicas: Option<i32>,
    /// `status.numberReady`, only read for DaemonSets.
    #[serde(default)]
    pub number_ready: i32,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ControllerRecord {
    pub fn with_replicas(kind: ControllerKind, namespace: &str, name: &str, replicas: i32) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            replicas: Some(replicas),
            number_ready: 0,
        }
    }

    pub fn daemon_set(namespace: &str, name: &str, number_ready: i32) -> Self {
        Self {
            kind: ControllerKind::DaemonSet,
            namespace: namespace.to_string(),
            name: name.to_string(),
            replicas: None,
            number_ready,
        }
    }

    /// The replica count the group budget is computed from.
    pub fn replica_count(&self) -> u32 {
        let count = match self.kind {
            ControllerKind::DaemonSet => self.number_ready,
            _ => self.replicas.unwrap_or(0),
        };
        u32::try_from(count).unwrap_or(0)
    }
}

type IndexKey = (ControllerKind, String, String);

/// In-memory index, filled from a snapshot or by hand in tests.
#[derive(Debug, Default)]
pub struct StaticWorkloadIndex {
    controllers: RwLock<HashMap<IndexKey, ControllerRecord>>,
}

impl StaticWorkloadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = ControllerRecord>) -> Self {
        let index = Self::new();
        for record in records {
            index.upsert(record);
        }
        index
    }

    pub fn upsert(&self, record: ControllerRecord) {
        let key = (record.kind, record.namespace.clone(), record.name.clone());
        self.controllers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, record);
    }

    pub fn remove(&self, kind: ControllerKind, namespace: &str, name: &str) -> Option<ControllerRecord> {
        self.controllers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(kind, namespace.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkloadIndex for StaticWorkloadIndex {
    fn lookup(
        &self,
        kind: ControllerKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<u32>, IndexError> {
        if kind == ControllerKind::Job {
            return Err(IndexError::UnsupportedKind(kind.to_string()));
        }
        let controllers = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(controllers
            .get(&(kind, namespace.to_string(), name.to_string()))
            .map(ControllerRecord::replica_count))
    }
}

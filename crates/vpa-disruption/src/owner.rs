//! Owner resolution: which controller a pod's budget belongs to.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vpa_types::Pod;

/// Controller kinds whose pods can share a disruption budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ControllerKind {
    ReplicationController,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    Job,
}

impl ControllerKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "ReplicationController" => Some(Self::ReplicationController),
            "ReplicaSet" => Some(Self::ReplicaSet),
            "StatefulSet" => Some(Self::StatefulSet),
            "DaemonSet" => Some(Self::DaemonSet),
            "Job" => Some(Self::Job),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplicationController => "ReplicationController",
            Self::ReplicaSet => "ReplicaSet",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Job => "Job",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The controller that owns a group of pods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef {
    pub namespace: String,
    pub name: String,
    pub kind: ControllerKind,
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Why a pod's controlling owner could not be turned into an [`OwnerRef`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{0} owner references are marked as controller")]
    MultipleControllers(usize),

    #[error("unsupported controller kind {0}")]
    UnsupportedKind(String),
}

/// Resolve the pod's managing controller.
///
/// Returns `Ok(None)` for pods no controller manages. The owner lives in
/// the pod's namespace: controller references never cross namespaces.
pub fn resolve_owner(pod: &Pod) -> Result<Option<OwnerRef>, ResolveError> {
    let mut controllers = pod
        .metadata
        .owner_references
        .iter()
        .filter(|r| r.is_controller());

    let Some(controller) = controllers.next() else {
        return Ok(None);
    };
    let extra = controllers.count();
    if extra > 0 {
        return Err(ResolveError::MultipleControllers(extra + 1));
    }

    let kind = ControllerKind::parse(&controller.kind)
        .ok_or_else(|| ResolveError::UnsupportedKind(controller.kind.clone()))?;

    Ok(Some(OwnerRef {
        namespace: pod.namespace().to_string(),
        name: controller.name.clone(),
        kind,
    }))
}

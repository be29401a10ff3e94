//! Pod model: the subset of a Kubernetes pod the updater consults.
//!
//! Field names serialize in the API server's camelCase form so that
//! `kubectl get pod -o json` output can be trimmed into a snapshot.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Pod identity key: `"<namespace>/<name>"`.
pub type PodKey = String;

/// Condition reason reported when the kubelet postponed a resize.
pub const REASON_DEFERRED: &str = "Deferred";
/// Condition reason reported when the node can never fit the requested shape.
pub const REASON_INFEASIBLE: &str = "Infeasible";
/// Condition reason reported when the kubelet failed to actuate a resize.
pub const REASON_ERROR: &str = "Error";

/// Build a pod key from its namespace and name.
pub fn pod_key(namespace: &str, name: &str) -> PodKey {
    format!("{namespace}/{name}")
}

// ── Metadata ──────────────────────────────────────────────────────

/// Reference from a pod to an object that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    /// True for the single owner that manages the pod's lifecycle.
    #[serde(default)]
    pub controller: Option<bool>,
}

impl OwnerReference {
    /// Reference marked as the managing controller.
    pub fn controller(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            controller: Some(true),
        }
    }

    pub fn is_controller(&self) -> bool {
        self.controller.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

fn default_namespace() -> String {
    "default".to_string()
}

// ── Spec ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub init_containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub resize_policy: Vec<ContainerResizePolicy>,
    /// Only meaningful on init containers: `Always` marks a native sidecar.
    #[serde(default)]
    pub restart_policy: Option<ContainerRestartPolicy>,
}

impl Container {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_resize_policy(mut self, resource: &str, policy: ResizeRestartPolicy) -> Self {
        self.resize_policy.push(ContainerResizePolicy {
            resource_name: resource.to_string(),
            restart_policy: policy,
        });
        self
    }

    pub fn with_request(mut self, resource: &str, quantity: &str) -> Self {
        self.resources
            .requests
            .insert(resource.to_string(), quantity.to_string());
        self
    }

    /// True for init containers that keep running alongside the main containers.
    pub fn is_native_sidecar(&self) -> bool {
        self.restart_policy == Some(ContainerRestartPolicy::Always)
    }
}

/// Resource quantities keyed by resource name (`cpu`, `memory`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: HashMap<String, String>,
    #[serde(default)]
    pub limits: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerResizePolicy {
    pub resource_name: String,
    pub restart_policy: ResizeRestartPolicy,
}

/// Whether resizing a resource requires the container to restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeRestartPolicy {
    #[default]
    NotRequired,
    RestartContainer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerRestartPolicy {
    Always,
}

// ── Status ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    #[default]
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodConditionType {
    PodScheduled,
    Initialized,
    ContainersReady,
    Ready,
    PodResizePending,
    PodResizeInProgress,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub condition_type: PodConditionType,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PodCondition {
    /// A condition with status True and an optional reason.
    pub fn active(condition_type: PodConditionType, reason: Option<&str>) -> Self {
        Self {
            condition_type,
            status: ConditionStatus::True,
            reason: reason.map(str::to_string),
            message: None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: PodPhase,
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
    /// Legacy resize status string (`InProgress`, `Deferred`, ...).
    #[serde(default)]
    pub resize: String,
}

// ── Pod ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    /// A running pod with no owner, containers, or conditions.
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_controller(mut self, kind: &str, name: &str) -> Self {
        self.metadata
            .owner_references
            .push(OwnerReference::controller(kind, name));
        self
    }

    pub fn with_phase(mut self, phase: PodPhase) -> Self {
        self.status.phase = phase;
        self
    }

    pub fn with_condition(mut self, condition: PodCondition) -> Self {
        self.status.conditions.push(condition);
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.spec.containers.push(container);
        self
    }

    pub fn with_init_container(mut self, container: Container) -> Self {
        self.spec.init_containers.push(container);
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.metadata
            .annotations
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The `"<namespace>/<name>"` key used by every per-pod map.
    pub fn key(&self) -> PodKey {
        pod_key(&self.metadata.namespace, &self.metadata.name)
    }

    pub fn is_pending(&self) -> bool {
        self.status.phase == PodPhase::Pending
    }

    /// First condition of the given type, if any.
    pub fn condition(&self, condition_type: PodConditionType) -> Option<&PodCondition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

impl fmt::Display for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.metadata.namespace, self.metadata.name)
    }
}

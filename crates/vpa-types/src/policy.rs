//! The autoscaler policy object a decision is made on behalf of.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How the updater is allowed to apply a new recommendation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Delete the pod and let its controller recreate it.
    #[default]
    #[serde(alias = "Recreate", alias = "Auto")]
    Evict,
    /// Patch resources through the `/resize` subresource only.
    InPlace,
    /// Resize in place, fall back to eviction when the resize stalls.
    InPlaceOrRecreate,
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpdateMode::Evict => "Evict",
            UpdateMode::InPlace => "InPlace",
            UpdateMode::InPlaceOrRecreate => "InPlaceOrRecreate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePolicy {
    #[serde(default)]
    pub update_mode: UpdateMode,
    /// Per-policy override of the global minReplicas floor.
    #[serde(default)]
    pub min_replicas: Option<u32>,
}

/// Target resources recommended for one container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecommendation {
    pub container_name: String,
    #[serde(default)]
    pub target: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub update_policy: UpdatePolicy,
    #[serde(default)]
    pub recommendations: Vec<ContainerRecommendation>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Policy {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            update_policy: UpdatePolicy::default(),
            recommendations: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: UpdateMode) -> Self {
        self.update_policy.update_mode = mode;
        self
    }

    pub fn with_min_replicas(mut self, min_replicas: u32) -> Self {
        self.update_policy.min_replicas = Some(min_replicas);
        self
    }

    pub fn with_recommendation(mut self, container: &str, resource: &str, quantity: &str) -> Self {
        match self
            .recommendations
            .iter_mut()
            .find(|r| r.container_name == container)
        {
            Some(rec) => {
                rec.target.insert(resource.to_string(), quantity.to_string());
            }
            None => self.recommendations.push(ContainerRecommendation {
                container_name: container.to_string(),
                target: HashMap::from([(resource.to_string(), quantity.to_string())]),
            }),
        }
        self
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.update_policy.update_mode
    }

    /// The effective minReplicas: the per-policy override if set, else `global`.
    pub fn effective_min_replicas(&self, global: u32) -> u32 {
        self.update_policy.min_replicas.unwrap_or(global)
    }

    pub fn recommendation_for(&self, container: &str) -> Option<&ContainerRecommendation> {
        self.recommendations
            .iter()
            .find(|r| r.container_name == container)
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

//! Per-controller disruption budgets for one reconciliation pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use vpa_types::PodKey;

use crate::owner::OwnerRef;

/// Replica accounting for the pods of one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    /// Replica count the controller asks for.
    pub configured: u32,
    pub pending: u32,
    pub running: u32,
    /// Replicas the group may lose beyond full availability.
    pub eviction_tolerance: u32,
    /// Evictions committed this pass.
    pub evicted: u32,
    /// Pods already mid-resize when the group was built.
    pub in_place_update_ongoing: u32,
    /// In-place patches committed this pass.
    pub in_place_update_initiated: u32,
    /// Fewer candidates than the effective minReplicas.
    pub below_min_replicas: bool,
}

impl GroupStats {
    /// Whether the group may lose one more replica right now.
    ///
    /// A fully healthy group whose tolerance rounds down to zero may still
    /// lose exactly one pod, provided nothing was disrupted yet this pass.
    pub fn is_pod_disruptable(&self) -> bool {
        let should_be_alive = i64::from(self.configured) - i64::from(self.eviction_tolerance);
        let actually_alive = i64::from(self.running)
            - i64::from(self.evicted)
            - i64::from(self.in_place_update_initiated);

        actually_alive > should_be_alive
            || (self.configured == self.running
                && self.eviction_tolerance == 0
                && self.evicted == 0
                && self.in_place_update_initiated == 0)
    }

    /// Disruptions committed this pass, of either kind.
    pub fn disrupted(&self) -> u32 {
        self.evicted + self.in_place_update_initiated
    }
}

#[derive(Debug, Default)]
struct GroupMaps {
    stats: HashMap<OwnerRef, GroupStats>,
    pod_to_group: HashMap<PodKey, OwnerRef>,
    evicted_pods: HashSet<PodKey>,
    resized_pods: HashSet<PodKey>,
}

/// Shared handle to the group maps of one pass.
///
/// Both arbiters of a pass hold a clone and see each other's commits
/// immediately. The maps are meant to be driven from a single task: every
/// decision reads the counters under the lock, but a decision and its
/// commit are separate lock acquisitions, so two tasks racing on the same
/// group could both pass the check. The lock is never held across an
/// await point.
#[derive(Debug, Clone, Default)]
pub struct GroupSet {
    inner: Arc<Mutex<GroupMaps>>,
}

impl GroupSet {
    pub fn new(stats: HashMap<OwnerRef, GroupStats>, pod_to_group: HashMap<PodKey, OwnerRef>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GroupMaps {
                stats,
                pod_to_group,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GroupMaps> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The owner a pod was registered under, if any.
    pub fn group_of(&self, pod: &str) -> Option<OwnerRef> {
        self.lock().pod_to_group.get(pod).cloned()
    }

    pub fn stats(&self, owner: &OwnerRef) -> Option<GroupStats> {
        self.lock().stats.get(owner).copied()
    }

    /// Owner and current counters for a registered pod.
    pub fn stats_for_pod(&self, pod: &str) -> Option<(OwnerRef, GroupStats)> {
        let maps = self.lock();
        let owner = maps.pod_to_group.get(pod)?;
        let stats = maps.stats.get(owner)?;
        Some((owner.clone(), *stats))
    }

    /// Snapshot of every group's counters.
    pub fn group_stats(&self) -> HashMap<OwnerRef, GroupStats> {
        self.lock().stats.clone()
    }

    /// Snapshot of the pod registrations.
    pub fn pod_to_group(&self) -> HashMap<PodKey, OwnerRef> {
        self.lock().pod_to_group.clone()
    }

    pub fn contains(&self, pod: &str) -> bool {
        self.lock().pod_to_group.contains_key(pod)
    }

    pub fn len(&self) -> usize {
        self.lock().stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().stats.is_empty()
    }

    pub fn was_evicted(&self, pod: &str) -> bool {
        self.lock().evicted_pods.contains(pod)
    }

    pub fn was_resized(&self, pod: &str) -> bool {
        self.lock().resized_pods.contains(pod)
    }

    /// Record a committed eviction. `counted` is false for Pending pods,
    /// which never consumed availability.
    pub(crate) fn commit_eviction(&self, pod: &str, owner: &OwnerRef, counted: bool) -> Option<GroupStats> {
        let mut maps = self.lock();
        maps.evicted_pods.insert(pod.to_string());
        let stats = maps.stats.get_mut(owner)?;
        if counted {
            stats.evicted += 1;
        }
        Some(*stats)
    }

    /// Record a committed in-place patch.
    pub(crate) fn commit_resize(&self, pod: &str, owner: &OwnerRef) -> Option<GroupStats> {
        let mut maps = self.lock();
        maps.resized_pods.insert(pod.to_string());
        let stats = maps.stats.get_mut(owner)?;
        stats.in_place_update_initiated += 1;
        Some(*stats)
    }
}

//! Group-stats builder.
//!
//! Groups candidate pods by their managing controller and computes one
//! disruption budget per group. Every skip is local to its group: the
//! builder never fails as a whole, it returns whatever groups it could
//! build.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use vpa_types::{DisruptionSettings, Pod, PodKey, Policy};

use crate::group::{GroupSet, GroupStats};
use crate::index::WorkloadIndex;
use crate::owner::{ControllerKind, OwnerRef, resolve_owner};
use crate::status::is_in_place_updating;

pub struct GroupStatsBuilder {
    index: Arc<dyn WorkloadIndex>,
    min_replicas: u32,
    tolerance_fraction: f64,
    retain_below_min: bool,
}

impl GroupStatsBuilder {
    pub fn new(index: Arc<dyn WorkloadIndex>, min_replicas: u32, tolerance_fraction: f64) -> Self {
        Self {
            index,
            min_replicas,
            tolerance_fraction: tolerance_fraction.clamp(0.0, 1.0),
            retain_below_min: false,
        }
    }

    pub fn from_settings(index: Arc<dyn WorkloadIndex>, settings: &DisruptionSettings) -> Self {
        Self::new(index, settings.min_replicas, settings.eviction_tolerance_fraction)
            .retain_below_min_replicas(settings.retain_below_min_replicas)
    }

    /// Keep groups smaller than minReplicas, flagged so they only admit
    /// in-place resizes.
    pub fn retain_below_min_replicas(mut self, retain: bool) -> Self {
        self.retain_below_min = retain;
        self
    }

    pub fn build(&self, pods: &[Pod], policy: &Policy) -> GroupSet {
        let mut buckets: BTreeMap<OwnerRef, Vec<&Pod>> = BTreeMap::new();
        let mut seen: HashSet<PodKey> = HashSet::new();

        for pod in pods {
            if !seen.insert(pod.key()) {
                debug!(pod = %pod, "duplicate candidate ignored");
                continue;
            }
            match resolve_owner(pod) {
                Ok(Some(owner)) => buckets.entry(owner).or_default().push(pod),
                Ok(None) => info!(pod = %pod, "pod has no controller owner, skipping"),
                Err(e) => warn!(pod = %pod, error = %e, "failed to resolve pod owner, skipping"),
            }
        }

        let required = policy.effective_min_replicas(self.min_replicas);
        let mut stats = HashMap::new();
        let mut pod_to_group = HashMap::new();

        for (owner, bucket) in buckets {
            let live_pods = bucket.len() as u32;
            let below_min_replicas = live_pods < required;
            if below_min_replicas && !self.retain_below_min {
                info!(
                    owner = %owner,
                    live_pods,
                    required,
                    policy = %policy.key(),
                    "too few replicas, skipping group"
                );
                continue;
            }

            let Some(configured) = self.configured_replicas(&owner, live_pods) else {
                continue;
            };

            let pending = bucket.iter().filter(|p| p.is_pending()).count() as u32;
            let ongoing = bucket.iter().filter(|p| is_in_place_updating(p)).count() as u32;
            let group = GroupStats {
                configured,
                pending,
                running: live_pods - pending,
                eviction_tolerance: (f64::from(configured) * self.tolerance_fraction).floor() as u32,
                in_place_update_ongoing: ongoing,
                below_min_replicas,
                ..Default::default()
            };
            debug!(
                owner = %owner,
                configured,
                running = group.running,
                pending,
                tolerance = group.eviction_tolerance,
                ongoing,
                below_min_replicas,
                "group built"
            );

            for pod in bucket {
                pod_to_group.insert(pod.key(), owner.clone());
            }
            stats.insert(owner, group);
        }

        GroupSet::new(stats, pod_to_group)
    }

    /// Replica count the budget is computed from, or `None` to skip the group.
    fn configured_replicas(&self, owner: &OwnerRef, live_pods: u32) -> Option<u32> {
        if owner.kind == ControllerKind::Job {
            return Some(live_pods);
        }
        match self.index.lookup(owner.kind, &owner.namespace, &owner.name) {
            Ok(Some(0)) => {
                info!(owner = %owner, "controller has no replica configuration, skipping group");
                None
            }
            Ok(Some(replicas)) => Some(replicas),
            Ok(None) => {
                info!(owner = %owner, "controller not available in workload index, skipping group");
                None
            }
            Err(e) => {
                warn!(owner = %owner, error = %e, "workload index lookup failed, skipping group");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ControllerRecord, StaticWorkloadIndex};
    use vpa_types::{PodCondition, PodConditionType, PodPhase};

    fn pods(kind: &str, owner: &str, n: usize) -> Vec<Pod> {
        (0..n)
            .map(|i| Pod::new("default", &format!("{owner}-{i}")).with_controller(kind, owner))
            .collect()
    }

    fn builder(records: Vec<ControllerRecord>) -> GroupStatsBuilder {
        GroupStatsBuilder::new(Arc::new(StaticWorkloadIndex::from_records(records)), 2, 0.5)
    }

    fn owner(kind: ControllerKind, name: &str) -> OwnerRef {
        OwnerRef {
            namespace: "default".into(),
            name: name.into(),
            kind,
        }
    }

    #[test]
    fn counts_pending_and_resizing_pods() {
        let mut candidates = pods("ReplicaSet", "rs", 4);
        candidates[0] = candidates[0].clone().with_phase(PodPhase::Pending);
        candidates[1] = candidates[1]
            .clone()
            .with_condition(PodCondition::active(PodConditionType::PodResizeInProgress, None));

        let groups = builder(vec![ControllerRecord::with_replicas(ControllerKind::ReplicaSet, "default", "rs", 4)])
            .build(&candidates, &Policy::new("default", "vpa"));

        let stats = groups.stats(&owner(ControllerKind::ReplicaSet, "rs")).unwrap();
        assert_eq!(stats.configured, 4);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.running, 3);
        assert_eq!(stats.eviction_tolerance, 2);
        assert_eq!(stats.in_place_update_ongoing, 1);
        assert_eq!(groups.pod_to_group().len(), 4);
    }

    #[test]
    fn skips_groups_below_min_replicas_unless_retained() {
        let candidates = pods("ReplicaSet", "rs", 1);
        let records = vec![ControllerRecord::with_replicas(ControllerKind::ReplicaSet, "default", "rs", 1)];
        let policy = Policy::new("default", "vpa");

        assert!(builder(records.clone()).build(&candidates, &policy).is_empty());

        let retained = builder(records)
            .retain_below_min_replicas(true)
            .build(&candidates, &policy);
        let stats = retained.stats(&owner(ControllerKind::ReplicaSet, "rs")).unwrap();
        assert!(stats.below_min_replicas);
    }

    #[test]
    fn policy_min_replicas_overrides_global() {
        let candidates = pods("StatefulSet", "ss", 1);
        let groups = builder(vec![ControllerRecord::with_replicas(ControllerKind::StatefulSet, "default", "ss", 1)])
            .build(&candidates, &Policy::new("default", "vpa").with_min_replicas(1));
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn skips_missing_and_zero_replica_controllers_locally() {
        let mut candidates = pods("ReplicaSet", "missing", 2);
        candidates.extend(pods("ReplicaSet", "zero", 2));
        candidates.extend(pods("ReplicaSet", "ok", 2));
        candidates.push(Pod::new("default", "orphan"));

        let groups = builder(vec![
            ControllerRecord::with_replicas(ControllerKind::ReplicaSet, "default", "zero", 0),
            ControllerRecord::with_replicas(ControllerKind::ReplicaSet, "default", "ok", 2),
        ])
        .build(&candidates, &Policy::new("default", "vpa"));

        assert_eq!(groups.len(), 1);
        assert!(groups.contains("default/ok-0"));
        assert!(!groups.contains("default/missing-0"));
        assert!(!groups.contains("default/orphan"));
    }

    #[test]
    fn job_uses_live_pod_count_and_daemon_set_uses_ready_count() {
        let mut candidates = pods("Job", "job", 3);
        candidates.extend(pods("DaemonSet", "ds", 3));

        let groups = builder(vec![ControllerRecord::daemon_set("default", "ds", 5)])
            .build(&candidates, &Policy::new("default", "vpa"));

        assert_eq!(groups.stats(&owner(ControllerKind::Job, "job")).unwrap().configured, 3);
        assert_eq!(groups.stats(&owner(ControllerKind::DaemonSet, "ds")).unwrap().configured, 5);
    }

    #[test]
    fn daemon_set_with_no_ready_pods_is_skipped() {
        let groups = builder(vec![ControllerRecord::daemon_set("default", "ds", 0)])
            .build(&pods("DaemonSet", "ds", 3), &Policy::new("default", "vpa"));
        assert!(groups.is_empty());
    }
}

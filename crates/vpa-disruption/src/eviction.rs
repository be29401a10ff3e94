//! Eviction arbiter.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use vpa_state::AttemptStore;
use vpa_types::{Pod, Policy};

use crate::client::{EvictionOptions, PodClient};
use crate::clock::Clock;
use crate::error::{DisruptionError, DisruptionResult};
use crate::events::{EventSink, EventType, ObjectRef, REASON_EVICTED_BY_VPA, REASON_EVICTED_POD};
use crate::fallback::{FallbackTimeouts, can_evict_in_placing_pod};
use crate::group::GroupSet;
use crate::status::is_in_place_updating;

/// Decides and performs evictions against the budgets of one pass.
pub struct EvictionArbiter {
    groups: GroupSet,
    client: Arc<dyn PodClient>,
    attempts: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
    timeouts: FallbackTimeouts,
    options: EvictionOptions,
}

impl EvictionArbiter {
    pub fn new(
        groups: GroupSet,
        client: Arc<dyn PodClient>,
        attempts: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
        timeouts: FallbackTimeouts,
    ) -> Self {
        Self {
            groups,
            client,
            attempts,
            clock,
            timeouts,
            options: EvictionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvictionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn groups(&self) -> &GroupSet {
        &self.groups
    }

    /// Whether `pod` may be evicted now. Does not touch the counters.
    pub fn can_evict(&self, pod: &Pod) -> bool {
        let key = pod.key();
        let Some((owner, group)) = self.groups.stats_for_pod(&key) else {
            debug!(pod = %key, "pod is not part of a replicated group");
            return false;
        };

        if pod.is_pending() {
            return true;
        }
        if self.groups.was_evicted(&key) {
            debug!(pod = %key, "pod already evicted this pass");
            return false;
        }
        if group.below_min_replicas {
            debug!(pod = %key, owner = %owner, "group below minReplicas, eviction blocked");
            return false;
        }
        if is_in_place_updating(pod) {
            return can_evict_in_placing_pod(
                pod,
                &group,
                self.attempts.as_ref(),
                self.clock.as_ref(),
                &self.timeouts,
            );
        }

        let disruptable = group.is_pod_disruptable();
        debug!(
            pod = %key,
            owner = %owner,
            running = group.running,
            configured = group.configured,
            tolerance = group.eviction_tolerance,
            evicted = group.evicted,
            initiated = group.in_place_update_initiated,
            disruptable,
            "eviction decision"
        );
        disruptable
    }

    /// Evict `pod` if the budget still allows it.
    ///
    /// Counters move only after the client accepted the eviction.
    pub async fn evict(&self, pod: &Pod, policy: &Policy, sink: &dyn EventSink) -> DisruptionResult<()> {
        let key = pod.key();
        let Some(owner) = self.groups.group_of(&key) else {
            return Err(DisruptionError::NotInReplicatedSet(key));
        };
        if !self.can_evict(pod) {
            return Err(DisruptionError::BudgetExceeded {
                pod: key,
                reason: "eviction budget exceeded".to_string(),
            });
        }

        if let Err(e) = self
            .client
            .evict(pod.namespace(), pod.name(), &self.options)
            .await
        {
            error!(pod = %key, error = %e, "eviction failed");
            return Err(e.into());
        }

        sink.event(
            &ObjectRef::pod(pod),
            EventType::Normal,
            REASON_EVICTED_BY_VPA,
            "Pod was evicted by VPA Updater to apply resource recommendation.",
        );
        sink.event(
            &ObjectRef::policy(policy),
            EventType::Normal,
            REASON_EVICTED_POD,
            &format!(
                "VPA Updater evicted Pod {} to apply resource recommendation.",
                pod.name()
            ),
        );

        let stats = self.groups.commit_eviction(&key, &owner, !pod.is_pending());
        if let Err(e) = self.attempts.remove(&key) {
            warn!(pod = %key, error = %e, "failed to forget in-place attempt of evicted pod");
        }
        info!(
            pod = %key,
            owner = %owner,
            evicted = stats.map(|s| s.evicted),
            "pod evicted"
        );
        Ok(())
    }
}

//! In-place arbiter: resize pods through the `/resize` subresource.
//!
//! A resize does not delete the pod, but the kubelet may still restart
//! containers whose resize policy asks for it, so in-place commits consume
//! the same disruption budget as evictions unless every resize policy of
//! the pod is `NotRequired` and the arbiter was told to skip the budget.
//!
//! Decisions:
//!
//! | Pod state | `InPlace` | `InPlaceOrRecreate` |
//! |-----------|-----------|---------------------|
//! | not grouped, Pending, or already committed this pass | Deferred | Deferred |
//! | resizing, Infeasible, budget left | Infeasible | Evict if fallback due and budget left, else Deferred |
//! | resizing, other (or Infeasible without budget) | Deferred | Evict if fallback due and budget left, else Deferred |
//! | idle, budget left | Approved | Approved |
//! | idle, no budget | Deferred | Deferred |

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use vpa_state::AttemptStore;
use vpa_types::{FeatureGates, PatchRecord, PatchTarget, Pod, Policy, ResizeRestartPolicy, UpdateMode};

use crate::client::PodClient;
use crate::clock::Clock;
use crate::error::{DisruptionError, DisruptionResult};
use crate::events::{EventSink, EventType, ObjectRef, REASON_IN_PLACE_RESIZED};
use crate::fallback::{FallbackTimeouts, can_evict_in_placing_pod};
use crate::group::GroupSet;
use crate::patch::{PatchCalculator, empty_annotations_patch};
use crate::status::{ResizeStatus, classify, is_in_place_updating};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InPlaceDecision {
    /// Patch now.
    Approved,
    /// Leave the pod alone this pass.
    Deferred,
    /// The node rejected the last shape; a fresh patch may still fit.
    Infeasible,
    /// Give up on resizing and ask the eviction arbiter.
    Evict,
}

impl InPlaceDecision {
    /// Whether [`InPlaceArbiter::in_place_update`] would proceed.
    pub fn allows_patch(&self) -> bool {
        matches!(self, InPlaceDecision::Approved | InPlaceDecision::Infeasible)
    }
}

impl fmt::Display for InPlaceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InPlaceDecision::Approved => "Approved",
            InPlaceDecision::Deferred => "Deferred",
            InPlaceDecision::Infeasible => "Infeasible",
            InPlaceDecision::Evict => "Evict",
        };
        f.write_str(s)
    }
}

/// True when no container the kubelet would resize asks for a restart.
///
/// Native sidecars count as containers; ordinary init containers have
/// already exited and are ignored.
pub fn resize_is_non_disruptive(pod: &Pod) -> bool {
    pod.spec
        .containers
        .iter()
        .chain(pod.spec.init_containers.iter().filter(|c| c.is_native_sidecar()))
        .all(|c| {
            c.resize_policy
                .iter()
                .all(|p| p.restart_policy == ResizeRestartPolicy::NotRequired)
        })
}

pub struct InPlaceArbiter {
    groups: GroupSet,
    client: Arc<dyn PodClient>,
    calculators: Vec<Arc<dyn PatchCalculator>>,
    attempts: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
    timeouts: FallbackTimeouts,
    features: FeatureGates,
    skip_disruption_budget: bool,
}

impl InPlaceArbiter {
    pub fn new(
        groups: GroupSet,
        client: Arc<dyn PodClient>,
        calculators: Vec<Arc<dyn PatchCalculator>>,
        attempts: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
        timeouts: FallbackTimeouts,
    ) -> Self {
        Self {
            groups,
            client,
            calculators,
            attempts,
            clock,
            timeouts,
            features: FeatureGates::default(),
            skip_disruption_budget: false,
        }
    }

    pub fn with_features(mut self, features: FeatureGates) -> Self {
        self.features = features;
        self
    }

    /// Let resizes that restart no container ignore the group budget.
    pub fn skip_disruption_budget(mut self, skip: bool) -> Self {
        self.skip_disruption_budget = skip;
        self
    }

    pub fn groups(&self) -> &GroupSet {
        &self.groups
    }

    pub fn can_in_place_update(&self, pod: &Pod, mode: UpdateMode) -> InPlaceDecision {
        let key = pod.key();
        let decision = self.decide(pod, &key, mode);
        debug!(pod = %key, %mode, %decision, "in-place decision");
        decision
    }

    fn decide(&self, pod: &Pod, key: &str, mode: UpdateMode) -> InPlaceDecision {
        match mode {
            UpdateMode::Evict => return InPlaceDecision::Evict,
            UpdateMode::InPlace if !self.features.in_place => return InPlaceDecision::Deferred,
            UpdateMode::InPlaceOrRecreate if !self.features.in_place_or_recreate => {
                return InPlaceDecision::Evict;
            }
            _ => {}
        }

        let Some((_, group)) = self.groups.stats_for_pod(key) else {
            return InPlaceDecision::Deferred;
        };
        if pod.is_pending() || self.groups.was_resized(key) || self.groups.was_evicted(key) {
            return InPlaceDecision::Deferred;
        }

        if is_in_place_updating(pod) {
            let status = classify(pod);
            return match mode {
                UpdateMode::InPlaceOrRecreate => {
                    let fallback = !group.below_min_replicas
                        && can_evict_in_placing_pod(
                            pod,
                            &group,
                            self.attempts.as_ref(),
                            self.clock.as_ref(),
                            &self.timeouts,
                        );
                    if fallback {
                        InPlaceDecision::Evict
                    } else {
                        InPlaceDecision::Deferred
                    }
                }
                _ if status == ResizeStatus::Infeasible && group.is_pod_disruptable() => {
                    InPlaceDecision::Infeasible
                }
                _ => InPlaceDecision::Deferred,
            };
        }

        if self.skip_disruption_budget && resize_is_non_disruptive(pod) {
            debug!(pod = %key, "resize restarts no container, skipping disruption budget");
            return InPlaceDecision::Approved;
        }
        if group.is_pod_disruptable() {
            InPlaceDecision::Approved
        } else {
            InPlaceDecision::Deferred
        }
    }

    /// Patch `pod` towards the policy's recommendation.
    ///
    /// The decision is re-evaluated under the policy's update mode and must
    /// allow a patch. The `/resize` patch is sent first and the annotation
    /// patch second; counters and the attempt time move only after both
    /// succeeded. Once both patches are applied the call succeeds even if
    /// the attempt time cannot be stored; the pod then looks as if it had
    /// never been attempted to the stall fallback.
    pub async fn in_place_update(&self, pod: &Pod, policy: &Policy, sink: &dyn EventSink) -> DisruptionResult<()> {
        let key = pod.key();
        let Some(owner) = self.groups.group_of(&key) else {
            return Err(DisruptionError::NotInReplicatedSet(key));
        };
        let decision = self.can_in_place_update(pod, policy.update_mode());
        if !decision.allows_patch() {
            return Err(DisruptionError::BudgetExceeded {
                pod: key,
                reason: format!("in-place update not approved ({decision})"),
            });
        }

        let (resize, annotations) = self.calculate_patches(pod, policy)?;
        if resize.is_empty() {
            return Err(DisruptionError::NoPatches(key));
        }

        let resize_body = encode(&key, &resize)?;
        if let Err(e) = self
            .client
            .patch_resize(pod.namespace(), pod.name(), resize_body)
            .await
        {
            error!(pod = %key, error = %e, "resize patch failed");
            return Err(e.into());
        }

        if !annotations.is_empty() {
            let body = encode(&key, &annotations)?;
            if let Err(e) = self.client.patch(pod.namespace(), pod.name(), body).await {
                error!(pod = %key, error = %e, "annotation patch failed");
                return Err(e.into());
            }
        }

        let stats = self.groups.commit_resize(&key, &owner);
        let recorded = self.attempts.record(&key, self.clock.now());

        sink.event(
            &ObjectRef::pod(pod),
            EventType::Normal,
            REASON_IN_PLACE_RESIZED,
            "Pod was resized in place by VPA Updater.",
        );
        info!(
            pod = %key,
            owner = %owner,
            %decision,
            initiated = stats.map(|s| s.in_place_update_initiated),
            "pod resized in place"
        );

        if let Err(e) = recorded {
            warn!(pod = %key, error = %e, "failed to record in-place attempt");
        }
        Ok(())
    }

    fn calculate_patches(&self, pod: &Pod, policy: &Policy) -> DisruptionResult<(Vec<PatchRecord>, Vec<PatchRecord>)> {
        let mut resize = Vec::new();
        let mut annotations = Vec::new();
        for calculator in &self.calculators {
            let records = calculator.calculate(pod, policy)?;
            match calculator.target() {
                PatchTarget::Resize => resize.extend(records),
                PatchTarget::Annotations => annotations.extend(records),
            }
        }
        if !annotations.is_empty() && pod.metadata.annotations.is_empty() {
            annotations.insert(0, empty_annotations_patch());
        }
        Ok((resize, annotations))
    }
}

fn encode(key: &str, patches: &[PatchRecord]) -> DisruptionResult<Vec<u8>> {
    serde_json::to_vec(patches).map_err(|source| DisruptionError::Serialize {
        pod: key.to_string(),
        source,
    })
}

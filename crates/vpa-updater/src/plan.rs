//! Dry-run planner.
//!
//! Replays one reconciliation pass over a snapshot of pods and controllers
//! and reports what the arbiters would do to each pod. Commits go to an
//! in-memory client, so nothing in the cluster changes; budgets are still
//! consumed as the pass goes, exactly as in a live pass.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vpa_disruption::{
    ControllerRecord, EventSink, FakeClock, FakePodClient, GroupStats, InPlaceDecision, OwnerRef,
    RestrictionFactory, StaticWorkloadIndex,
};
use vpa_state::{AttemptStore, MemoryAttemptStore};
use vpa_types::{Pod, Policy, UpdateMode, UpdaterConfig};

/// Input of a dry run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub policy: Policy,
    #[serde(default)]
    pub pods: Vec<Pod>,
    #[serde(default)]
    pub controllers: Vec<ControllerRecord>,
    /// Last in-place attempt per pod key, in unix milliseconds.
    #[serde(default)]
    pub attempts: HashMap<String, u64>,
    /// Evaluation time in unix milliseconds; the wall clock when absent.
    #[serde(default)]
    pub now: Option<u64>,
}

impl Snapshot {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("invalid snapshot {}", path.display()))
    }

    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    fn evaluation_time(&self) -> SystemTime {
        self.now
            .map(|millis| UNIX_EPOCH + Duration::from_millis(millis))
            .unwrap_or_else(SystemTime::now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanAction {
    Evict,
    ResizeInPlace,
    /// A stalled resize replaced by an eviction.
    FallbackEvict,
    Skip,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlanAction::Evict => "evict",
            PlanAction::ResizeInPlace => "resize-in-place",
            PlanAction::FallbackEvict => "fallback-evict",
            PlanAction::Skip => "skip",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub pod: String,
    pub action: PlanAction,
    /// In-place decision, for in-place modes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<InPlaceDecision>,
    /// Why the pod was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub owner: OwnerRef,
    pub stats: GroupStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub policy: String,
    pub mode: UpdateMode,
    pub entries: Vec<PlanEntry>,
    pub groups: Vec<GroupReport>,
    /// Attempt records that would be pruned after the pass.
    pub pruned_attempts: usize,
}

impl PlanReport {
    pub fn count(&self, action: PlanAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// One `<pod>\t<action>` line per pod, then one line per group.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let _ = write!(out, "{}\t{}", entry.pod, entry.action);
            if let Some(detail) = &entry.detail {
                let _ = write!(out, "\t{detail}");
            }
            out.push('\n');
        }
        for group in &self.groups {
            let s = &group.stats;
            let _ = writeln!(
                out,
                "# {} configured={} running={} pending={} tolerance={} evicted={} resized={} below_min={}",
                group.owner,
                s.configured,
                s.running,
                s.pending,
                s.eviction_tolerance,
                s.evicted,
                s.in_place_update_initiated,
                s.below_min_replicas,
            );
        }
        out
    }
}

/// Attempt store for a dry run: `persisted` entries overlaid with the
/// snapshot's. Never writes back to `persisted`.
pub fn seed_attempts(
    snapshot: &Snapshot,
    persisted: Option<&dyn AttemptStore>,
) -> anyhow::Result<MemoryAttemptStore> {
    let mut entries: HashMap<String, SystemTime> = match persisted {
        Some(store) => store.entries()?.into_iter().collect(),
        None => HashMap::new(),
    };
    for (key, millis) in &snapshot.attempts {
        entries.insert(key.clone(), UNIX_EPOCH + Duration::from_millis(*millis));
    }
    Ok(MemoryAttemptStore::from_entries(entries))
}

/// Run one simulated pass over `snapshot`.
pub async fn run_plan(
    snapshot: &Snapshot,
    config: &UpdaterConfig,
    attempts: MemoryAttemptStore,
    sink: &dyn EventSink,
) -> anyhow::Result<PlanReport> {
    let index = Arc::new(StaticWorkloadIndex::from_records(snapshot.controllers.clone()));
    let factory = RestrictionFactory::from_config(index, Arc::new(FakePodClient::new()), config)?
        .with_clock(Arc::new(FakeClock::new(snapshot.evaluation_time())))
        .with_attempt_store(Arc::new(attempts));

    let policy = &snapshot.policy;
    let mode = policy.update_mode();
    let groups = factory.build(&snapshot.pods, policy);
    let eviction = factory.new_eviction_arbiter(&groups);
    let in_place = factory.new_in_place_arbiter(&groups);
    info!(
        policy = %policy.key(),
        %mode,
        pods = snapshot.pods.len(),
        groups = groups.len(),
        "planning pass"
    );

    let mut entries = Vec::with_capacity(snapshot.pods.len());
    for pod in &snapshot.pods {
        let mut entry = PlanEntry {
            pod: pod.key(),
            action: PlanAction::Skip,
            decision: None,
            detail: None,
        };

        let outcome = match mode {
            UpdateMode::Evict => eviction
                .evict(pod, policy, sink)
                .await
                .map(|()| PlanAction::Evict),
            UpdateMode::InPlace | UpdateMode::InPlaceOrRecreate => {
                let decision = in_place.can_in_place_update(pod, mode);
                entry.decision = Some(decision);
                match decision {
                    InPlaceDecision::Approved | InPlaceDecision::Infeasible => in_place
                        .in_place_update(pod, policy, sink)
                        .await
                        .map(|()| PlanAction::ResizeInPlace),
                    InPlaceDecision::Evict => eviction
                        .evict(pod, policy, sink)
                        .await
                        .map(|()| PlanAction::FallbackEvict),
                    InPlaceDecision::Deferred => Ok(PlanAction::Skip),
                }
            }
        };

        match outcome {
            Ok(action) => entry.action = action,
            Err(e) => entry.detail = Some(e.to_string()),
        }
        if entry.action == PlanAction::Skip && entry.detail.is_none() {
            entry.detail = Some("deferred".to_string());
        }
        debug!(pod = %entry.pod, action = %entry.action, "planned");
        entries.push(entry);
    }

    let mut group_reports: Vec<GroupReport> = groups
        .group_stats()
        .into_iter()
        .map(|(owner, stats)| GroupReport { owner, stats })
        .collect();
    group_reports.sort_by(|a, b| a.owner.cmp(&b.owner));

    let pruned_attempts = factory.prune_attempts(snapshot.pods.iter().map(Pod::key))?;

    Ok(PlanReport {
        policy: policy.key(),
        mode,
        entries,
        groups: group_reports,
        pruned_attempts,
    })
}

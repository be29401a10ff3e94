//! Shared fixtures for the disruption integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use vpa_disruption::{
    Clock, ControllerKind, ControllerRecord, FakeClock, FakePodClient, GroupSet, GroupStats,
    OwnerRef, RecordingEventSink, RestrictionFactory, StaticWorkloadIndex,
};
use vpa_state::MemoryAttemptStore;
use vpa_types::{
    Container, DisruptionSettings, Pod, PodCondition, PodConditionType, Policy, UpdateMode,
};

pub const HOUR: Duration = Duration::from_secs(3600);
pub const MINUTE: Duration = Duration::from_secs(60);

/// Everything a pass needs, with handles kept for assertions.
pub struct Harness {
    pub factory: RestrictionFactory,
    pub client: FakePodClient,
    pub clock: FakeClock,
    pub attempts: MemoryAttemptStore,
    pub sink: RecordingEventSink,
    pub index: Arc<StaticWorkloadIndex>,
}

impl Harness {
    pub fn new(settings: DisruptionSettings) -> Self {
        let index = Arc::new(StaticWorkloadIndex::new());
        let client = FakePodClient::new();
        let clock = FakeClock::new(UNIX_EPOCH);
        let attempts = MemoryAttemptStore::new();
        let factory = RestrictionFactory::new(index.clone(), Arc::new(client.clone()))
            .with_clock(Arc::new(clock.clone()))
            .with_attempt_store(Arc::new(attempts.clone()))
            .with_settings(settings);
        Self {
            factory,
            client,
            clock,
            attempts,
            sink: RecordingEventSink::new(),
            index,
        }
    }

    pub fn with_tolerance(fraction: f64) -> Self {
        Self::new(DisruptionSettings {
            eviction_tolerance_fraction: fraction,
            ..Default::default()
        })
    }

    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    pub fn controller(&self, kind: ControllerKind, name: &str, replicas: i32) {
        self.index
            .upsert(ControllerRecord::with_replicas(kind, "default", name, replicas));
    }
}

pub fn app_container() -> Container {
    Container::new("app").with_request("cpu", "100m")
}

/// `n` running pods owned by `kind`/`owner`, each with an `app` container.
pub fn replicas(kind: &str, owner: &str, n: usize) -> Vec<Pod> {
    (0..n)
        .map(|i| {
            Pod::new("default", &format!("{owner}-{i}"))
                .with_controller(kind, owner)
                .with_container(app_container())
        })
        .collect()
}

pub fn policy(mode: UpdateMode) -> Policy {
    Policy::new("default", "vpa")
        .with_mode(mode)
        .with_recommendation("app", "cpu", "200m")
}

pub fn resizing(pod: Pod, condition: PodConditionType, reason: Option<&str>) -> Pod {
    pod.with_condition(PodCondition::active(condition, reason))
}

pub fn owner(kind: ControllerKind, name: &str) -> OwnerRef {
    OwnerRef {
        namespace: "default".to_string(),
        name: name.to_string(),
        kind,
    }
}

pub fn stats(groups: &GroupSet, kind: ControllerKind, name: &str) -> GroupStats {
    groups
        .stats(&owner(kind, name))
        .expect("group should have been built")
}

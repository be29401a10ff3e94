//! RestrictionFactory: owns the collaborators that outlive a pass.
//!
//! The outer loop builds the group maps once per reconciliation and asks
//! the factory for arbiters backed by them. The attempt store is the only
//! state carried from one pass to the next.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use vpa_state::{AttemptStore, MemoryAttemptStore, StateResult};
use vpa_types::{ConfigResult, DisruptionSettings, FeatureGates, Pod, PodKey, Policy, UpdaterConfig};

use crate::builder::GroupStatsBuilder;
use crate::client::PodClient;
use crate::clock::{Clock, SystemClock};
use crate::eviction::EvictionArbiter;
use crate::fallback::FallbackTimeouts;
use crate::group::GroupSet;
use crate::index::WorkloadIndex;
use crate::inplace::InPlaceArbiter;
use crate::patch::{PatchCalculator, default_calculators};

const DEFAULT_ATTEMPT_RETENTION: Duration = Duration::from_secs(30 * 60);

pub struct RestrictionFactory {
    index: Arc<dyn WorkloadIndex>,
    client: Arc<dyn PodClient>,
    calculators: Vec<Arc<dyn PatchCalculator>>,
    clock: Arc<dyn Clock>,
    attempts: Arc<dyn AttemptStore>,
    settings: DisruptionSettings,
    features: FeatureGates,
    timeouts: FallbackTimeouts,
    attempt_retention: Duration,
}

impl RestrictionFactory {
    /// A factory with default settings, the wall clock, and an in-memory
    /// attempt store.
    pub fn new(index: Arc<dyn WorkloadIndex>, client: Arc<dyn PodClient>) -> Self {
        Self {
            index,
            client,
            calculators: default_calculators(),
            clock: Arc::new(SystemClock),
            attempts: Arc::new(MemoryAttemptStore::new()),
            settings: DisruptionSettings::default(),
            features: FeatureGates::default(),
            timeouts: FallbackTimeouts::default(),
            attempt_retention: DEFAULT_ATTEMPT_RETENTION,
        }
    }

    /// Apply the budget, fallback, and feature sections of `config`.
    pub fn from_config(
        index: Arc<dyn WorkloadIndex>,
        client: Arc<dyn PodClient>,
        config: &UpdaterConfig,
    ) -> ConfigResult<Self> {
        let mut factory = Self::new(index, client);
        factory.settings = config.disruption.clone();
        factory.features = config.features.clone();
        factory.timeouts = FallbackTimeouts::from_settings(&config.fallback)?;
        factory.attempt_retention = config.fallback.attempt_retention()?;
        Ok(factory)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_attempt_store(mut self, attempts: Arc<dyn AttemptStore>) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_calculators(mut self, calculators: Vec<Arc<dyn PatchCalculator>>) -> Self {
        self.calculators = calculators;
        self
    }

    pub fn with_settings(mut self, settings: DisruptionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_features(mut self, features: FeatureGates) -> Self {
        self.features = features;
        self
    }

    pub fn with_timeouts(mut self, timeouts: FallbackTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn settings(&self) -> &DisruptionSettings {
        &self.settings
    }

    pub fn attempts(&self) -> &Arc<dyn AttemptStore> {
        &self.attempts
    }

    /// Group the candidates of one pass.
    pub fn build(&self, pods: &[Pod], policy: &Policy) -> GroupSet {
        let groups = GroupStatsBuilder::from_settings(self.index.clone(), &self.settings).build(pods, policy);
        debug!(
            policy = %policy.key(),
            candidates = pods.len(),
            groups = groups.len(),
            "group stats built"
        );
        groups
    }

    pub fn new_eviction_arbiter(&self, groups: &GroupSet) -> EvictionArbiter {
        EvictionArbiter::new(
            groups.clone(),
            self.client.clone(),
            self.attempts.clone(),
            self.clock.clone(),
            self.timeouts,
        )
    }

    pub fn new_in_place_arbiter(&self, groups: &GroupSet) -> InPlaceArbiter {
        InPlaceArbiter::new(
            groups.clone(),
            self.client.clone(),
            self.calculators.clone(),
            self.attempts.clone(),
            self.clock.clone(),
            self.timeouts,
        )
        .with_features(self.features.clone())
        .skip_disruption_budget(self.settings.in_place_skip_disruption_budget)
    }

    /// Forget attempts of pods that left the candidate set more than the
    /// retention interval ago.
    pub fn prune_attempts(&self, live_pods: impl IntoIterator<Item = PodKey>) -> StateResult<usize> {
        let live: HashSet<PodKey> = live_pods.into_iter().collect();
        let removed = self
            .attempts
            .prune(&live, self.clock.now(), self.attempt_retention)?;
        if removed > 0 {
            info!(removed, live = live.len(), "pruned stale in-place attempts");
        }
        Ok(removed)
    }
}

//! Fallback to eviction when an in-place resize stalls.

use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use vpa_state::AttemptStore;
use vpa_types::{FallbackSettings, Pod};

use crate::clock::Clock;
use crate::group::GroupStats;
use crate::status::{ResizeStatus, classify};

/// Default wait before a deferred resize falls back to eviction.
pub const DEFAULT_DEFERRED_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default wait before an in-progress resize falls back to eviction.
pub const DEFAULT_IN_PROGRESS_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackTimeouts {
    pub deferred: Duration,
    pub in_progress: Duration,
}

impl Default for FallbackTimeouts {
    fn default() -> Self {
        Self {
            deferred: DEFAULT_DEFERRED_TIMEOUT,
            in_progress: DEFAULT_IN_PROGRESS_TIMEOUT,
        }
    }
}

impl FallbackTimeouts {
    pub fn from_settings(settings: &FallbackSettings) -> vpa_types::ConfigResult<Self> {
        Ok(Self {
            deferred: settings.deferred_timeout()?,
            in_progress: settings.in_progress_timeout()?,
        })
    }
}

/// Whether a resize in the given state has waited long enough to give up on.
///
/// `elapsed` is `None` when no attempt was ever recorded, which counts as
/// having waited forever.
pub fn stall_fallback_due(
    status: ResizeStatus,
    elapsed: Option<Duration>,
    timeouts: &FallbackTimeouts,
) -> bool {
    let waited_longer_than = |timeout: Duration| elapsed.is_none_or(|t| t > timeout);
    match status {
        ResizeStatus::Infeasible | ResizeStatus::Error => true,
        ResizeStatus::Deferred => waited_longer_than(timeouts.deferred),
        ResizeStatus::InProgress => waited_longer_than(timeouts.in_progress),
    }
}

/// Time since the last recorded attempt for `key`.
///
/// A store read failure is logged and reported as `Err(())` so callers can
/// refuse to act on an unknown history.
pub(crate) fn elapsed_since_attempt(
    key: &str,
    attempts: &dyn AttemptStore,
    now: SystemTime,
) -> Result<Option<Duration>, ()> {
    match attempts.get(key) {
        Ok(at) => Ok(at.map(|at| now.duration_since(at).unwrap_or_default())),
        Err(e) => {
            warn!(pod = %key, error = %e, "failed to read in-place attempt time");
            Err(())
        }
    }
}

/// Whether a pod that is mid-resize should be evicted instead.
///
/// Eligibility alone is not enough: the group must still be disruptable.
pub fn can_evict_in_placing_pod(
    pod: &Pod,
    group: &GroupStats,
    attempts: &dyn AttemptStore,
    clock: &dyn Clock,
    timeouts: &FallbackTimeouts,
) -> bool {
    let key = pod.key();
    let status = classify(pod);
    let Ok(elapsed) = elapsed_since_attempt(&key, attempts, clock.now()) else {
        return false;
    };

    let due = stall_fallback_due(status, elapsed, timeouts);
    let disruptable = group.is_pod_disruptable();
    debug!(
        pod = %key,
        %status,
        elapsed_secs = elapsed.map(|t| t.as_secs()),
        due,
        disruptable,
        "stalled resize fallback"
    );
    due && disruptable
}

//! Resize status detection and classification.
//!
//! Newer kubelets report resize progress through the `PodResizePending` and
//! `PodResizeInProgress` conditions; older ones through the `status.resize`
//! string. Conditions win when both are present.

use std::fmt;

use serde::Serialize;

use vpa_types::{Pod, PodConditionType, REASON_DEFERRED, REASON_ERROR, REASON_INFEASIBLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResizeStatus {
    /// The kubelet postponed the resize and will retry.
    Deferred,
    InProgress,
    /// The node can never fit the requested shape.
    Infeasible,
    /// The kubelet failed to actuate the resize.
    Error,
}

impl fmt::Display for ResizeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResizeStatus::Deferred => "Deferred",
            ResizeStatus::InProgress => "InProgress",
            ResizeStatus::Infeasible => "Infeasible",
            ResizeStatus::Error => "Error",
        };
        f.write_str(s)
    }
}

/// True while the kubelet is processing, or has queued, a resize of this pod.
pub fn is_in_place_updating(pod: &Pod) -> bool {
    if !pod.status.resize.is_empty() {
        return true;
    }
    pod.status.conditions.iter().any(|c| {
        c.is_true()
            && matches!(
                c.condition_type,
                PodConditionType::PodResizePending | PodConditionType::PodResizeInProgress
            )
    })
}

/// Classify a pod's resize progress.
///
/// Unrecognised reasons fall through to `InProgress`, which only ever
/// waits for the longest timeout.
pub fn classify(pod: &Pod) -> ResizeStatus {
    if let Some(pending) = pod
        .condition(PodConditionType::PodResizePending)
        .filter(|c| c.is_true())
    {
        return match pending.reason.as_deref() {
            Some(REASON_DEFERRED) => ResizeStatus::Deferred,
            Some(REASON_INFEASIBLE) => ResizeStatus::Infeasible,
            _ => ResizeStatus::InProgress,
        };
    }

    if let Some(in_progress) = pod
        .condition(PodConditionType::PodResizeInProgress)
        .filter(|c| c.is_true())
    {
        return match in_progress.reason.as_deref() {
            Some(REASON_ERROR) => ResizeStatus::Error,
            _ => ResizeStatus::InProgress,
        };
    }

    match pod.status.resize.as_str() {
        "Deferred" => ResizeStatus::Deferred,
        "Infeasible" => ResizeStatus::Infeasible,
        _ => ResizeStatus::InProgress,
    }
}

//! User-visible event notifications.
//!
//! Only successful commits emit events. Rejected evictions and patches are
//! reported through logs alone, since the same pod is retried every pass.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

use vpa_types::{Pod, Policy};

/// Emitted on a pod after it was evicted.
pub const REASON_EVICTED_BY_VPA: &str = "EvictedByVPA";
/// Emitted on the policy object after one of its pods was evicted.
pub const REASON_EVICTED_POD: &str = "EvictedPod";
/// Emitted on a pod after its resources were patched in place.
pub const REASON_IN_PLACE_RESIZED: &str = "InPlaceResizedByVPA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// The object an event is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRef {
    pub kind: &'static str,
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn pod(pod: &Pod) -> Self {
        Self {
            kind: "Pod",
            namespace: pod.namespace().to_string(),
            name: pod.name().to_string(),
        }
    }

    pub fn policy(policy: &Policy) -> Self {
        Self {
            kind: "VerticalPodAutoscaler",
            namespace: policy.namespace.clone(),
            name: policy.name.clone(),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn event(&self, object: &ObjectRef, event_type: EventType, reason: &str, message: &str);
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn event(&self, object: &ObjectRef, event_type: EventType, reason: &str, message: &str) {
        info!(
            kind = object.kind,
            object = %format_args!("{}/{}", object.namespace, object.name),
            ?event_type,
            reason,
            message,
            "event"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    pub object: ObjectRef,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

/// Keeps every event in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn event(&self, object: &ObjectRef, event_type: EventType, reason: &str, message: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                object: object.clone(),
                event_type,
                reason: reason.to_string(),
                message: message.to_string(),
            });
    }
}

//! vpa-disruption — pod-group disruption control for the VPA updater.
//!
//! Decides, one candidate pod at a time, whether a replica may be evicted
//! or resized in place without taking its controller below the replica
//! floor it is willing to tolerate.
//!
//! # Flow
//!
//! ```text
//! RestrictionFactory::build(pods, policy) ──▶ GroupSet (one per pass)
//!        │
//!        ├─▶ new_eviction_arbiter(&groups) ──▶ can_evict / evict
//!        └─▶ new_in_place_arbiter(&groups) ──▶ can_in_place_update / in_place_update
//! ```
//!
//! Both arbiters share the `GroupSet`, so a commit by one is seen by the
//! next decision of either. The attempt store carries in-place attempt
//! times across passes and drives the stalled-resize fallback.
//!
//! # Modules
//!
//! - **`builder`**: groups candidates by controller and computes budgets
//! - **`group`**: per-group counters and the disruptability predicate
//! - **`eviction`** / **`inplace`**: the two arbiters
//! - **`fallback`** / **`status`**: resize classification and stall timeouts
//! - **`index`**, **`client`**, **`patch`**, **`clock`**, **`events`**: collaborator seams with in-memory implementations

pub mod builder;
pub mod client;
pub mod clock;
pub mod error;
pub mod events;
pub mod eviction;
pub mod factory;
pub mod fallback;
pub mod group;
pub mod index;
pub mod inplace;
pub mod owner;
pub mod patch;
pub mod status;

pub use builder::GroupStatsBuilder;
pub use client::{ClientFuture, ClientOp, ClientRequest, EvictionOptions, FakePodClient, PodClient};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ClientError, DisruptionError, DisruptionResult, IndexError, PatchError};
pub use events::{
    EventSink, EventType, ObjectRef, REASON_EVICTED_BY_VPA, REASON_EVICTED_POD,
    REASON_IN_PLACE_RESIZED, RecordedEvent, RecordingEventSink, TracingEventSink,
};
pub use eviction::EvictionArbiter;
pub use factory::RestrictionFactory;
pub use fallback::{FallbackTimeouts, can_evict_in_placing_pod, stall_fallback_due};
pub use group::{GroupSet, GroupStats};
pub use index::{ControllerRecord, StaticWorkloadIndex, WorkloadIndex};
pub use inplace::{InPlaceArbiter, InPlaceDecision, resize_is_non_disruptive};
pub use owner::{ControllerKind, OwnerRef, ResolveError, resolve_owner};
pub use patch::{
    IN_PLACE_UPDATED_ANNOTATION, InPlaceUpdatedAnnotationCalculator, PatchCalculator,
    ResourceRequestsCalculator, default_calculators, empty_annotations_patch,
};
pub use status::{ResizeStatus, classify, is_in_place_updating};

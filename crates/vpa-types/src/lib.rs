//! vpa-types — data model shared by the VPA updater crates.
//!
//! Only the pod and controller fields the disruption core actually reads
//! are modelled here. Everything is serde-serializable so snapshots can be
//! loaded from JSON for dry-run planning and tests.
//!
//! # Modules
//!
//! - **`pod`**: Pod, owner references, resize conditions, container resize policies
//! - **`policy`**: the autoscaler policy object (update mode, minReplicas, recommendations)
//! - **`patch`**: JSON-patch records and their target subresource
//! - **`config`**: `updater.toml` parsing and validation

pub mod config;
pub mod error;
pub mod patch;
pub mod pod;
pub mod policy;

pub use config::{
    DisruptionSettings, FallbackSettings, FeatureGates, StateSettings, UpdaterConfig,
    parse_duration,
};
pub use error::{ConfigError, ConfigResult};
pub use patch::{PatchOp, PatchRecord, PatchTarget, escape_pointer_segment};
pub use pod::*;
pub use policy::{ContainerRecommendation, Policy, UpdateMode, UpdatePolicy};

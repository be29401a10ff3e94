//! vpa-updater — front-end for the pod-group disruption core.
//!
//! The binary does not run a reconciliation loop. It validates
//! `updater.toml` files and dry-runs one pass over a JSON snapshot of pods
//! and controllers, printing what the arbiters would decide.

pub mod plan;

pub use plan::{GroupReport, PlanAction, PlanEntry, PlanReport, Snapshot, run_plan, seed_attempts};

//! vpa-state — cross-pass state for the VPA updater.
//!
//! The only state that survives a reconciliation pass is the time of the
//! last in-place resize attempt per pod. It is consulted when deciding
//! whether a stalled resize should fall back to eviction.
//!
//! Two backends implement [`AttemptStore`]:
//!
//! - [`MemoryAttemptStore`]: a mutex-guarded map, lost on restart
//! - [`RedbAttemptStore`]: a [redb](https://docs.rs/redb) table, so a
//!   restarted updater still knows how long a resize has been stuck
//!
//! Keys are pod keys (`{namespace}/{name}`); values are unix milliseconds.

pub mod error;
pub mod memory;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use memory::MemoryAttemptStore;
pub use store::{AttemptStore, RedbAttemptStore};

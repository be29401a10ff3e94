//! redb table definitions for the attempt store.

use redb::TableDefinition;

/// Last in-place resize attempt keyed by `{namespace}/{name}`, in unix milliseconds.
pub const INPLACE_ATTEMPTS: TableDefinition<&str, u64> = TableDefinition::new("inplace_attempts");

//! Ordered, replayable schema migration operations.
//!
//! Each operation moves between `pending` and `applied` via `run()` and
//! (where reversible) `reverse_run()`. An external migration runner
//! sequences operations and records which have been applied.

mod operations;

pub use operations::{
    CreateIndex, DeleteIndex, MigrationContext, MigrationOperation, ReverseParams,
    UpdateIndexMapping,
};

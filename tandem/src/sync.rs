//! Index sync helpers driving a live primary-to-secondary migration:
//! tune the secondary, launch the engine-side copy, watch it, and clean
//! up once the roles swap.

use tracing::info;

use crate::client::{ClusterManager, ReindexParams, TaskRecord};
use crate::error::{Error, Result};
use crate::progress::TaskTracker;
use crate::registry::Registry;

pub struct SyncUtil<'a> {
    registry: &'a Registry,
    manager: &'a ClusterManager,
}

impl<'a> SyncUtil<'a> {
    pub fn new(registry: &'a Registry, manager: &'a ClusterManager) -> Self {
        Self { registry, manager }
    }

    /// Begin syncing a multiplexed family: tune the secondary index for
    /// bulk loading and start the engine-side copy from primary to
    /// secondary. Returns the engine task id for `status`/`cancel`.
    pub fn start(&self, canonical_name: &str) -> Result<String> {
        let mux = self.registry.multiplexed(canonical_name)?;
        let source = mux.primary.index_name();
        let dest = mux.secondary.index_name();
        self.manager.index_configure_for_reindex(dest)?;
        let task_id = self
            .manager
            .reindex(source, dest, &ReindexParams::default())?
            .ok_or_else(|| Error::Engine("reindex returned no task id".into()))?;
        info!(canonical_name, source, dest, task_id = %task_id, "index sync started");
        Ok(task_id)
    }

    /// One status snapshot for a sync task.
    pub fn status(&self, task_id: &str) -> Result<TaskRecord> {
        self.manager.get_task(task_id)
    }

    /// Block until a sync task completes, reporting progress.
    pub fn watch(&self, task_id: &str) -> Result<TaskRecord> {
        TaskTracker::new(self.manager, task_id).wait()
    }

    pub fn cancel(&self, task_id: &str) -> Result<TaskRecord> {
        self.manager.cancel_task(task_id)
    }

    /// Delete tombstones from the secondary index. Run after the
    /// secondary has become primary and dual-writes have stopped.
    pub fn cleanup(&self, canonical_name: &str) -> Result<u64> {
        let mux = self.registry.multiplexed(canonical_name)?;
        let deleted = mux.secondary.delete_tombstones()?;
        info!(canonical_name, deleted, "tombstones removed from secondary");
        Ok(deleted)
    }

    /// Restore standard serving settings on the secondary once the copy
    /// has caught up.
    pub fn finalize(&self, canonical_name: &str) -> Result<()> {
        let mux = self.registry.multiplexed(canonical_name)?;
        let dest = mux.secondary.index_name();
        self.manager.index_configure_for_standard_ops(dest)?;
        self.manager.index_refresh(dest)?;
        info!(canonical_name, index = dest, "index sync finalized");
        Ok(())
    }
}

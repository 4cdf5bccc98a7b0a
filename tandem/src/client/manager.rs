//! Cluster manager: the single point of contact with the engine for
//! index lifecycle, mapping, settings, reindex, and task bookkeeping.
//! Not a document adapter; it never touches document content.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::{validate_single_index, VersionCache};
use crate::error::{Error, Result};
use crate::transport::{Method, Transport, TransportError};

/// Settings applied while an index is a reindex target: no refreshes, no
/// replication traffic.
fn reindex_settings() -> Value {
    json!({
        "index.refresh_interval": "-1",
        "index.number_of_replicas": "0",
    })
}

/// Settings for standard serving after a reindex completes.
fn standard_settings() -> Value {
    json!({
        "index.refresh_interval": "1s",
        "index.number_of_replicas": "1",
    })
}

/// Progress counters reported by the engine for a long-running task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub deleted: u64,
}

impl TaskStatus {
    /// Documents processed so far.
    pub fn progress(&self) -> u64 {
        self.created + self.updated + self.deleted
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.progress())
    }
}

/// A single task record parsed out of the engine's heterogeneous task
/// response shapes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub running_time_in_nanos: u64,
}

/// Options for [`ClusterManager::reindex`].
#[derive(Debug, Clone)]
pub struct ReindexParams {
    /// Block until the copy finishes instead of returning a task handle.
    pub wait_for_completion: bool,
    pub refresh: bool,
    /// Scroll batch size used by the engine-side copy. 1000 is the
    /// engine default and recommended maximum.
    pub batch_size: u64,
    /// Throttle, in index sub-requests per second.
    pub requests_per_second: Option<u64>,
    /// Inject a script that mirrors `_id` into the `doc_id` source field
    /// for documents that predate the id-mirroring transform.
    pub copy_doc_ids: bool,
}

impl Default for ReindexParams {
    fn default() -> Self {
        Self {
            wait_for_completion: false,
            refresh: false,
            batch_size: 1000,
            requests_per_second: None,
            copy_doc_ids: true,
        }
    }
}

pub struct ClusterManager {
    transport: Arc<dyn Transport>,
    version: Arc<VersionCache>,
}

impl ClusterManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            version: VersionCache::new(),
        }
    }

    /// Share a version cache with adapters bound to the same cluster.
    pub fn with_version_cache(mut self, version: Arc<VersionCache>) -> Self {
        self.version = version;
        self
    }

    /// Engine server info (cluster root document).
    pub fn info(&self) -> Result<Value> {
        self.transport
            .send(Method::Get, "", &[], None)
            .map_err(|e| Error::Engine(format!("Elasticsearch is unavailable: {e}")))
    }

    pub fn ping(&self) -> bool {
        self.info().is_ok()
    }

    /// Dotted engine version, cached for the process lifetime.
    pub fn elastic_version(&self) -> Result<Vec<u64>> {
        self.version.get(self.transport.as_ref())
    }

    pub fn elastic_major_version(&self) -> Result<u64> {
        self.version.major(self.transport.as_ref())
    }

    /// Drop the cached version. The cache is never invalidated
    /// implicitly.
    pub fn reset_version_cache(&self) {
        self.version.reset();
    }

    pub fn index_exists(&self, index: &str) -> Result<bool> {
        validate_single_index(index)?;
        match self.transport.send(Method::Head, index, &[], None) {
            Ok(_) => Ok(true),
            Err(TransportError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Create a new index. Not idempotent: an already-exists failure from
    /// the engine propagates; check `index_exists` first if needed.
    pub fn index_create(&self, index: &str, metadata: Option<&Value>) -> Result<()> {
        validate_single_index(index)?;
        self.transport.send(Method::Put, index, &[], metadata)?;
        Ok(())
    }

    pub fn index_delete(&self, index: &str) -> Result<()> {
        validate_single_index(index)?;
        match self.transport.send(Method::Delete, index, &[], None) {
            Ok(_) => Ok(()),
            Err(TransportError::NotFound { .. }) => {
                Err(Error::NotFound(format!("index {index:?}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn index_refresh(&self, index: &str) -> Result<()> {
        self.indices_refresh(&[index])
    }

    pub fn indices_refresh(&self, indices: &[&str]) -> Result<()> {
        for index in indices {
            validate_single_index(index)?;
        }
        let path = format!("{}/_refresh", indices.join(","));
        self.transport.send(Method::Post, &path, &[], None)?;
        Ok(())
    }

    pub fn index_flush(&self, index: &str) -> Result<()> {
        validate_single_index(index)?;
        self.transport
            .send(Method::Post, &format!("{index}/_flush"), &[], None)?;
        Ok(())
    }

    pub fn index_close(&self, index: &str) -> Result<()> {
        validate_single_index(index)?;
        self.transport
            .send(Method::Post, &format!("{index}/_close"), &[], None)?;
        Ok(())
    }

    /// Assign `name` as an alias of `index`, removing it from any other
    /// index in the same request. The remove+add pair is atomic on the
    /// server side, so the alias never points at two indices and never
    /// vanishes momentarily.
    pub fn index_put_alias(&self, index: &str, name: &str) -> Result<()> {
        validate_single_index(index)?;
        validate_single_index(name)?;
        let body = json!({"actions": [
            {"remove": {"index": "_all", "alias": name}},
            {"add": {"index": index, "alias": name}},
        ]});
        self.transport
            .send(Method::Post, "_aliases", &[], Some(&body))?;
        Ok(())
    }

    /// All cluster aliases as `{alias: [index, …]}`.
    pub fn get_aliases(&self) -> Result<HashMap<String, Vec<String>>> {
        let response = self.transport.send(Method::Get, "_alias", &[], None)?;
        let mut aliases: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(indices) = response.as_object() {
            for (index, info) in indices {
                let names = info
                    .get("aliases")
                    .and_then(Value::as_object)
                    .map(|a| a.keys().cloned().collect::<Vec<_>>())
                    .unwrap_or_default();
                for name in names {
                    aliases.entry(name).or_default().push(index.clone());
                }
            }
        }
        Ok(aliases)
    }

    pub fn index_set_replicas(&self, index: &str, replicas: u64) -> Result<()> {
        self.index_put_settings(index, &json!({"index.number_of_replicas": replicas}))
    }

    /// Tune an index for being a reindex target.
    pub fn index_configure_for_reindex(&self, index: &str) -> Result<()> {
        self.index_put_settings(index, &reindex_settings())
    }

    /// Restore standard serving settings after a reindex.
    pub fn index_configure_for_standard_ops(&self, index: &str) -> Result<()> {
        self.index_put_settings(index, &standard_settings())
    }

    fn index_put_settings(&self, index: &str, settings: &Value) -> Result<()> {
        validate_single_index(index)?;
        let keys: Vec<&String> = settings
            .as_object()
            .map(|o| o.keys().collect())
            .unwrap_or_default();
        let valid = keys == vec!["index"] || keys.iter().all(|k| k.starts_with("index."));
        if keys.is_empty() || !valid {
            return Err(Error::Validation(format!("invalid index settings: {settings}")));
        }
        self.transport
            .send(Method::Put, &format!("{index}/_settings"), &[], Some(settings))?;
        Ok(())
    }

    /// Update the mapping for a doc type. The engine's acknowledgement
    /// flag must be present and true; some versions return success
    /// without it, and that is treated as a failed update, not a silent
    /// success.
    pub fn index_put_mapping(&self, index: &str, doc_type: &str, mapping: &Value) -> Result<()> {
        validate_single_index(index)?;
        let path = format!("{index}/_mapping/{doc_type}");
        let response = self
            .transport
            .send(Method::Put, &path, &[], Some(mapping))?;
        if response.get("acknowledged").and_then(Value::as_bool) != Some(true) {
            return Err(Error::MappingUpdateFailed {
                index: index.to_string(),
                response,
            });
        }
        Ok(())
    }

    /// The live mapping for a doc type, or `None` when the index exists
    /// but carries no mapping.
    pub fn index_get_mapping(&self, index: &str, doc_type: &str) -> Result<Option<Value>> {
        validate_single_index(index)?;
        let path = format!("{index}/_mapping/{doc_type}");
        let response = self.transport.send(Method::Get, &path, &[], None)?;
        Ok(response
            .get(index)
            .and_then(|data| data.get("mappings"))
            .and_then(|mappings| mappings.get(doc_type))
            .cloned())
    }

    /// Current settings for an index. With `values`, only the named
    /// settings are returned; a requested setting that is absent is an
    /// error.
    pub fn index_get_settings(
        &self,
        index: &str,
        values: Option<&[&str]>,
    ) -> Result<Map<String, Value>> {
        validate_single_index(index)?;
        let response = self
            .transport
            .send(Method::Get, &format!("{index}/_settings"), &[], None)?;
        let settings = response
            .get(index)
            .and_then(|data| data.get("settings"))
            .and_then(|settings| settings.get("index"))
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| Error::Engine(format!("invalid settings response: {response}")))?;
        match values {
            None => Ok(settings),
            Some(keys) => {
                let mut filtered = Map::new();
                for key in keys {
                    let value = settings.get(*key).ok_or_else(|| {
                        Error::Engine(format!("no setting {key:?} for index {index:?}"))
                    })?;
                    filtered.insert(key.to_string(), value.clone());
                }
                Ok(filtered)
            }
        }
    }

    /// Start an engine-side copy of `source` into `dest`.
    ///
    /// Existing documents in `dest` are never overwritten
    /// (`op_type=create`) and version conflicts are skipped rather than
    /// failed (`conflicts=proceed`). Returns the task id unless
    /// `wait_for_completion` was set.
    pub fn reindex(&self, source: &str, dest: &str, params: &ReindexParams) -> Result<Option<String>> {
        validate_single_index(source)?;
        validate_single_index(dest)?;
        let mut body = json!({
            "source": {"index": source, "size": params.batch_size},
            "dest": {"index": dest, "op_type": "create", "version_type": "external"},
            "conflicts": "proceed",
        });
        if params.copy_doc_ids {
            body["script"] = json!({
                "lang": "painless",
                "source": "if (!ctx._source.containsKey('doc_id')) \
                           { ctx._source['doc_id'] = ctx._id; }",
            });
        }
        let mut query = vec![
            ("wait_for_completion", params.wait_for_completion.to_string()),
            ("refresh", params.refresh.to_string()),
        ];
        if let Some(rps) = params.requests_per_second {
            query.push(("requests_per_second", rps.to_string()));
        }
        let response = self
            .transport
            .send(Method::Post, "_reindex", &query, Some(&body))?;
        if params.wait_for_completion {
            return Ok(None);
        }
        let task = response
            .get("task")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::Engine(format!("reindex returned no task id: {response}")))?;
        Ok(Some(task))
    }

    /// Details for an active task.
    pub fn get_task(&self, task_id: &str) -> Result<TaskRecord> {
        let response = match self
            .transport
            .send(Method::Get, &format!("_tasks/{task_id}"), &[], None)
        {
            Ok(response) => response,
            Err(TransportError::NotFound { reason, .. }) => {
                return Err(Error::TaskMissing(format!("{task_id}: {reason}")))
            }
            Err(err) => return Err(err.into()),
        };
        let task = response
            .get("task")
            .ok_or_else(|| Error::Task(response.clone()))?;
        let mut record: TaskRecord = serde_json::from_value(task.clone())
            .map_err(|_| Error::Task(response.clone()))?;
        record.completed = response
            .get("completed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(record)
    }

    /// Cancel a running task.
    pub fn cancel_task(&self, task_id: &str) -> Result<TaskRecord> {
        let response = self.transport.send(
            Method::Post,
            &format!("_tasks/{task_id}/_cancel"),
            &[],
            None,
        )?;
        let tasks = parse_task_result(&response, true)?;
        // return_one guarantees exactly one entry
        Ok(tasks.into_values().next().unwrap_or_default())
    }
}

/// Parse a `/_tasks` style response into task records keyed by task id.
///
/// The engine reports tasks nested under `nodes.<node>.tasks`, and
/// failures under `node_failures`. With `return_one`, exactly one task
/// must be present; a multi-task response raises `Task`. A lone
/// `resource_not_found_exception` node failure raises `TaskMissing`;
/// every other unrecognized shape raises `Task`.
pub(crate) fn parse_task_result(
    result: &Value,
    return_one: bool,
) -> Result<HashMap<String, TaskRecord>> {
    let mut tasks = HashMap::new();
    for info in result
        .get("nodes")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|nodes| nodes.values())
    {
        for (task_id, details) in info
            .get("tasks")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
        {
            let record: TaskRecord = serde_json::from_value(details.clone())
                .map_err(|_| Error::Task(result.clone()))?;
            tasks.insert(task_id.clone(), record);
        }
    }
    if !tasks.is_empty() && (!return_one || tasks.len() == 1) {
        return Ok(tasks);
    }
    if let Some(failures) = result.get("node_failures").and_then(Value::as_array) {
        if let [failure] = failures.as_slice() {
            let cause = failure.get("caused_by");
            if failure.get("type").and_then(Value::as_str) == Some("failed_node_exception")
                && cause.and_then(|c| c.get("type")).and_then(Value::as_str)
                    == Some("resource_not_found_exception")
            {
                return Err(Error::TaskMissing(
                    cause
                        .and_then(|c| c.get("reason"))
                        .and_then(Value::as_str)
                        .unwrap_or("resource_not_found_exception")
                        .to_string(),
                ));
            }
        }
    }
    Err(Error::Task(result.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_details(id: &str) -> Value {
        json!({
            "node": "n1",
            "id": 12345,
            "action": "indices:data/write/reindex",
            "status": {"total": 100, "created": 40, "updated": 5, "deleted": 0},
            "description": format!("reindex task {id}"),
            "running_time_in_nanos": 1_000_000u64,
        })
    }

    #[test]
    fn parse_single_task_result() {
        let result = json!({"nodes": {"n1": {"tasks": {"n1:1": task_details("n1:1")}}}});
        let tasks = parse_task_result(&result, true).unwrap();
        assert_eq!(tasks.len(), 1);
        let record = &tasks["n1:1"];
        assert_eq!(record.status.progress(), 45);
        assert_eq!(record.status.remaining(), 55);
    }

    #[test]
    fn multiple_tasks_with_return_one_is_an_error() {
        let result = json!({"nodes": {"n1": {"tasks": {
            "n1:1": task_details("n1:1"),
            "n1:2": task_details("n1:2"),
        }}}});
        assert!(matches!(
            parse_task_result(&result, true),
            Err(Error::Task(_))
        ));
        let all = parse_task_result(&result, false).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn missing_task_failure_shape() {
        let result = json!({"node_failures": [{
            "type": "failed_node_exception",
            "caused_by": {
                "type": "resource_not_found_exception",
                "reason": "task [n1:99] isn't running and hasn't stored its results",
            },
        }]});
        assert!(matches!(
            parse_task_result(&result, true),
            Err(Error::TaskMissing(_))
        ));
    }

    #[test]
    fn malformed_task_details_are_a_task_error() {
        let result = json!({"nodes": {"n1": {"tasks": {
            "n1:1": {"status": {"total": "many"}},
        }}}});
        assert!(matches!(
            parse_task_result(&result, true),
            Err(Error::Task(_))
        ));
    }

    #[test]
    fn unrecognized_shape_is_a_task_error() {
        assert!(matches!(
            parse_task_result(&json!({"what": "is this"}), true),
            Err(Error::Task(_))
        ));
        let odd_failure = json!({"node_failures": [{"type": "sharknado"}]});
        assert!(matches!(
            parse_task_result(&odd_failure, true),
            Err(Error::Task(_))
        ));
    }
}

//! Dual-write multiplex adapter.
//!
//! During a live index migration, writes go to both the primary and the
//! secondary index while reads come from the primary only. The secondary
//! may lag behind the primary (it was only recently introduced), so a
//! delete that finds nothing on the secondary leaves a tombstone there
//! instead; a later reindex from primary to secondary then cannot
//! resurrect the deleted document (`op_type=create` never overwrites).

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::warn;

use crate::client::bulk::{BulkAction, BulkOp, RenderedAction};
use crate::client::document::{
    collect_bulk_result, item_error, DocumentAdapter, Scroll, UpdateParams, WireDocument,
};
use crate::client::refresh_value;
use crate::error::{Error, Result};
use crate::transport::TransportError;

/// Bulk chunks are rendered against both indices, so 250 logical actions
/// become (up to) 500 wire actions per request.
const BULK_CHUNK: usize = 250;

/// Marker document written to the secondary index to record a delete
/// that happened while the secondary had no copy of the document.
pub struct Tombstone;

impl Tombstone {
    pub const PROPERTY_NAME: &'static str = "__is_tombstone__";

    pub fn source() -> Value {
        json!({(Self::PROPERTY_NAME): true})
    }
}

pub struct MultiplexAdapter {
    pub primary: DocumentAdapter,
    pub secondary: DocumentAdapter,
}

impl MultiplexAdapter {
    pub fn new(primary: DocumentAdapter, secondary: DocumentAdapter) -> Self {
        // both sides must render application documents identically
        let secondary = secondary.with_transform(primary.transform());
        Self { primary, secondary }
    }

    pub fn index_name(&self) -> &str {
        &self.primary.index_name
    }

    pub fn canonical_name(&self) -> &str {
        &self.primary.canonical_name
    }

    // Reads are pass-throughs on the primary; the secondary is never
    // consulted.

    pub fn from_app(&self, doc: &Value) -> Result<(String, WireDocument)> {
        self.primary.from_app(doc)
    }

    pub fn to_json(&self, doc: &Value) -> Result<Value> {
        self.primary.to_json(doc)
    }

    pub fn exists(&self, doc_id: &str) -> Result<bool> {
        self.primary.exists(doc_id)
    }

    pub fn get(&self, doc_id: &str, source_includes: Option<&[&str]>) -> Result<Value> {
        self.primary.get(doc_id, source_includes)
    }

    pub fn get_docs(&self, doc_ids: &[String]) -> Result<Vec<Value>> {
        self.primary.get_docs(doc_ids)
    }

    pub fn iter_docs<'a>(
        &'a self,
        doc_ids: &'a [String],
        chunk_size: usize,
    ) -> impl Iterator<Item = Result<Value>> + 'a {
        self.primary.iter_docs(doc_ids, chunk_size)
    }

    pub fn count(&self, query: &Value) -> Result<u64> {
        self.primary.count(query)
    }

    pub fn search(&self, query: &Value) -> Result<Value> {
        self.primary.search(query)
    }

    pub fn scroll(
        &self,
        query: &Value,
        keepalive: Option<&str>,
        size: Option<u64>,
    ) -> Result<Scroll<'_>> {
        self.primary.scroll(query, keepalive, size)
    }

    /// Index into both indices via `bulk()` so both writes travel in a
    /// single wire request. Fan-out failures surface as transport
    /// errors, the same as any other write failure.
    pub fn index(&self, doc: &Value, refresh: bool) -> Result<()> {
        match self.bulk(&[BulkAction::index(doc.clone())], refresh, true) {
            Ok(_) => Ok(()),
            Err(Error::BulkIndex { errors }) => Err(bulk_error_to_transport(&errors).into()),
            Err(err) => Err(err),
        }
    }

    /// Delete from both indices via `bulk()`. On the secondary the
    /// document is deleted if present, or a tombstone is written if
    /// absent. Deleting a document absent from both indices is not an
    /// error; the final state is what the caller asked for.
    pub fn delete(&self, doc_id: &str, refresh: bool) -> Result<()> {
        match self.bulk(&[BulkAction::delete_id(doc_id)], refresh, true) {
            Ok(_) => Ok(()),
            Err(Error::BulkIndex { errors }) => Err(bulk_error_to_transport(&errors).into()),
            Err(err) => Err(err),
        }
    }

    /// Update on the primary, fetching the full post-update document,
    /// then apply that exact document as an upsert on the secondary.
    /// Partial update and upsert are different operations, but applying
    /// the primary's result guarantees eventual parity even though the
    /// secondary never saw the original value.
    pub fn update(&self, doc_id: &str, fields: &Value, params: &UpdateParams) -> Result<Option<Value>> {
        let mut on_primary = params.clone();
        on_primary.return_doc = true;
        let full_doc = self
            .primary
            .update(doc_id, fields, &on_primary)?
            .ok_or_else(|| {
                Error::Engine(format!("update of {doc_id:?} did not return the document"))
            })?;
        let on_secondary = UpdateParams {
            // never refreshed: the secondary is not read from
            refresh: false,
            return_doc: false,
            retry_on_conflict: params.retry_on_conflict,
            upsert: true,
        };
        self.secondary.update(doc_id, &full_doc, &on_secondary)?;
        Ok(params.return_doc.then_some(full_doc))
    }

    pub fn bulk_index(&self, docs: &[Value], refresh: bool, raise_errors: bool) -> Result<(usize, Vec<Value>)> {
        let actions: Vec<BulkAction> = docs.iter().cloned().map(BulkAction::index).collect();
        self.bulk(&actions, refresh, raise_errors)
    }

    pub fn bulk_delete(&self, doc_ids: &[String], refresh: bool, raise_errors: bool) -> Result<(usize, Vec<Value>)> {
        let actions: Vec<BulkAction> = doc_ids.iter().cloned().map(BulkAction::delete_id).collect();
        self.bulk(&actions, refresh, raise_errors)
    }

    /// Apply bulk actions to both indices.
    ///
    /// Actions are pruned per document id first (see
    /// [`MultiplexAdapter::pruned_actions`]), then rendered against both
    /// indices in chunks of 250 logical actions and sent as single wire
    /// requests. A per-item delete failure with status 404 is not an
    /// error: on the primary the target was already absent, and on the
    /// secondary it triggers a tombstone write instead.
    pub fn bulk(
        &self,
        actions: &[BulkAction],
        refresh: bool,
        raise_errors: bool,
    ) -> Result<(usize, Vec<Value>)> {
        let pruned = self.pruned_actions(actions)?;
        let mut success_count = 0;
        let mut errors: Vec<Value> = Vec::new();
        for chunk in pruned.chunks(BULK_CHUNK) {
            let mut lines = Vec::new();
            for action in chunk {
                self.primary
                    .render_bulk_action(action, true)?
                    .push_lines(&mut lines);
                self.secondary
                    .render_bulk_action(action, true)?
                    .push_lines(&mut lines);
            }
            let result = self.primary.transport().send_bulk(
                "_bulk",
                &[("refresh", refresh_value(refresh))],
                &lines,
            )?;
            let (_, chunk_errors) = collect_bulk_result(&result, false)?;

            let mut tombstone_ids = Vec::new();
            let mut real_errors: HashMap<String, Value> = HashMap::new();
            for item in chunk_errors {
                let Some((doc_id, index_name, op, status)) = parse_bulk_error(&item) else {
                    real_errors.insert(item.to_string(), item);
                    continue;
                };
                if op == "delete" && status == 404 {
                    // already absent; not an error
                    if index_name == self.secondary.index_name {
                        tombstone_ids.push(doc_id);
                    }
                    continue;
                }
                real_errors.entry(doc_id).or_insert(item);
            }

            if !tombstone_ids.is_empty() {
                warn!(
                    index = %self.secondary.index_name,
                    count = tombstone_ids.len(),
                    "writing tombstones for deletes absent from secondary"
                );
                let mut tombstone_lines = Vec::new();
                for doc_id in &tombstone_ids {
                    self.render_tombstone(doc_id).push_lines(&mut tombstone_lines);
                }
                let result = self.primary.transport().send_bulk(
                    "_bulk",
                    &[("refresh", refresh_value(refresh))],
                    &tombstone_lines,
                )?;
                // a delete whose tombstone write failed is a failed delete
                let (_, tombstone_errors) = collect_bulk_result(&result, false)?;
                for item in tombstone_errors {
                    match parse_bulk_error(&item) {
                        Some((doc_id, _, _, _)) => {
                            real_errors.entry(doc_id).or_insert(item);
                        }
                        None => {
                            real_errors.insert(item.to_string(), item);
                        }
                    }
                }
            }

            success_count += chunk.len() - real_errors.len();
            errors.extend(real_errors.into_values());
            if raise_errors && !errors.is_empty() {
                return Err(Error::BulkIndex { errors });
            }
        }
        Ok((success_count, errors))
    }

    /// One-pass, in-order pruning of redundant actions per document id.
    ///
    /// An `index` action supersedes all prior actions for the same id; a
    /// `delete` supersedes previous deletes but not index actions. Per
    /// id, the survivors are one of: the last delete, the last index, or
    /// the last index followed by a trailing delete (an index action
    /// implies tombstone cleanup that a later delete must still
    /// perform). Original relative order is preserved.
    pub fn pruned_actions(&self, actions: &[BulkAction]) -> Result<Vec<BulkAction>> {
        #[derive(Default)]
        struct Slot {
            index: Option<(usize, BulkAction)>,
            delete: Option<(usize, BulkAction)>,
        }
        let mut by_id: HashMap<String, Slot> = HashMap::new();
        for (seq, action) in actions.iter().enumerate() {
            // Render to get the document id; either side's rendering
            // works, they share the transform.
            let rendered = self.primary.render_bulk_action(action, true)?;
            let slot = by_id.entry(rendered.doc_id).or_default();
            match rendered.op {
                BulkOp::Index => {
                    slot.index = Some((seq, action.clone()));
                    slot.delete = None;
                }
                BulkOp::Delete => {
                    slot.delete = Some((seq, action.clone()));
                }
            }
        }
        let mut survivors: Vec<(usize, BulkAction)> = by_id
            .into_values()
            .flat_map(|slot| slot.index.into_iter().chain(slot.delete))
            .collect();
        survivors.sort_by_key(|(seq, _)| *seq);
        Ok(survivors.into_iter().map(|(_, action)| action).collect())
    }

    fn render_tombstone(&self, doc_id: &str) -> RenderedAction {
        RenderedAction {
            op: BulkOp::Index,
            doc_id: doc_id.to_string(),
            index_name: self.secondary.index_name.clone(),
            meta: json!({"index": {
                "_index": self.secondary.index_name,
                "_type": self.secondary.doc_type,
                "_id": doc_id,
            }}),
            source: Some(Tombstone::source()),
        }
    }
}

/// Extract `(doc_id, index_name, op, status)` from a failed bulk item.
fn parse_bulk_error(item: &Value) -> Option<(String, String, String, u64)> {
    let (op, inner) = item.as_object()?.iter().next()?;
    let doc_id = inner.get("_id")?.as_str()?.to_string();
    let index_name = inner.get("_index")?.as_str()?.to_string();
    let status = inner.get("status").and_then(Value::as_u64).unwrap_or(0);
    Some((doc_id, index_name, op.clone(), status))
}

/// Translate the first bulk item failure into the generic transport
/// error type, so fan-out failures look like any other write failure.
fn bulk_error_to_transport(errors: &[Value]) -> TransportError {
    let inner = errors.first().and_then(item_error).cloned().unwrap_or(Value::Null);
    let status = inner.get("status").and_then(Value::as_u64).unwrap_or(500) as u16;
    let reason = inner
        .get("error")
        .and_then(|e| e.get("reason"))
        .and_then(Value::as_str)
        .unwrap_or("bulk write failed")
        .to_string();
    TransportError::Request {
        status,
        reason,
        body: inner,
    }
}

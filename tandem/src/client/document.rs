//! Per-entity document adapter.
//!
//! A [`DocumentAdapter`] is the typed façade between application
//! documents and one physical index + doc type. Id and source validation
//! always runs before any network call, so caller bugs fail fast instead
//! of after a partial batch has been applied.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::client::bulk::{BulkAction, BulkOp, RenderedAction};
use crate::client::multiplex::Tombstone;
use crate::client::{
    refresh_value, validate_single_index, VersionCache, SCROLL_KEEPALIVE, SCROLL_SIZE,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::transport::{HttpTransport, Method, Transport, TransportError};

/// On-the-wire document body. Never contains the `_id` field; the id
/// travels out of band.
pub type WireDocument = Map<String, Value>;

/// Seam between application documents and their wire form.
pub trait DocumentTransform: Send + Sync {
    /// Split an application document into `(doc_id, source)`.
    ///
    /// Pure function, no I/O. The returned source must not contain the
    /// `_id` key.
    fn from_app(&self, doc: &Value) -> Result<(String, WireDocument)>;
}

/// Default transform: the document's `_id` becomes the out-of-band id
/// and is mirrored into a `doc_id` source field so reindexed copies keep
/// their identity.
pub struct IdFieldTransform;

impl DocumentTransform for IdFieldTransform {
    fn from_app(&self, doc: &Value) -> Result<(String, WireDocument)> {
        let object = doc
            .as_object()
            .ok_or_else(|| Error::Validation(format!("expected document object, got: {doc}")))?;
        let doc_id = match object.get("_id") {
            Some(Value::String(id)) => id.clone(),
            other => {
                return Err(Error::Validation(format!(
                    "invalid document _id value: {other:?}"
                )))
            }
        };
        let mut source = object.clone();
        source.remove("_id");
        source.insert("doc_id".to_string(), Value::String(doc_id.clone()));
        Ok((doc_id, source))
    }
}

/// Options for [`DocumentAdapter::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateParams {
    pub refresh: bool,
    /// Fetch and return the full post-update document. Only supported on
    /// a subset of engine protocol versions; without it the caller
    /// accepts "no verified post-state".
    pub return_doc: bool,
    pub retry_on_conflict: Option<u32>,
    /// Create the document if it does not exist. Only needed for
    /// multiplexing; use `index()` instead.
    pub upsert: bool,
}

/// Adapter between one entity type and one physical index + doc type.
///
/// Stateless with respect to documents: nothing is cached client-side.
pub struct DocumentAdapter {
    transport: Arc<dyn Transport>,
    version: Arc<VersionCache>,
    transform: Arc<dyn DocumentTransform>,
    pub index_name: String,
    pub doc_type: String,
    pub canonical_name: String,
    pub mapping: Value,
    pub analysis: Value,
    pub settings_key: Option<String>,
}

impl fmt::Debug for DocumentAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentAdapter")
            .field("index_name", &self.index_name)
            .field("doc_type", &self.doc_type)
            .field("canonical_name", &self.canonical_name)
            .finish()
    }
}

impl Clone for DocumentAdapter {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            version: Arc::clone(&self.version),
            transform: Arc::clone(&self.transform),
            index_name: self.index_name.clone(),
            doc_type: self.doc_type.clone(),
            canonical_name: self.canonical_name.clone(),
            mapping: self.mapping.clone(),
            analysis: self.analysis.clone(),
            settings_key: self.settings_key.clone(),
        }
    }
}

impl DocumentAdapter {
    pub fn new(
        transport: Arc<dyn Transport>,
        index_name: impl Into<String>,
        doc_type: impl Into<String>,
        canonical_name: impl Into<String>,
        mapping: Value,
    ) -> Result<Self> {
        let index_name = index_name.into();
        validate_single_index(&index_name)?;
        Ok(Self {
            transport,
            version: VersionCache::new(),
            transform: Arc::new(IdFieldTransform),
            index_name,
            doc_type: doc_type.into(),
            canonical_name: canonical_name.into(),
            mapping,
            analysis: Value::Null,
            settings_key: None,
        })
    }

    pub fn with_analysis(mut self, analysis: Value) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_settings_key(mut self, settings_key: impl Into<String>) -> Self {
        self.settings_key = Some(settings_key.into());
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn DocumentTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Share a version cache with other adapters bound to the same
    /// cluster (one version round trip per process).
    pub fn with_version_cache(mut self, version: Arc<VersionCache>) -> Self {
        self.version = version;
        self
    }

    /// A copy of this adapter bound to a different client profile.
    pub fn with_transport(&self, transport: Arc<dyn Transport>) -> Self {
        let mut adapter = self.clone();
        adapter.transport = transport;
        adapter
    }

    /// A copy of this adapter bound to the long-timeout export client
    /// profile, for slow scrolls and large reads.
    pub fn export_adapter(&self, config: &EngineConfig) -> Result<Self> {
        let transport = HttpTransport::for_export(config)?;
        Ok(self.with_transport(Arc::new(transport)))
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Physical index this adapter writes to.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Stable logical name used for registry lookup.
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub(crate) fn transform(&self) -> Arc<dyn DocumentTransform> {
        Arc::clone(&self.transform)
    }

    pub fn elastic_version(&self) -> Result<Vec<u64>> {
        self.version.get(self.transport.as_ref())
    }

    pub fn elastic_major_version(&self) -> Result<u64> {
        self.version.major(self.transport.as_ref())
    }

    fn doc_path(&self, doc_id: &str) -> String {
        format!("{}/{}/{}", self.index_name, self.doc_type, doc_id)
    }

    fn type_path(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", self.index_name, self.doc_type, endpoint)
    }

    /// Split an application document into `(doc_id, source)`.
    pub fn from_app(&self, doc: &Value) -> Result<(String, WireDocument)> {
        self.transform.from_app(doc)
    }

    /// The full wire document including `_id`, as a search hit would
    /// return it. Not used by the adapter itself; for callers that want
    /// documents in the store-native shape.
    pub fn to_json(&self, doc: &Value) -> Result<Value> {
        let (doc_id, mut source) = self.from_app(doc)?;
        source.insert("_id".to_string(), Value::String(doc_id));
        Ok(Value::Object(source))
    }

    pub fn exists(&self, doc_id: &str) -> Result<bool> {
        verify_doc_id(doc_id)?;
        match self
            .transport
            .send(Method::Head, &self.doc_path(doc_id), &[], None)
        {
            Ok(_) => Ok(true),
            Err(TransportError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch one document. Raises `NotFound` if it is absent.
    pub fn get(&self, doc_id: &str, source_includes: Option<&[&str]>) -> Result<Value> {
        verify_doc_id(doc_id)?;
        let mut params = Vec::new();
        if let Some(fields) = source_includes {
            params.push(("_source_include", fields.join(",")));
        }
        let path = format!("{}/_source", self.doc_path(doc_id));
        let mut doc = match self.transport.send(Method::Get, &path, &params, None) {
            Ok(doc) => doc,
            Err(TransportError::NotFound { .. }) => {
                return Err(Error::NotFound(format!(
                    "document {doc_id:?} in index {:?}",
                    self.index_name
                )))
            }
            Err(err) => return Err(err.into()),
        };
        if let Some(object) = doc.as_object_mut() {
            object.insert("_id".to_string(), Value::String(doc_id.to_string()));
        }
        Ok(doc)
    }

    /// Fetch multiple documents. A missing id is simply absent from the
    /// result; no error.
    pub fn get_docs(&self, doc_ids: &[String]) -> Result<Vec<Value>> {
        for doc_id in doc_ids {
            verify_doc_id(doc_id)?;
        }
        let body = json!({ "ids": doc_ids });
        let result = self.transport.send(
            Method::Post,
            &self.type_path("_mget"),
            &[("_source", "true".to_string())],
            Some(&body),
        )?;
        let mut docs = Vec::new();
        for doc_result in result
            .get("docs")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(error) = doc_result.get("error") {
                let reason = error
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("multi-get error");
                return Err(Error::Engine(reason.to_string()));
            }
            if doc_result.get("found").and_then(Value::as_bool) == Some(true) {
                let mut hit = doc_result.clone();
                fix_hit(&mut hit);
                if let Some(source) = hit.get("_source") {
                    docs.push(source.clone());
                }
            }
        }
        Ok(docs)
    }

    /// Fetch documents in fixed-size batches, yielding across batches in
    /// the original relative grouping.
    pub fn iter_docs<'a>(
        &'a self,
        doc_ids: &'a [String],
        chunk_size: usize,
    ) -> impl Iterator<Item = Result<Value>> + 'a {
        doc_ids
            .chunks(chunk_size.max(1))
            .flat_map(move |chunk| match self.get_docs(chunk) {
                Ok(docs) => docs.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(err)],
            })
    }

    /// Number of documents matched by `query`. Pagination params are not
    /// supported by the engine's count API and are stripped.
    pub fn count(&self, query: &Value) -> Result<u64> {
        let mut query = query.clone();
        if let Some(object) = query.as_object_mut() {
            for extra in ["size", "sort", "from", "to", "_source"] {
                object.remove(extra);
            }
        }
        let result = self
            .transport
            .send(Method::Post, &self.type_path("_count"), &[], Some(&query))?;
        result
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Engine(format!("invalid count response: {result}")))
    }

    /// Execute a search. Every successful response is checked for
    /// partial shard failure before being returned.
    pub fn search(&self, query: &Value) -> Result<Value> {
        let result = self
            .transport
            .send(Method::Post, &self.type_path("_search"), &[], Some(query))?;
        let mut result = result;
        fix_hits_in_result(&mut result);
        check_shard_failures(&result)?;
        Ok(result)
    }

    /// Start a scrolling search over the entire match set.
    ///
    /// The query must not specify `size` when the `size` argument is
    /// given (ambiguous). If the query carries no `sort`, `_doc` order is
    /// injected for efficiency. The scroll context is released exactly
    /// once on every exit path: exhaustion, a failed page, or the
    /// iterator being dropped early.
    pub fn scroll(
        &self,
        query: &Value,
        keepalive: Option<&str>,
        size: Option<u64>,
    ) -> Result<Scroll<'_>> {
        let keepalive = keepalive.unwrap_or(SCROLL_KEEPALIVE).to_string();
        let mut query = query.clone();
        if !query.is_object() {
            return Err(Error::Validation(format!("expected query object, got: {query}")));
        }
        let object = query.as_object_mut().expect("checked above");
        let mut params = vec![("scroll", keepalive.clone())];
        match (object.get("size"), size) {
            (Some(in_query), Some(as_arg)) => {
                return Err(Error::Validation(format!(
                    "ambiguous scroll size (specified in both query and arguments): \
                     query={in_query}, arg={as_arg}"
                )))
            }
            (None, _) => params.push(("size", size.unwrap_or(SCROLL_SIZE).to_string())),
            (Some(_), None) => {}
        }
        if !object.contains_key("sort") {
            // fastest possible engine order
            object.insert("sort".to_string(), json!("_doc"));
        }
        let mut result = self.transport.send(
            Method::Post,
            &self.type_path("_search"),
            &params,
            Some(&query),
        )?;
        fix_hits_in_result(&mut result);
        let scroll_id = result
            .get("_scroll_id")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let buffer: VecDeque<Value> = take_hits(&result).into();
        let scroll = Scroll {
            adapter: self,
            keepalive,
            done: scroll_id.is_none() || buffer.is_empty(),
            scroll_id,
            buffer,
        };
        // A failed first page still carries a context id; dropping the
        // guard on the error path releases it.
        check_shard_failures(&result)?;
        Ok(scroll)
    }

    /// Index (upsert) one document.
    pub fn index(&self, doc: &Value, refresh: bool) -> Result<()> {
        let (doc_id, source) = self.from_app(doc)?;
        verify_doc_id(&doc_id)?;
        verify_doc_source(&source, true)?;
        self.transport.send(
            Method::Put,
            &self.doc_path(&doc_id),
            &[("refresh", refresh_value(refresh))],
            Some(&Value::Object(source)),
        )?;
        Ok(())
    }

    /// Partially update one document.
    ///
    /// Rejects a `fields` value that carries a conflicting `_id`. With
    /// `return_doc`, the full post-update document is fetched, which is
    /// supported only on known engine protocol versions.
    pub fn update(&self, doc_id: &str, fields: &Value, params: &UpdateParams) -> Result<Option<Value>> {
        verify_doc_id(doc_id)?;
        let mut fields = fields
            .as_object()
            .cloned()
            .ok_or_else(|| Error::Validation(format!("expected fields object, got: {fields}")))?;
        if let Some(embedded) = fields.get("_id") {
            if embedded.as_str() != Some(doc_id) {
                return Err(Error::Validation(format!(
                    "ambiguous doc_id: ({doc_id:?} != {embedded})"
                )));
            }
            fields.remove("_id");
        }
        verify_doc_source(&fields, true)?;

        let mut query = vec![("refresh", refresh_value(params.refresh))];
        if let Some(retries) = params.retry_on_conflict {
            query.push(("retry_on_conflict", retries.to_string()));
        }
        if params.return_doc {
            let major = self.elastic_major_version()?;
            let (name, value) = source_fetch_param(major)?;
            query.push((name, value));
        }
        let mut payload = json!({ "doc": Value::Object(fields) });
        if params.upsert {
            payload["doc_as_upsert"] = json!(true);
        }
        let path = format!("{}/_update", self.doc_path(doc_id));
        let response = match self.transport.send(Method::Post, &path, &query, Some(&payload)) {
            Ok(response) => response,
            Err(TransportError::NotFound { .. }) => {
                return Err(Error::NotFound(format!(
                    "document {doc_id:?} in index {:?}",
                    self.index_name
                )))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(response
            .get("get")
            .and_then(|get| get.get("_source"))
            .cloned())
    }

    /// Delete one document. Raises `NotFound` if it is absent.
    pub fn delete(&self, doc_id: &str, refresh: bool) -> Result<()> {
        verify_doc_id(doc_id)?;
        match self.transport.send(
            Method::Delete,
            &self.doc_path(doc_id),
            &[("refresh", refresh_value(refresh))],
            None,
        ) {
            Ok(_) => Ok(()),
            Err(TransportError::NotFound { .. }) => Err(Error::NotFound(format!(
                "document {doc_id:?} in index {:?}",
                self.index_name
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Apply bulk actions in one wire request.
    ///
    /// Returns `(success_count, error_items)`. With `raise_errors`, a
    /// non-empty error list raises `BulkIndex` instead of returning.
    pub fn bulk(
        &self,
        actions: &[BulkAction],
        refresh: bool,
        raise_errors: bool,
    ) -> Result<(usize, Vec<Value>)> {
        let mut lines = Vec::new();
        for action in actions {
            self.render_bulk_action(action, true)?.push_lines(&mut lines);
        }
        if lines.is_empty() {
            return Ok((0, Vec::new()));
        }
        let result = self.transport.send_bulk(
            "_bulk",
            &[("refresh", refresh_value(refresh))],
            &lines,
        )?;
        collect_bulk_result(&result, raise_errors)
    }

    pub fn bulk_index(&self, docs: &[Value], refresh: bool, raise_errors: bool) -> Result<(usize, Vec<Value>)> {
        let actions: Vec<BulkAction> = docs.iter().cloned().map(BulkAction::index).collect();
        self.bulk(&actions, refresh, raise_errors)
    }

    pub fn bulk_delete(&self, doc_ids: &[String], refresh: bool, raise_errors: bool) -> Result<(usize, Vec<Value>)> {
        let actions: Vec<BulkAction> = doc_ids.iter().cloned().map(BulkAction::delete_id).collect();
        self.bulk(&actions, refresh, raise_errors)
    }

    /// Render a bulk action against this adapter's index, re-validating
    /// id and source exactly as direct writes do.
    pub fn render_bulk_action(
        &self,
        action: &BulkAction,
        forbid_tombstones: bool,
    ) -> Result<RenderedAction> {
        match action {
            BulkAction::Index(doc) => {
                let (doc_id, source) = self.from_app(doc)?;
                verify_doc_id(&doc_id)?;
                verify_doc_source(&source, forbid_tombstones)?;
                Ok(RenderedAction {
                    op: BulkOp::Index,
                    meta: json!({"index": {
                        "_index": self.index_name,
                        "_type": self.doc_type,
                        "_id": doc_id,
                    }}),
                    source: Some(Value::Object(source)),
                    doc_id,
                    index_name: self.index_name.clone(),
                })
            }
            BulkAction::Delete(doc) => {
                let (doc_id, _) = self.from_app(doc)?;
                self.render_delete(doc_id)
            }
            BulkAction::DeleteById(doc_id) => self.render_delete(doc_id.clone()),
        }
    }

    fn render_delete(&self, doc_id: String) -> Result<RenderedAction> {
        verify_doc_id(&doc_id)?;
        Ok(RenderedAction {
            op: BulkOp::Delete,
            meta: json!({"delete": {
                "_index": self.index_name,
                "_type": self.doc_type,
                "_id": doc_id,
            }}),
            source: None,
            doc_id,
            index_name: self.index_name.clone(),
        })
    }

    /// Ids of all tombstone documents on this index.
    pub fn tombstone_ids(&self) -> Result<Vec<String>> {
        let query = json!({
            "query": {"term": {(Tombstone::PROPERTY_NAME): true}},
            "_source": false,
        });
        let mut ids = Vec::new();
        for hit in self.scroll(&query, None, Some(1000))? {
            let hit = hit?;
            if let Some(id) = hit.get("_id").and_then(Value::as_str) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Remove all tombstone documents from this index in bulk. Returns
    /// how many were removed.
    pub fn delete_tombstones(&self) -> Result<u64> {
        let ids = self.tombstone_ids()?;
        if !ids.is_empty() {
            self.bulk_delete(&ids, true, true)?;
        }
        Ok(ids.len() as u64)
    }
}

/// Iterator over the hits of a scrolling search.
///
/// Releases the scroll context exactly once: proactively when the scroll
/// is exhausted or a page fails, otherwise from `Drop`.
pub struct Scroll<'a> {
    adapter: &'a DocumentAdapter,
    keepalive: String,
    scroll_id: Option<String>,
    buffer: VecDeque<Value>,
    done: bool,
}

impl fmt::Debug for Scroll<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scroll")
            .field("adapter", &self.adapter)
            .field("scroll_id", &self.scroll_id)
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish()
    }
}

impl Scroll<'_> {
    fn release(&mut self) {
        if let Some(scroll_id) = self.scroll_id.take() {
            // best effort; a vanished context is not an error
            let body = json!({"scroll_id": [scroll_id]});
            if let Err(err) =
                self.adapter
                    .transport()
                    .send(Method::Delete, "_search/scroll", &[], Some(&body))
            {
                if !matches!(err, TransportError::NotFound { .. }) {
                    tracing::warn!(error = %err, "failed to clear scroll context");
                }
            }
        }
    }

    fn fetch_next_page(&mut self) -> Result<()> {
        let scroll_id = match &self.scroll_id {
            Some(id) => id.clone(),
            None => {
                self.done = true;
                return Ok(());
            }
        };
        // The keepalive must be sent on every page or the context
        // terminates after this request.
        let body = json!({"scroll": self.keepalive, "scroll_id": scroll_id});
        let mut result =
            self.adapter
                .transport()
                .send(Method::Post, "_search/scroll", &[], Some(&body))?;
        check_shard_failures(&result)?;
        fix_hits_in_result(&mut result);
        self.scroll_id = result
            .get("_scroll_id")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let hits = take_hits(&result);
        if hits.is_empty() || self.scroll_id.is_none() {
            self.done = true;
        }
        self.buffer.extend(hits);
        Ok(())
    }
}

impl Iterator for Scroll<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.buffer.pop_front() {
                return Some(Ok(hit));
            }
            if self.done {
                self.release();
                return None;
            }
            if let Err(err) = self.fetch_next_page() {
                self.done = true;
                self.release();
                return Some(Err(err));
            }
        }
    }
}

impl Drop for Scroll<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Parse a bulk response into `(success_count, error_items)`.
pub(crate) fn collect_bulk_result(result: &Value, raise_errors: bool) -> Result<(usize, Vec<Value>)> {
    let items = result
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Engine(format!("invalid bulk response: {result}")))?;
    let mut success_count = 0;
    let mut errors = Vec::new();
    for item in items {
        if item_error(item).is_some() {
            errors.push(item.clone());
        } else {
            success_count += 1;
        }
    }
    if raise_errors && !errors.is_empty() {
        return Err(Error::BulkIndex { errors });
    }
    Ok((success_count, errors))
}

/// The inner result object of a bulk response item, if it failed.
/// An item fails when it carries an `error` or a non-2xx status (a
/// delete of a missing document reports 404 without an `error` key).
pub(crate) fn item_error(item: &Value) -> Option<&Value> {
    let (_, inner) = item.as_object()?.iter().next()?;
    let status = inner.get("status").and_then(Value::as_u64).unwrap_or(0);
    if inner.get("error").is_some() || !(200..300).contains(&status) {
        Some(inner)
    } else {
        None
    }
}

pub(crate) fn verify_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.is_empty() {
        return Err(Error::Validation(format!("invalid document _id value: {doc_id:?}")));
    }
    Ok(())
}

pub(crate) fn verify_doc_source(source: &WireDocument, forbid_tombstones: bool) -> Result<()> {
    if source.contains_key("_id") {
        return Err(Error::Validation(format!(
            "invalid document source value: {:?}",
            Value::Object(source.clone())
        )));
    }
    if forbid_tombstones
        && source.get(Tombstone::PROPERTY_NAME).and_then(Value::as_bool) == Some(true)
    {
        return Err(Error::Validation(format!(
            "property {} is reserved",
            Tombstone::PROPERTY_NAME
        )));
    }
    Ok(())
}

/// Mirror the hit's `_id` into its `_source`, store-native style.
pub(crate) fn fix_hit(hit: &mut Value) {
    let id = hit.get("_id").cloned();
    if let (Some(id), Some(source)) = (id, hit.get_mut("_source").and_then(Value::as_object_mut)) {
        source.insert("_id".to_string(), id);
    }
}

pub(crate) fn fix_hits_in_result(result: &mut Value) {
    if let Some(hits) = result
        .get_mut("hits")
        .and_then(|h| h.get_mut("hits"))
        .and_then(Value::as_array_mut)
    {
        for hit in hits {
            fix_hit(hit);
        }
    }
}

fn take_hits(result: &Value) -> Vec<Value> {
    result
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Raise `ShardFailure` when a search/scroll result reports partial
/// shard failure. Runs on every page of a scroll, not just the first.
pub(crate) fn check_shard_failures(result: &Value) -> Result<()> {
    if !result.is_object() {
        return Err(Error::Engine(format!("invalid search result object: {result}")));
    }
    let failed = result
        .get("_shards")
        .and_then(|s| s.get("failed"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if failed > 0 {
        return Err(Error::ShardFailure(format!(
            "_shards: {}",
            result["_shards"]
        )));
    }
    Ok(())
}

/// Wire parameter for fetching the post-update source, keyed by the
/// engine's major protocol version.
fn source_fetch_param(major: u64) -> Result<(&'static str, String)> {
    match major {
        5..=7 => Ok(("_source", "true".to_string())),
        8 => Ok(("source", "true".to_string())),
        other => Err(Error::Engine(format!(
            "fetching the updated document is not supported on engine version {other}"
        ))),
    }
}

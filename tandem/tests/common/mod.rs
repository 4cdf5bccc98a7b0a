#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use tandem::transport::{Method, Transport, TransportError};

/// One recorded request, as the adapter layer issued it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    /// NDJSON lines of a bulk request; `None` for plain requests.
    pub lines: Option<Vec<Value>>,
}

/// Scripted in-memory transport.
///
/// Responses are consumed from a queue in request order. The cluster
/// root (`GET ""`, used for version introspection) is answered from a
/// fixed version string without consuming the queue, since adapters may
/// or may not need it depending on the code path under test.
pub struct FakeTransport {
    version: String,
    queue: Mutex<VecDeque<Result<Value, TransportError>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Self::with_version("5.6.16")
    }

    pub fn with_version(version: &str) -> Arc<Self> {
        Arc::new(Self {
            version: version.to_string(),
            queue: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn queue_ok(&self, response: Value) {
        self.queue.lock().push_back(Ok(response));
    }

    pub fn queue_err(&self, error: TransportError) {
        self.queue.lock().push_back(Err(error));
    }

    pub fn not_found(reason: &str) -> TransportError {
        TransportError::NotFound {
            reason: reason.to_string(),
            body: Value::Null,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Recorded calls excluding cluster-root version pings.
    pub fn request_calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|call| !call.path.is_empty())
            .cloned()
            .collect()
    }

    pub fn count_calls(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    fn pop(&self, method: Method, path: &str) -> Result<Value, TransportError> {
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response for {method:?} {path:?}"))
    }

    fn record(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
        lines: Option<&[Value]>,
    ) {
        self.calls.lock().push(Call {
            method,
            path: path.to_string(),
            params: params
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
            body: body.cloned(),
            lines: lines.map(<[Value]>::to_vec),
        });
    }
}

impl Transport for FakeTransport {
    fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        self.record(method, path, params, body, None);
        if method == Method::Get && path.is_empty() {
            return Ok(json!({
                "cluster_name": "fake",
                "version": {"number": self.version},
            }));
        }
        self.pop(method, path)
    }

    fn send_bulk(
        &self,
        path: &str,
        params: &[(&str, String)],
        lines: &[Value],
    ) -> Result<Value, TransportError> {
        self.record(Method::Post, path, params, None, Some(lines));
        self.pop(Method::Post, path)
    }
}

/// A search/scroll page in the engine's wire shape.
pub fn hits_page(scroll_id: Option<&str>, docs: &[Value]) -> Value {
    let mut page = json!({
        "_shards": {"total": 5, "successful": 5, "failed": 0},
        "hits": {"total": docs.len(), "hits": docs},
    });
    if let Some(id) = scroll_id {
        page["_scroll_id"] = json!(id);
    }
    page
}

/// One search hit wrapping a source document.
pub fn hit(doc_id: &str, source: Value) -> Value {
    json!({"_id": doc_id, "_index": "users", "_score": 1.0, "_source": source})
}

/// One bulk response item in the engine's wire shape.
pub fn bulk_item(op: &str, index: &str, doc_id: &str, status: u64) -> Value {
    let mut inner = json!({"_id": doc_id, "_index": index, "status": status});
    if op == "delete" && status == 404 {
        // the engine reports a missing delete target without an error key
        inner["result"] = json!("not_found");
    } else if !(200..300).contains(&status) {
        inner["error"] = json!({"type": "exception", "reason": "scripted failure"});
    }
    json!({ (op): inner })
}

/// A bulk response wrapping `items`.
pub fn bulk_response(items: Vec<Value>) -> Value {
    json!({"took": 1, "errors": false, "items": items})
}

//! Engine client layer: the cluster manager and the document adapters.

pub mod bulk;
pub mod document;
pub mod manager;
pub mod multiplex;

pub use bulk::{BulkAction, BulkOp, RenderedAction};
pub use document::{DocumentAdapter, DocumentTransform, IdFieldTransform, Scroll, UpdateParams};
pub use manager::{ClusterManager, ReindexParams, TaskRecord, TaskStatus};
pub use multiplex::{MultiplexAdapter, Tombstone};

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::{Method, Transport};

/// How long the engine keeps a scroll context alive between pages.
pub const SCROLL_KEEPALIVE: &str = "5m";

/// Default number of documents per scroll page.
pub const SCROLL_SIZE: u64 = 1000;

/// Verify that `index` is a valid, single, concrete index identifier:
/// non-empty, not `_all`, no commas (multi-index syntax), no wildcards.
pub(crate) fn validate_single_index(index: &str) -> Result<()> {
    if index.is_empty() {
        Err(Error::Validation(format!("invalid index: {index:?}")))
    } else if index == "_all" {
        Err(Error::Validation("refusing to operate on all indices".into()))
    } else if index.contains(',') {
        Err(Error::Validation(format!(
            "refusing to operate on multiple indices: {index}"
        )))
    } else if index.contains('*') {
        Err(Error::Validation(format!(
            "refusing to operate with index wildcards: {index}"
        )))
    } else {
        Ok(())
    }
}

/// Translate a boolean `refresh` argument into the engine's string form.
pub(crate) fn refresh_value(refresh: bool) -> String {
    if refresh { "true" } else { "false" }.to_string()
}

/// Process-wide cache of the engine's dotted version string.
///
/// One engine round trip per process; invalidated only by an explicit
/// [`VersionCache::reset`], never implicitly.
#[derive(Default)]
pub struct VersionCache {
    parts: RwLock<Option<Vec<u64>>>,
}

impl VersionCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, transport: &dyn Transport) -> Result<Vec<u64>> {
        if let Some(parts) = self.parts.read().clone() {
            return Ok(parts);
        }
        let info = transport
            .send(Method::Get, "", &[], None)
            .map_err(|e| Error::Engine(format!("Elasticsearch is unavailable: {e}")))?;
        let parts = parse_version(&info)?;
        *self.parts.write() = Some(parts.clone());
        Ok(parts)
    }

    pub fn major(&self, transport: &dyn Transport) -> Result<u64> {
        Ok(self.get(transport)?[0])
    }

    pub fn reset(&self) {
        *self.parts.write() = None;
    }
}

fn parse_version(info: &Value) -> Result<Vec<u64>> {
    let number = info
        .get("version")
        .and_then(|v| v.get("number"))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Engine(format!("invalid elasticsearch info: {info}")))?;
    let parts = number
        .split('.')
        .map(|part| part.parse::<u64>())
        .collect::<std::result::Result<Vec<u64>, _>>()
        .map_err(|_| Error::Engine(format!("invalid elasticsearch version: {number:?}")))?;
    if parts.is_empty() {
        return Err(Error::Engine(format!("invalid elasticsearch info: {info}")));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_index_validation() {
        assert!(validate_single_index("users-2024").is_ok());
        assert!(validate_single_index("").is_err());
        assert!(validate_single_index("_all").is_err());
        assert!(validate_single_index("users,forms").is_err());
        assert!(validate_single_index("users-*").is_err());
    }

    #[test]
    fn version_parsing() {
        let info = json!({"version": {"number": "5.6.16"}});
        assert_eq!(parse_version(&info).unwrap(), vec![5, 6, 16]);

        let junk = json!({"version": {"number": "5.6.x"}});
        assert!(matches!(parse_version(&junk), Err(Error::Engine(_))));

        assert!(parse_version(&json!({})).is_err());
    }
}

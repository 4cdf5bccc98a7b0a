//! Bulk action model.
//!
//! One index/delete intent, batched with others into a single wire
//! request. A closed sum type: `Index` always carries a document (a bare
//! id is not enough to compute a wire representation), deletes may carry
//! either a document or a bare id. `Delete(doc)` and `DeleteById(id)` for
//! the same id are distinct values; an id alone does not prove document
//! identity.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// Index (upsert) a document.
    Index(Value),
    /// Delete, identified by a full application document.
    Delete(Value),
    /// Delete, identified by id only.
    DeleteById(String),
}

impl BulkAction {
    pub fn index(doc: Value) -> Self {
        Self::Index(doc)
    }

    pub fn delete(doc: Value) -> Self {
        Self::Delete(doc)
    }

    pub fn delete_id(doc_id: impl Into<String>) -> Self {
        Self::DeleteById(doc_id.into())
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    pub fn is_delete(&self) -> bool {
        !self.is_index()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOp {
    Index,
    Delete,
}

/// A bulk action rendered against one concrete index, ready for the wire.
/// Validation happens at render time, so malformed items fail before any
/// network round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAction {
    pub op: BulkOp,
    pub doc_id: String,
    pub index_name: String,
    /// The action metadata line, e.g. `{"delete": {"_index": …, "_id": …}}`.
    pub meta: Value,
    /// The document source line; present for index actions only.
    pub source: Option<Value>,
}

impl RenderedAction {
    /// Append this action's wire lines to a bulk request body.
    pub fn push_lines(&self, lines: &mut Vec<Value>) {
        lines.push(self.meta.clone());
        if let Some(source) = &self.source {
            lines.push(source.clone());
        }
    }
}

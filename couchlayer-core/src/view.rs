//! View query parameters and results.
//!
//! A view is a named index kept by the database. Querying it yields rows of
//! `(id, key, value)` and, when `include_docs` is set, the full document body of each row.
//!
//! # Example
//!
//! ```ignore
//! use couchlayer_core::view::ViewParams;
//!
//! let params = ViewParams::builder()
//!     .start_key("a")
//!     .end_key("m")
//!     .limit(10)
//!     .include_docs(true)
//!     .build();
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::{
    document::{Document, ID_FIELD},
    error::DocumentResult,
    shape::Shape,
};

/// Map function of a view.
///
/// Called once per stored document with its full body; returns the `(key, value)` rows
/// the document contributes to the view.
pub type MapFn = Arc<dyn Fn(&Map<String, Json>) -> Vec<(Json, Json)> + Send + Sync>;

/// Parameters for a view query.
///
/// Keys are compared with the collation of the backend. `key` selects rows with exactly
/// that key and takes precedence over the range bounds. Both range bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewParams {
    pub key: Option<Json>,
    pub start_key: Option<Json>,
    pub end_key: Option<Json>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub include_docs: bool,
}

impl ViewParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ViewParamsBuilder {
        ViewParamsBuilder::default()
    }
}

/// Builder for [`ViewParams`].
#[derive(Debug, Clone, Default)]
pub struct ViewParamsBuilder {
    params: ViewParams,
}

impl ViewParamsBuilder {
    pub fn key(mut self, key: impl Into<Json>) -> Self {
        self.params.key = Some(key.into());
        self
    }

    pub fn start_key(mut self, key: impl Into<Json>) -> Self {
        self.params.start_key = Some(key.into());
        self
    }

    pub fn end_key(mut self, key: impl Into<Json>) -> Self {
        self.params.end_key = Some(key.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.params.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.params.skip = Some(skip);
        self
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.params.descending = descending;
        self
    }

    pub fn include_docs(mut self, include_docs: bool) -> Self {
        self.params.include_docs = include_docs;
        self
    }

    pub fn build(self) -> ViewParams {
        self.params
    }
}

/// One row emitted by a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    /// Id of the document that emitted the row.
    pub id: Option<String>,
    pub key: Json,
    pub value: Json,
    /// Document body, present when the query asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Map<String, Json>>,
}

impl ViewRow {
    pub fn new(id: Option<String>, key: Json, value: Json) -> Self {
        Self {
            id,
            key,
            value,
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: Map<String, Json>) -> Self {
        self.doc = Some(doc);
        self
    }
}

/// Result of a view query.
///
/// `total_rows` counts every row of the view, `offset` is the position of the first
/// returned row within it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewResults<T> {
    pub total_rows: usize,
    pub offset: usize,
    pub rows: Vec<T>,
}

impl<T> ViewResults<T> {
    pub fn new(rows: Vec<T>, total_rows: usize, offset: usize) -> Self {
        Self {
            total_rows,
            offset,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    /// Converts every row, stopping at the first failure.
    ///
    /// `total_rows` and `offset` are carried over unchanged.
    pub fn try_map<U, E, F>(self, f: F) -> Result<ViewResults<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(ViewResults {
            total_rows: self.total_rows,
            offset: self.offset,
            rows: self
                .rows
                .into_iter()
                .map(f)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

impl<T> IntoIterator for ViewResults<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Row produced by the default row wrapper.
#[derive(Debug)]
pub enum ViewEntry {
    Document(Document),
    Row(ViewRow),
}

impl ViewEntry {
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            ViewEntry::Document(document) => Some(document),
            ViewEntry::Row(_) => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            ViewEntry::Document(document) => Some(document),
            ViewEntry::Row(_) => None,
        }
    }

    pub fn as_row(&self) -> Option<&ViewRow> {
        match self {
            ViewEntry::Row(row) => Some(row),
            ViewEntry::Document(_) => None,
        }
    }
}

/// Wraps a view row as a document of `shape` when it carries one.
///
/// A row whose value is empty (null, false, zero, or an empty string, list or object)
/// wraps its document body when the query included one. A row whose value is an object
/// and which names the emitting document wraps the value, with `_id` set from the row
/// id. Any other row is returned unchanged.
pub fn wrap_row(shape: &Arc<Shape>, row: ViewRow) -> DocumentResult<ViewEntry> {
    if is_empty_value(&row.value) {
        return match row.doc {
            Some(doc) => Ok(ViewEntry::Document(shape.wrap(doc)?)),
            None => Ok(ViewEntry::Row(row)),
        };
    }

    match row {
        ViewRow {
            id: Some(id),
            value: Json::Object(mut value),
            ..
        } => {
            value.insert(ID_FIELD.to_string(), Json::String(id));
            Ok(ViewEntry::Document(shape.wrap(value)?))
        }
        row => Ok(ViewEntry::Row(row)),
    }
}

fn is_empty_value(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::Bool(flag) => !flag,
        Json::Number(number) => number.as_f64() == Some(0.0),
        Json::String(text) => text.is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::Object(entries) => entries.is_empty(),
    }
}

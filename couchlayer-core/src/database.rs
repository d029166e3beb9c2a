//! Persistence of schema documents in a named database.
//!
//! A [`Database`] binds a database name to a storage backend and moves documents between
//! the schema engine and the backend. Reads wrap stored bodies with a [`Shape`]; writes
//! validate the document first and merge the id and revision assigned by the store back
//! into it.
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::prelude::*;
//!
//! # async fn example(store: &DocumentStore<impl StoreBackend>, post: &std::sync::Arc<Shape>) -> DocumentStoreResult<()> {
//! let blog = store.database("blog");
//!
//! let doc = post.create([("title", "Hello")])?;
//! blog.save(&doc).await?;
//! assert!(!doc.is_new());
//!
//! let same = blog.get(post, &doc.id().unwrap_or_default()).await?;
//! assert_eq!(same.value("title")?, Value::from("Hello"));
//! # Ok(()) }
//! ```

use std::sync::Arc;

use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::{
    backend::{Attachment, DocRevision, StoreBackend},
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    shape::Shape,
    view::{MapFn, ViewEntry, ViewParams, ViewResults, ViewRow, wrap_row},
};

/// A named database reached through a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Database<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Database<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this database.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Saves a document.
    ///
    /// The document is validated with the required check on. A document without `_id`
    /// receives the id generated by the store. On success the document holds the id and
    /// the new revision.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidDocument`] for embedded documents
    /// - [`DocumentStoreError::Schema`] when validation fails
    /// - [`DocumentStoreError::Conflict`] when the stored revision moved on
    pub async fn save(&self, document: &Document) -> DocumentStoreResult<DocRevision> {
        if document.is_embedded() {
            return Err(DocumentStoreError::InvalidDocument(String::from(
                "embedded documents are saved with their parent",
            )));
        }
        document.validate(true)?;

        let body = document.to_json_map();
        let revision = self
            .backend
            .put_document(&self.name, body)
            .await?;
        document.merge_revision(&revision.id, &revision.rev)?;

        debug!(db = %self.name, id = %revision.id, rev = %revision.rev, "saved document");
        Ok(revision)
    }

    /// Fetches a document by id and wraps it with `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] when no document has that id.
    pub async fn get(&self, shape: &Arc<Shape>, id: &str) -> DocumentStoreResult<Document> {
        let body = self
            .backend
            .get_document(&self.name, id)
            .await?;
        Ok(shape.wrap(body)?)
    }

    /// Fetches the body a document had at an earlier revision.
    ///
    /// The returned document carries that revision, so saving it conflicts unless it is
    /// still the current one.
    pub async fn get_rev(&self, shape: &Arc<Shape>, id: &str, rev: &str) -> DocumentStoreResult<Document> {
        let body = self
            .backend
            .get_revision(&self.name, id, rev)
            .await?;
        Ok(shape.wrap(body)?)
    }

    /// Fetches a document, creating and saving an empty one under `id` when it is missing.
    pub async fn get_or_create(&self, shape: &Arc<Shape>, id: &str) -> DocumentStoreResult<Document> {
        match self.get(shape, id).await {
            Err(error) if error.is_not_found() => {
                let document = shape.new_document()?;
                document.set_id(id)?;
                self.save(&document).await?;
                Ok(document)
            }
            other => other,
        }
    }

    /// Deletes a saved document and strips `_id` and `_rev` from it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotSaved`] for documents that were never saved.
    pub async fn delete(&self, document: &Document) -> DocumentStoreResult<()> {
        let (id, rev) = saved_identity(document)?;
        self.backend
            .delete_document(&self.name, &id, &rev)
            .await?;
        document.clear_identity()?;

        debug!(db = %self.name, id = %id, "deleted document");
        Ok(())
    }

    /// Saves several documents of `shape` in one request.
    ///
    /// Every document must carry the shape's doc_type and pass validation before anything
    /// is written.
    pub async fn bulk_save(
        &self,
        shape: &Arc<Shape>,
        documents: &[Document],
    ) -> DocumentStoreResult<Vec<DocRevision>> {
        if documents
            .iter()
            .any(|document| document.doc_type() != shape.doc_type())
        {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "all documents must be of type {}",
                shape.doc_type()
            )));
        }
        if documents.iter().any(Document::is_embedded) {
            return Err(DocumentStoreError::InvalidDocument(String::from(
                "embedded documents are saved with their parent",
            )));
        }
        for document in documents {
            document.validate(true)?;
        }

        let bodies = documents
            .iter()
            .map(Document::to_json_map)
            .collect::<Vec<_>>();
        let revisions = self
            .backend
            .bulk_documents(&self.name, bodies)
            .await?;

        for (document, revision) in documents.iter().zip(&revisions) {
            document.merge_revision(&revision.id, &revision.rev)?;
        }

        debug!(db = %self.name, count = revisions.len(), "bulk saved documents");
        Ok(revisions)
    }

    /// Queries a view and wraps each row with the default row wrapper.
    ///
    /// See [`wrap_row`] for how rows become documents.
    pub async fn view(
        &self,
        shape: &Arc<Shape>,
        view: &str,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewEntry>> {
        self.view_with(view, params, |row| Ok(wrap_row(shape, row)?))
            .await
    }

    /// Runs an ad hoc map function over the database and wraps the rows like [`Database::view`].
    pub async fn temp_view<F>(
        &self,
        shape: &Arc<Shape>,
        map: F,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewEntry>>
    where
        F: Fn(&Map<String, Json>) -> Vec<(Json, Json)> + Send + Sync + 'static,
    {
        let map: MapFn = Arc::new(map);
        debug!(db = %self.name, "running temporary view");
        self.backend
            .query_temp_view(&self.name, map, params)
            .await?
            .try_map(|row| Ok(wrap_row(shape, row)?))
    }

    /// Queries a view and converts each row with `wrapper`.
    pub async fn view_with<T, F>(
        &self,
        view: &str,
        params: &ViewParams,
        wrapper: F,
    ) -> DocumentStoreResult<ViewResults<T>>
    where
        F: FnMut(ViewRow) -> DocumentStoreResult<T>,
    {
        self.view_raw(view, params)
            .await?
            .try_map(wrapper)
    }

    /// Queries a view without wrapping its rows.
    pub async fn view_raw(
        &self,
        view: &str,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        self.backend
            .query_view(&self.name, view, params)
            .await
    }

    /// Adds or replaces an attachment of a saved document.
    ///
    /// The document's `_rev` is updated to the revision created by the write.
    pub async fn put_attachment(
        &self,
        document: &Document,
        name: &str,
        content_type: &str,
        data: impl Into<Vec<u8>>,
    ) -> DocumentStoreResult<String> {
        let (id, rev) = saved_identity(document)?;
        let rev = self
            .backend
            .put_attachment(&self.name, &id, &rev, name, Attachment::new(content_type, data))
            .await?;
        document.set_rev(&rev)?;

        debug!(db = %self.name, id = %id, attachment = name, rev = %rev, "stored attachment");
        Ok(rev)
    }

    /// Reads an attachment of a saved document.
    pub async fn fetch_attachment(
        &self,
        document: &Document,
        name: &str,
    ) -> DocumentStoreResult<Option<Attachment>> {
        let id = document.id().ok_or(DocumentStoreError::NotSaved)?;
        self.backend
            .get_attachment(&self.name, &id, name)
            .await
    }

    /// Removes an attachment of a saved document and updates its `_rev`.
    pub async fn delete_attachment(&self, document: &Document, name: &str) -> DocumentStoreResult<String> {
        let (id, rev) = saved_identity(document)?;
        let rev = self
            .backend
            .delete_attachment(&self.name, &id, &rev, name)
            .await?;
        document.set_rev(&rev)?;

        debug!(db = %self.name, id = %id, attachment = name, rev = %rev, "deleted attachment");
        Ok(rev)
    }
}

fn saved_identity(document: &Document) -> DocumentStoreResult<(String, String)> {
    match (document.id(), document.rev()) {
        (Some(id), Some(rev)) => Ok((id, rev)),
        _ => Err(DocumentStoreError::NotSaved),
    }
}

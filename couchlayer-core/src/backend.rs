//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over the database server a [`Database`]
//! talks to. Documents cross this boundary in their canonical JSON form only; the
//! schema engine never reaches a backend.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for document reads and
//! writes with revision checks, bulk writes, view queries, attachments and database
//! management. Implementations are required to be thread-safe (`Send + Sync`).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use couchlayer::backend::StoreBackend;
//! use serde_json::json;
//!
//! let backend = MyBackendImpl::new();
//! backend.create_database("blog").await?;
//!
//! let body = json!({"_id": "post-1", "title": "Hello"});
//! let revision = backend.put_document("blog", body.as_object().unwrap().clone()).await?;
//! assert_eq!(revision.id, "post-1");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`Database`]: crate::database::Database

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::{any::Any, fmt::Debug};

use crate::{
    error::DocumentStoreResult,
    view::{MapFn, ViewParams, ViewResults, ViewRow},
};

/// Id and revision assigned by the store to a written document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRevision {
    pub id: String,
    pub rev: String,
}

impl DocRevision {
    pub fn new(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: rev.into(),
        }
    }
}

/// Binary content stored alongside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Abstract interface for document storage backends.
///
/// Every write that touches an existing document carries the revision the caller last
/// saw. Backends reject writes whose revision does not match the stored one with
/// [`DocumentStoreError::Conflict`](crate::error::DocumentStoreError::Conflict).
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The concurrency model is implementation-specific.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Operations on a database that does not exist fail with
/// [`DocumentStoreError::DatabaseNotFound`](crate::error::DocumentStoreError::DatabaseNotFound).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Fetches the canonical body of a document.
    ///
    /// # Arguments
    ///
    /// * `database` - The database to read from
    /// * `id` - The document id
    ///
    /// # Returns
    ///
    /// The stored body including `_id` and `_rev`, or
    /// [`DocumentStoreError::DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound).
    async fn get_document(&self, database: &str, id: &str) -> DocumentStoreResult<Map<String, Json>>;

    /// Fetches the body a document had at revision `rev`.
    ///
    /// Fails with `DocumentNotFound` when the document or that revision is unknown.
    async fn get_revision(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> DocumentStoreResult<Map<String, Json>>;

    /// Creates or updates a document.
    ///
    /// A body without `_id` gets a generated one. A body naming an existing document
    /// must carry its current `_rev`.
    ///
    /// # Arguments
    ///
    /// * `database` - The database to write to
    /// * `document` - The canonical body
    ///
    /// # Returns
    ///
    /// The id and the new revision of the document.
    async fn put_document(
        &self,
        database: &str,
        document: Map<String, Json>,
    ) -> DocumentStoreResult<DocRevision>;

    /// Deletes a document at the given revision.
    async fn delete_document(&self, database: &str, id: &str, rev: &str) -> DocumentStoreResult<()>;

    /// Writes several documents at once.
    ///
    /// Each body follows the rules of [`StoreBackend::put_document`]. The returned
    /// revisions are in input order.
    async fn bulk_documents(
        &self,
        database: &str,
        documents: Vec<Map<String, Json>>,
    ) -> DocumentStoreResult<Vec<DocRevision>>;

    /// Queries a view by name.
    ///
    /// # Arguments
    ///
    /// * `database` - The database the view belongs to
    /// * `view` - The view name, e.g. `"blog/by_title"`
    /// * `params` - Key selection, paging, ordering and whether to include bodies
    async fn query_view(
        &self,
        database: &str,
        view: &str,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>>;

    /// Runs a one-off map function over the database, as if it were a stored view.
    async fn query_temp_view(
        &self,
        database: &str,
        map: MapFn,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>>;

    /// Stores an attachment on a document and returns the document's new revision.
    async fn put_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
        attachment: Attachment,
    ) -> DocumentStoreResult<String>;

    /// Reads an attachment, or `None` when the document has no attachment of that name.
    async fn get_attachment(
        &self,
        database: &str,
        id: &str,
        name: &str,
    ) -> DocumentStoreResult<Option<Attachment>>;

    /// Removes an attachment and returns the document's new revision.
    async fn delete_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
    ) -> DocumentStoreResult<String>;

    /// Creates a new, empty database.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DatabaseAlreadyExists`](crate::error::DocumentStoreError::DatabaseAlreadyExists)
    /// when the name is taken.
    async fn create_database(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a database and everything in it.
    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists database names.
    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>>;

    /// Gracefully shuts down the backend, releasing any held resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend + ?Sized,
{
    async fn get_document(&self, database: &str, id: &str) -> DocumentStoreResult<Map<String, Json>> {
        B::get_document(self, database, id).await
    }

    async fn get_revision(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> DocumentStoreResult<Map<String, Json>> {
        B::get_revision(self, database, id, rev).await
    }

    async fn put_document(
        &self,
        database: &str,
        document: Map<String, Json>,
    ) -> DocumentStoreResult<DocRevision> {
        B::put_document(self, database, document).await
    }

    async fn delete_document(&self, database: &str, id: &str, rev: &str) -> DocumentStoreResult<()> {
        B::delete_document(self, database, id, rev).await
    }

    async fn bulk_documents(
        &self,
        database: &str,
        documents: Vec<Map<String, Json>>,
    ) -> DocumentStoreResult<Vec<DocRevision>> {
        B::bulk_documents(self, database, documents).await
    }

    async fn query_view(
        &self,
        database: &str,
        view: &str,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        B::query_view(self, database, view, params).await
    }

    async fn query_temp_view(
        &self,
        database: &str,
        map: MapFn,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        B::query_temp_view(self, database, map, params).await
    }

    async fn put_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
        attachment: Attachment,
    ) -> DocumentStoreResult<String> {
        B::put_attachment(self, database, id, rev, name, attachment).await
    }

    async fn get_attachment(
        &self,
        database: &str,
        id: &str,
        name: &str,
    ) -> DocumentStoreResult<Option<Attachment>> {
        B::get_attachment(self, database, id, name).await
    }

    async fn delete_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
    ) -> DocumentStoreResult<String> {
        B::delete_attachment(self, database, id, rev, name).await
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        B::create_database(self, name).await
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        B::drop_database(self, name).await
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        B::list_databases(self).await
    }
}

/// Object-safe mirror of [`StoreBackend`] for choosing a backend at runtime.
///
/// Every `StoreBackend + 'static` implements it. `Box<dyn DynStoreBackend>` implements
/// [`StoreBackend`] in turn, so a boxed backend can sit behind a
/// [`DocumentStore`](crate::store::DocumentStore) like any other.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn get_document(&self, database: &str, id: &str) -> DocumentStoreResult<Map<String, Json>>;
    async fn get_revision(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> DocumentStoreResult<Map<String, Json>>;
    async fn put_document(
        &self,
        database: &str,
        document: Map<String, Json>,
    ) -> DocumentStoreResult<DocRevision>;
    async fn delete_document(&self, database: &str, id: &str, rev: &str) -> DocumentStoreResult<()>;
    async fn bulk_documents(
        &self,
        database: &str,
        documents: Vec<Map<String, Json>>,
    ) -> DocumentStoreResult<Vec<DocRevision>>;
    async fn query_view(
        &self,
        database: &str,
        view: &str,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>>;
    async fn query_temp_view(
        &self,
        database: &str,
        map: MapFn,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>>;
    async fn put_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
        attachment: Attachment,
    ) -> DocumentStoreResult<String>;
    async fn get_attachment(
        &self,
        database: &str,
        id: &str,
        name: &str,
    ) -> DocumentStoreResult<Option<Attachment>>;
    async fn delete_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
    ) -> DocumentStoreResult<String>;
    async fn create_database(&self, name: &str) -> DocumentStoreResult<()>;
    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()>;
    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn get_document(&self, database: &str, id: &str) -> DocumentStoreResult<Map<String, Json>> {
        StoreBackend::get_document(self, database, id).await
    }

    async fn get_revision(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> DocumentStoreResult<Map<String, Json>> {
        StoreBackend::get_revision(self, database, id, rev).await
    }

    async fn put_document(
        &self,
        database: &str,
        document: Map<String, Json>,
    ) -> DocumentStoreResult<DocRevision> {
        StoreBackend::put_document(self, database, document).await
    }

    async fn delete_document(&self, database: &str, id: &str, rev: &str) -> DocumentStoreResult<()> {
        StoreBackend::delete_document(self, database, id, rev).await
    }

    async fn bulk_documents(
        &self,
        database: &str,
        documents: Vec<Map<String, Json>>,
    ) -> DocumentStoreResult<Vec<DocRevision>> {
        StoreBackend::bulk_documents(self, database, documents).await
    }

    async fn query_view(
        &self,
        database: &str,
        view: &str,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        StoreBackend::query_view(self, database, view, params).await
    }

    async fn query_temp_view(
        &self,
        database: &str,
        map: MapFn,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        StoreBackend::query_temp_view(self, database, map, params).await
    }

    async fn put_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
        attachment: Attachment,
    ) -> DocumentStoreResult<String> {
        StoreBackend::put_attachment(self, database, id, rev, name, attachment).await
    }

    async fn get_attachment(
        &self,
        database: &str,
        id: &str,
        name: &str,
    ) -> DocumentStoreResult<Option<Attachment>> {
        StoreBackend::get_attachment(self, database, id, name).await
    }

    async fn delete_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
    ) -> DocumentStoreResult<String> {
        StoreBackend::delete_attachment(self, database, id, rev, name).await
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_database(self, name).await
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_database(self, name).await
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_databases(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn get_document(&self, database: &str, id: &str) -> DocumentStoreResult<Map<String, Json>> {
        (**self).get_document(database, id).await
    }

    async fn get_revision(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> DocumentStoreResult<Map<String, Json>> {
        (**self).get_revision(database, id, rev).await
    }

    async fn put_document(
        &self,
        database: &str,
        document: Map<String, Json>,
    ) -> DocumentStoreResult<DocRevision> {
        (**self).put_document(database, document).await
    }

    async fn delete_document(&self, database: &str, id: &str, rev: &str) -> DocumentStoreResult<()> {
        (**self).delete_document(database, id, rev).await
    }

    async fn bulk_documents(
        &self,
        database: &str,
        documents: Vec<Map<String, Json>>,
    ) -> DocumentStoreResult<Vec<DocRevision>> {
        (**self).bulk_documents(database, documents).await
    }

    async fn query_view(
        &self,
        database: &str,
        view: &str,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        (**self).query_view(database, view, params).await
    }

    async fn query_temp_view(
        &self,
        database: &str,
        map: MapFn,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        (**self).query_temp_view(database, map, params).await
    }

    async fn put_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
        attachment: Attachment,
    ) -> DocumentStoreResult<String> {
        (**self).put_attachment(database, id, rev, name, attachment)
            .await
    }

    async fn get_attachment(
        &self,
        database: &str,
        id: &str,
        name: &str,
    ) -> DocumentStoreResult<Option<Attachment>> {
        (**self).get_attachment(database, id, name).await
    }

    async fn delete_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
    ) -> DocumentStoreResult<String> {
        (**self).delete_attachment(database, id, rev, name)
            .await
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        (**self).create_database(name).await
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        (**self).drop_database(name).await
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        (**self).list_databases().await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown_boxed().await
    }
}

/// Factory trait for constructing backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

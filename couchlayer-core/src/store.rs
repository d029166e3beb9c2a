//! Entry point for working with a document database server.
//!
//! A [`DocumentStore`] owns a storage backend and hands out [`Database`] handles bound to
//! it. [`DynDocumentStore`] is the same store over a boxed backend, for code that picks
//! its backend at runtime.
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::{store::DocumentStore, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! store.create_database("blog").await?;
//! let blog = store.database("blog");
//! ```

use tracing::debug;

use crate::{
    backend::StoreBackend,
    database::Database,
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

/// A document store over a backend chosen at runtime.
pub type DynDocumentStore = DocumentStore<Box<dyn crate::backend::DynStoreBackend>>;

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a handle on the database with the given name.
    ///
    /// The database is not checked for existence; operations on a missing database fail
    /// with [`DocumentStoreError::DatabaseNotFound`](crate::error::DocumentStoreError::DatabaseNotFound).
    pub fn database(&self, name: &str) -> Database<'_, B> {
        Database::new(name.to_string(), &self.backend)
    }

    /// Creates a new database with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database already exists or creation fails.
    pub async fn create_database(&self, name: &str) -> DocumentStoreResult<Database<'_, B>> {
        StoreBackend::create_database(&self.backend, name).await?;
        debug!(db = name, "created database");
        Ok(self.database(name))
    }

    /// Returns the named database, creating it first when it does not exist.
    pub async fn get_or_create_database(&self, name: &str) -> DocumentStoreResult<Database<'_, B>> {
        let existing = StoreBackend::list_databases(&self.backend).await?;
        if existing.iter().any(|db| db == name) {
            return Ok(self.database(name));
        }
        self.create_database(name).await
    }

    /// Drops the database with the given name and everything in it.
    pub async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_database(&self.backend, name).await?;
        debug!(db = name, "dropped database");
        Ok(())
    }

    /// Lists the names of all databases.
    pub async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_databases(&self.backend).await
    }

    /// Shuts down the underlying backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Erases the backend type.
    pub fn into_dyn(self) -> DynDocumentStore {
        let backend: Box<dyn crate::backend::DynStoreBackend> = Box::new(self.backend);
        DocumentStore::new(backend)
    }
}

impl DynDocumentStore {
    /// Returns the backend as `B` when it is one.
    pub fn downcast_ref<B: StoreBackend + 'static>(&self) -> Option<&B> {
        crate::backend::DynStoreBackend::as_any(&*self.backend).downcast_ref::<B>()
    }

    /// Recovers the typed store, or `None` when the backend is of another type.
    pub fn into_static<B: StoreBackend + 'static>(self) -> Option<DocumentStore<B>> {
        crate::backend::DynStoreBackend::into_any(self.backend)
            .downcast::<B>()
            .ok()
            .map(|backend| DocumentStore::new(*backend))
    }
}

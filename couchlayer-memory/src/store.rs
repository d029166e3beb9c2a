//! In-memory storage implementation for document stores.
//!
//! This module provides a backend that keeps every database in a HashMap behind an
//! async-aware read-write lock. Documents are stored in their canonical JSON form with
//! revision tracking, attachments, and views defined by Rust map functions.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::{Map, Value as Json, json};
use tracing::{debug, trace};
use uuid::Uuid;

use couchlayer_core::{
    backend::{Attachment, DocRevision, StoreBackend, StoreBackendBuilder},
    document::{ATTACHMENTS_FIELD, ID_FIELD, REV_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    view::{ViewParams, ViewResults, ViewRow},
};

use crate::collate::collate;

pub use couchlayer_core::view::MapFn;

#[derive(Clone)]
struct StoredDocument {
    body: Map<String, Json>,
    attachments: BTreeMap<String, Attachment>,
    /// Earlier bodies by revision, as readers saw them.
    history: BTreeMap<String, Map<String, Json>>,
}

impl StoredDocument {
    fn rev(&self) -> Option<&str> {
        self.body.get(REV_FIELD).and_then(Json::as_str)
    }

    /// Body as returned to readers, with attachment stubs.
    fn full_body(&self) -> Map<String, Json> {
        let mut body = self.body.clone();
        if !self.attachments.is_empty() {
            let stubs = self
                .attachments
                .iter()
                .map(|(name, attachment)| {
                    (
                        name.clone(),
                        json!({
                            "content_type": attachment.content_type,
                            "length": attachment.data.len(),
                            "stub": true,
                        }),
                    )
                })
                .collect::<Map<_, _>>();
            body.insert(ATTACHMENTS_FIELD.to_string(), Json::Object(stubs));
        }
        body
    }

    /// Keeps the current body readable under its revision before it is replaced.
    fn archive(&mut self) {
        if let Some(rev) = self.rev().map(str::to_string) {
            let body = self.full_body();
            self.history.insert(rev, body);
        }
    }

    fn revision(&self, rev: &str) -> Option<Map<String, Json>> {
        if self.rev() == Some(rev) {
            Some(self.full_body())
        } else {
            self.history.get(rev).cloned()
        }
    }
}

#[derive(Clone, Default)]
struct DatabaseState {
    documents: BTreeMap<String, StoredDocument>,
    views: BTreeMap<String, MapFn>,
}

impl fmt::Debug for DatabaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseState")
            .field("documents", &self.documents.len())
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .finish()
    }
}

type StoreMap = HashMap<String, DatabaseState>;

/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait entirely in memory. Each write that
/// targets an existing document must carry its current revision; revisions have the form
/// `<generation>-<random hex>`.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state. Multiple clones
/// of the same instance share the same underlying data.
///
/// # Views
///
/// Views are registered per database as map functions, either on the builder or with
/// [`InMemoryStore::register_view`]. Queries run the map function over every document.
///
/// # Example
///
/// ```ignore
/// use couchlayer_memory::InMemoryStore;
/// use couchlayer_core::backend::StoreBackendBuilder;
/// use serde_json::json;
///
/// let store = InMemoryStore::builder()
///     .database("blog")
///     .view("blog", "by_title", |doc| {
///         vec![(doc.get("title").cloned().unwrap_or_default(), json!(null))]
///     })
///     .build()
///     .await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// database name -> (documents, views)
    databases: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new store without databases.
    pub fn new() -> Self {
        Self {
            databases: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for a store with pre-registered databases and views.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Registers or replaces a view of an existing database.
    pub async fn register_view<F>(&self, database: &str, name: &str, map: F) -> DocumentStoreResult<()>
    where
        F: Fn(&Map<String, Json>) -> Vec<(Json, Json)> + Send + Sync + 'static,
    {
        let mut databases = self.databases.write().await;
        let state = databases
            .get_mut(database)
            .ok_or_else(|| DocumentStoreError::DatabaseNotFound(database.to_string()))?;
        state.views.insert(name.to_string(), Arc::new(map));

        debug!(db = database, view = name, "registered view");
        Ok(())
    }
}

fn database_mut<'a>(databases: &'a mut StoreMap, name: &str) -> DocumentStoreResult<&'a mut DatabaseState> {
    databases
        .get_mut(name)
        .ok_or_else(|| DocumentStoreError::DatabaseNotFound(name.to_string()))
}

fn database_ref<'a>(databases: &'a StoreMap, name: &str) -> DocumentStoreResult<&'a DatabaseState> {
    databases
        .get(name)
        .ok_or_else(|| DocumentStoreError::DatabaseNotFound(name.to_string()))
}

fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(generation, _)| generation.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

fn check_rev(
    stored: Option<&StoredDocument>,
    given: Option<&str>,
    id: &str,
    database: &str,
) -> DocumentStoreResult<()> {
    if stored.and_then(StoredDocument::rev) == given {
        Ok(())
    } else {
        Err(DocumentStoreError::Conflict(id.to_string(), database.to_string()))
    }
}

/// Writes one document body, following the revision rules.
fn write_document(
    documents: &mut BTreeMap<String, StoredDocument>,
    database: &str,
    mut body: Map<String, Json>,
) -> DocumentStoreResult<DocRevision> {
    let id = match body.get(ID_FIELD) {
        Some(Json::String(id)) => id.clone(),
        Some(other) => {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "document id must be a string, not {other}"
            )));
        }
        None => Uuid::new_v4().simple().to_string(),
    };

    let stored = documents.get(&id);
    let given = body
        .get(REV_FIELD)
        .and_then(Json::as_str)
        .map(str::to_string);
    check_rev(stored, given.as_deref(), &id, database)?;

    let (mut attachments, history) = match documents.remove(&id) {
        Some(mut previous) => {
            previous.archive();
            (previous.attachments, previous.history)
        }
        None => (BTreeMap::new(), BTreeMap::new()),
    };
    // Attachments survive unless the body lists stubs and leaves them out.
    if let Some(Json::Object(stubs)) = body.remove(ATTACHMENTS_FIELD) {
        attachments.retain(|name, _| stubs.contains_key(name));
    }

    let rev = next_rev(given.as_deref());
    body.insert(ID_FIELD.to_string(), Json::String(id.clone()));
    body.insert(REV_FIELD.to_string(), Json::String(rev.clone()));
    documents.insert(
        id.clone(),
        StoredDocument {
            body,
            attachments,
            history,
        },
    );

    trace!(db = database, id = %id, rev = %rev, "stored document");
    Ok(DocRevision::new(id, rev))
}

fn stored_mut<'a>(
    state: &'a mut DatabaseState,
    database: &str,
    id: &str,
    rev: &str,
) -> DocumentStoreResult<&'a mut StoredDocument> {
    let stored = state
        .documents
        .get_mut(id)
        .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), database.to_string()))?;
    check_rev(Some(stored), Some(rev), id, database)?;
    Ok(stored)
}

fn bump_rev(stored: &mut StoredDocument) -> String {
    let rev = next_rev(stored.rev());
    stored
        .body
        .insert(REV_FIELD.to_string(), Json::String(rev.clone()));
    rev
}

/// Whether a key falls inside the range selected by `params`.
fn in_range(key: &Json, params: &ViewParams) -> bool {
    if let Some(exact) = &params.key {
        return collate(key, exact).is_eq();
    }

    let (low, high) = if params.descending {
        (&params.end_key, &params.start_key)
    } else {
        (&params.start_key, &params.end_key)
    };
    let above_low = low
        .as_ref()
        .is_none_or(|low| collate(key, low).is_ge());
    let below_high = high
        .as_ref()
        .is_none_or(|high| collate(key, high).is_le());
    above_low && below_high
}

/// Maps every document, then sorts, selects and pages the rows.
fn run_view(
    state: &DatabaseState,
    map: &(dyn Fn(&Map<String, Json>) -> Vec<(Json, Json)> + Send + Sync),
    params: &ViewParams,
) -> ViewResults<ViewRow> {
    let mut rows = Vec::new();
    for (id, stored) in &state.documents {
        let body = stored.full_body();
        for (key, value) in map(&body) {
            let row = ViewRow::new(Some(id.clone()), key, value);
            if params.include_docs {
                rows.push(row.with_doc(body.clone()));
            } else {
                rows.push(row);
            }
        }
    }

    rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));
    if params.descending {
        rows.reverse();
    }

    let total_rows = rows.len();
    let mut selected = rows
        .into_iter()
        .enumerate()
        .filter(|(_, row)| in_range(&row.key, params))
        .skip(params.skip.unwrap_or(0))
        .take(params.limit.unwrap_or(usize::MAX))
        .peekable();
    let offset = selected
        .peek()
        .map(|(position, _)| *position)
        .unwrap_or(total_rows);
    let rows = selected
        .map(|(_, row)| row)
        .collect::<Vec<_>>();

    ViewResults::new(rows, total_rows, offset)
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get_document(&self, database: &str, id: &str) -> DocumentStoreResult<Map<String, Json>> {
        let databases = self.databases.read().await;
        database_ref(&databases, database)?
            .documents
            .get(id)
            .map(StoredDocument::full_body)
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), database.to_string()))
    }

    async fn get_revision(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> DocumentStoreResult<Map<String, Json>> {
        let databases = self.databases.read().await;
        database_ref(&databases, database)?
            .documents
            .get(id)
            .and_then(|stored| stored.revision(rev))
            .ok_or_else(|| {
                DocumentStoreError::DocumentNotFound(format!("{id}@{rev}"), database.to_string())
            })
    }

    async fn put_document(
        &self,
        database: &str,
        document: Map<String, Json>,
    ) -> DocumentStoreResult<DocRevision> {
        let mut databases = self.databases.write().await;
        let state = database_mut(&mut databases, database)?;
        write_document(&mut state.documents, database, document)
    }

    async fn delete_document(&self, database: &str, id: &str, rev: &str) -> DocumentStoreResult<()> {
        let mut databases = self.databases.write().await;
        let state = database_mut(&mut databases, database)?;
        stored_mut(state, database, id, rev)?;
        state.documents.remove(id);

        trace!(db = database, id = id, "removed document");
        Ok(())
    }

    async fn bulk_documents(
        &self,
        database: &str,
        documents: Vec<Map<String, Json>>,
    ) -> DocumentStoreResult<Vec<DocRevision>> {
        let mut databases = self.databases.write().await;
        let state = database_mut(&mut databases, database)?;

        // All or nothing: write into a copy and swap it in once every body went through.
        let mut staged = state.documents.clone();
        let revisions = documents
            .into_iter()
            .map(|document| write_document(&mut staged, database, document))
            .collect::<DocumentStoreResult<Vec<_>>>()?;
        state.documents = staged;

        debug!(db = database, count = revisions.len(), "bulk stored documents");
        Ok(revisions)
    }

    async fn query_view(
        &self,
        database: &str,
        view: &str,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        let databases = self.databases.read().await;
        let state = database_ref(&databases, database)?;
        let map = state
            .views
            .get(view)
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(view.to_string(), database.to_string()))?;

        let results = run_view(state, map.as_ref(), params);
        debug!(
            db = database,
            view = view,
            total_rows = results.total_rows,
            returned = results.len(),
            "queried view"
        );
        Ok(results)
    }

    async fn query_temp_view(
        &self,
        database: &str,
        map: MapFn,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        let databases = self.databases.read().await;
        let state = database_ref(&databases, database)?;

        let results = run_view(state, map.as_ref(), params);
        debug!(
            db = database,
            total_rows = results.total_rows,
            returned = results.len(),
            "queried temporary view"
        );
        Ok(results)
    }

    async fn put_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
        attachment: Attachment,
    ) -> DocumentStoreResult<String> {
        let mut databases = self.databases.write().await;
        let state = database_mut(&mut databases, database)?;
        let stored = stored_mut(state, database, id, rev)?;
        stored.archive();
        stored.attachments.insert(name.to_string(), attachment);
        Ok(bump_rev(stored))
    }

    async fn get_attachment(
        &self,
        database: &str,
        id: &str,
        name: &str,
    ) -> DocumentStoreResult<Option<Attachment>> {
        let databases = self.databases.read().await;
        let stored = database_ref(&databases, database)?
            .documents
            .get(id)
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), database.to_string()))?;
        Ok(stored.attachments.get(name).cloned())
    }

    async fn delete_attachment(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        name: &str,
    ) -> DocumentStoreResult<String> {
        let mut databases = self.databases.write().await;
        let state = database_mut(&mut databases, database)?;
        let stored = stored_mut(state, database, id, rev)?;
        if !stored.attachments.contains_key(name) {
            return Err(DocumentStoreError::DocumentNotFound(
                format!("{id}/{name}"),
                database.to_string(),
            ));
        }
        stored.archive();
        stored.attachments.remove(name);
        Ok(bump_rev(stored))
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        let mut databases = self.databases.write().await;
        if databases.contains_key(name) {
            return Err(DocumentStoreError::DatabaseAlreadyExists(name.to_string()));
        }
        databases.insert(name.to_string(), DatabaseState::default());
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        let mut databases = self.databases.write().await;

        if databases.remove(name).is_none() {
            return Err(DocumentStoreError::DatabaseNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .databases
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// Databases named here, or by a view, exist as soon as the store is built.
///
/// # Example
///
/// ```ignore
/// use couchlayer_memory::InMemoryStore;
/// use couchlayer_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .database("users")
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    databases: BTreeSet<String>,
    views: Vec<(String, String, MapFn)>,
}

impl InMemoryStoreBuilder {
    /// Adds an empty database.
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.databases.insert(name.into());
        self
    }

    /// Adds a view to a database, creating the database if needed.
    pub fn view<F>(mut self, database: impl Into<String>, name: impl Into<String>, map: F) -> Self
    where
        F: Fn(&Map<String, Json>) -> Vec<(Json, Json)> + Send + Sync + 'static,
    {
        let database = database.into();
        self.databases.insert(database.clone());
        self.views.push((database, name.into(), Arc::new(map)));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut databases = self
            .databases
            .into_iter()
            .map(|name| (name, DatabaseState::default()))
            .collect::<StoreMap>();
        for (database, name, map) in self.views {
            if let Some(state) = databases.get_mut(&database) {
                state.views.insert(name, map);
            }
        }

        debug!(databases = databases.len(), "built in-memory store");
        Ok(InMemoryStore {
            databases: Arc::new(RwLock::new(databases)),
        })
    }
}

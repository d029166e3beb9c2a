use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use couchlayer_core::{
    backend::{Attachment, DocRevision, StoreBackend},
    error::{DocumentStoreError, DocumentStoreResult},
    property::Property,
    shape::Shape,
    store::DocumentStore,
    value::Value,
    view::{MapFn, ViewParams, ViewResults, ViewRow},
};
use serde_json::{Map, Value as Json, json};

/// Keeps every body it was handed, per id, in one unnamed database.
#[derive(Debug, Default)]
struct LedgerBackend {
    bodies: Mutex<BTreeMap<String, Vec<Map<String, Json>>>>,
}

impl LedgerBackend {
    fn unsupported(what: &str) -> DocumentStoreError {
        DocumentStoreError::Backend(format!("{what} is not kept by the ledger"))
    }
}

fn rev_of(body: &Map<String, Json>) -> Option<&str> {
    body.get("_rev").and_then(Json::as_str)
}

#[async_trait]
impl StoreBackend for LedgerBackend {
    async fn get_document(&self, database: &str, id: &str) -> DocumentStoreResult<Map<String, Json>> {
        let bodies = self.bodies.lock().unwrap();
        bodies
            .get(id)
            .and_then(|history| history.last().cloned())
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), database.to_string()))
    }

    async fn get_revision(
        &self,
        database: &str,
        id: &str,
        rev: &str,
    ) -> DocumentStoreResult<Map<String, Json>> {
        let bodies = self.bodies.lock().unwrap();
        bodies
            .get(id)
            .and_then(|history| history.iter().find(|body| rev_of(body) == Some(rev)).cloned())
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), database.to_string()))
    }

    async fn put_document(
        &self,
        database: &str,
        mut document: Map<String, Json>,
    ) -> DocumentStoreResult<DocRevision> {
        let mut bodies = self.bodies.lock().unwrap();
        let id = document
            .get("_id")
            .and_then(Json::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("doc-{}", bodies.len() + 1));
        let history = bodies.entry(id.clone()).or_default();
        if history.last().and_then(rev_of) != rev_of(&document) {
            return Err(DocumentStoreError::Conflict(id, database.to_string()));
        }

        let rev = format!("{}-ledger", history.len() + 1);
        document.insert("_id".to_string(), json!(id));
        document.insert("_rev".to_string(), json!(rev));
        history.push(document);
        Ok(DocRevision::new(id, rev))
    }

    async fn delete_document(&self, database: &str, id: &str, rev: &str) -> DocumentStoreResult<()> {
        let mut bodies = self.bodies.lock().unwrap();
        match bodies.get(id).and_then(|history| history.last()) {
            Some(body) if rev_of(body) == Some(rev) => {
                bodies.remove(id);
                Ok(())
            }
            Some(_) => Err(DocumentStoreError::Conflict(id.to_string(), database.to_string())),
            None => Err(DocumentStoreError::DocumentNotFound(id.to_string(), database.to_string())),
        }
    }

    async fn bulk_documents(
        &self,
        database: &str,
        documents: Vec<Map<String, Json>>,
    ) -> DocumentStoreResult<Vec<DocRevision>> {
        let mut revisions = Vec::new();
        for document in documents {
            revisions.push(self.put_document(database, document).await?);
        }
        Ok(revisions)
    }

    async fn query_view(
        &self,
        _database: &str,
        _view: &str,
        _params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        Err(Self::unsupported("stored views"))
    }

    async fn query_temp_view(
        &self,
        _database: &str,
        map: MapFn,
        params: &ViewParams,
    ) -> DocumentStoreResult<ViewResults<ViewRow>> {
        let bodies = self.bodies.lock().unwrap();
        let mut rows = Vec::new();
        for (id, history) in bodies.iter() {
            let Some(body) = history.last() else {
                continue;
            };
            for (key, value) in map(body) {
                let row = ViewRow::new(Some(id.clone()), key, value);
                rows.push(if params.include_docs {
                    row.with_doc(body.clone())
                } else {
                    row
                });
            }
        }
        let total = rows.len();
        Ok(ViewResults::new(rows, total, 0))
    }

    async fn put_attachment(
        &self,
        _database: &str,
        _id: &str,
        _rev: &str,
        _name: &str,
        _attachment: Attachment,
    ) -> DocumentStoreResult<String> {
        Err(Self::unsupported("attachments"))
    }

    async fn get_attachment(
        &self,
        _database: &str,
        _id: &str,
        _name: &str,
    ) -> DocumentStoreResult<Option<Attachment>> {
        Err(Self::unsupported("attachments"))
    }

    async fn delete_attachment(
        &self,
        _database: &str,
        _id: &str,
        _rev: &str,
        _name: &str,
    ) -> DocumentStoreResult<String> {
        Err(Self::unsupported("attachments"))
    }

    async fn create_database(&self, _name: &str) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn drop_database(&self, _name: &str) -> DocumentStoreResult<()> {
        self.bodies.lock().unwrap().clear();
        Ok(())
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(vec![String::from("shelf")])
    }
}

fn book() -> Arc<Shape> {
    Shape::builder("Book")
        .property("title", Property::text().required(true))
        .property("pages", Property::integer())
        .property("tags", Property::string_list())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_save_and_get_round_trip() {
    let store = DocumentStore::new(LedgerBackend::default());
    let shelf = store.database("shelf");
    let book = book();

    let doc = book.create([("title", "Dune")]).unwrap();
    doc.set("pages", 412).unwrap();
    doc.list("tags").unwrap().push("sf").unwrap();
    doc.set("shelf_mark", "B-12").unwrap();

    let revision = shelf.save(&doc).await.unwrap();
    assert_eq!(revision.id, "doc-1");
    assert_eq!(doc.id().as_deref(), Some("doc-1"));
    assert_eq!(doc.rev().as_deref(), Some("1-ledger"));

    let loaded = shelf.get(&book, "doc-1").await.unwrap();
    assert_eq!(loaded.to_json(), doc.to_json());
    assert_eq!(loaded.value("pages").unwrap(), Value::Int(412));
    assert_eq!(loaded.dynamic_fields(), vec!["shelf_mark"]);
    assert_eq!(loaded.list("tags").unwrap().values(), vec![Value::from("sf")]);
}

#[tokio::test]
async fn test_required_fields_never_reach_the_backend() {
    let backend = LedgerBackend::default();
    let store = DocumentStore::new(&backend);
    let doc = book().new_document().unwrap();

    let result = store.database("shelf").save(&doc).await;
    assert!(matches!(result, Err(DocumentStoreError::Schema(_))));
    assert!(backend.bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_rev_and_temp_view_through_the_backend() {
    let store = DocumentStore::new(LedgerBackend::default());
    let shelf = store.database("shelf");
    let book = book();

    let doc = book.create([("title", "Draft")]).unwrap();
    let first = shelf.save(&doc).await.unwrap();
    doc.set("title", "Final").unwrap();
    shelf.save(&doc).await.unwrap();

    let draft = shelf.get_rev(&book, &first.id, &first.rev).await.unwrap();
    assert_eq!(draft.value("title").unwrap(), Value::from("Draft"));
    assert!(shelf.save(&draft).await.unwrap_err().is_conflict());

    let params = ViewParams::builder().include_docs(true).build();
    let results = shelf
        .temp_view(&book, |body| vec![(body["title"].clone(), json!(null))], &params)
        .await
        .unwrap();
    assert_eq!(results.total_rows, 1);
    let entry = results.iter().next().unwrap();
    assert_eq!(
        entry.as_document().unwrap().value("title").unwrap(),
        Value::from("Final")
    );
}

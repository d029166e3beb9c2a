use std::sync::Arc;

use couchlayer_core::{
    backend::StoreBackend,
    error::DocumentStoreError,
    view::{MapFn, ViewParams},
};
use serde_json::{Map, Value as Json, json};

use super::helpers::{blog_store, body};

async fn seeded() -> couchlayer_memory::InMemoryStore {
    let store = blog_store().await;
    for (id, title) in [("p1", "delta"), ("p2", "alpha"), ("p3", "charlie"), ("p4", "bravo")] {
        store
            .put_document("blog", body(json!({"_id": id, "title": title})))
            .await
            .unwrap();
    }
    store
        .put_document("blog", body(json!({"_id": "untitled"})))
        .await
        .unwrap();
    store
}

fn keys(results: &couchlayer_core::view::ViewResults<couchlayer_core::view::ViewRow>) -> Vec<String> {
    results
        .iter()
        .map(|row| row.key.as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_rows_are_ordered_by_key() {
    let store = seeded().await;
    let results = store
        .query_view("blog", "by_title", &ViewParams::new())
        .await
        .unwrap();

    assert_eq!(results.total_rows, 4);
    assert_eq!(results.offset, 0);
    assert_eq!(keys(&results), vec!["alpha", "bravo", "charlie", "delta"]);
    assert_eq!(results.rows[0].id.as_deref(), Some("p2"));
    assert!(results.rows[0].doc.is_none());
}

#[tokio::test]
async fn test_key_range_with_paging() {
    let store = seeded().await;
    let params = ViewParams::builder()
        .start_key("bravo")
        .end_key("delta")
        .skip(1)
        .limit(1)
        .build();

    let results = store.query_view("blog", "by_title", &params).await.unwrap();
    assert_eq!(keys(&results), vec!["charlie"]);
    assert_eq!(results.offset, 3);
    assert_eq!(results.total_rows, 4);
}

#[tokio::test]
async fn test_descending_swaps_bounds() {
    let store = seeded().await;
    let params = ViewParams::builder()
        .descending(true)
        .start_key("charlie")
        .end_key("alpha")
        .build();

    let results = store.query_view("blog", "by_title", &params).await.unwrap();
    assert_eq!(keys(&results), vec!["charlie", "bravo", "alpha"]);
    assert_eq!(results.offset, 1);
}

#[tokio::test]
async fn test_exact_key_and_include_docs() {
    let store = seeded().await;
    let params = ViewParams::builder()
        .key("alpha")
        .include_docs(true)
        .build();

    let results = store.query_view("blog", "by_title", &params).await.unwrap();
    assert_eq!(results.len(), 1);
    let doc = results.rows[0].doc.as_ref().unwrap();
    assert_eq!(doc["_id"], json!("p2"));
    assert!(doc.contains_key("_rev"));
}

#[tokio::test]
async fn test_unknown_view() {
    let store = seeded().await;
    let result = store
        .query_view("blog", "missing", &ViewParams::new())
        .await;
    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_register_view_later() {
    let store = seeded().await;
    store
        .register_view("blog", "all", |doc| {
            vec![(doc.get("_id").cloned().unwrap_or_default(), json!(null))]
        })
        .await
        .unwrap();

    let results = store.query_view("blog", "all", &ViewParams::new()).await.unwrap();
    assert_eq!(results.total_rows, 5);

    let missing_db = store.register_view("nope", "all", |_| Vec::new()).await;
    assert!(matches!(missing_db, Err(DocumentStoreError::DatabaseNotFound(_))));
}

#[tokio::test]
async fn test_temp_view_runs_without_registration() {
    let store = seeded().await;
    let by_length: MapFn = Arc::new(|doc: &Map<String, Json>| match doc.get("title").and_then(Json::as_str) {
        Some(title) => vec![(json!(title.len()), json!(title))],
        None => Vec::new(),
    });

    let params = ViewParams::builder()
        .start_key(json!(6))
        .include_docs(true)
        .build();
    let results = store
        .query_temp_view("blog", Arc::clone(&by_length), &params)
        .await
        .unwrap();

    assert_eq!(results.total_rows, 4);
    assert_eq!(results.offset, 3);
    let values = results
        .iter()
        .map(|row| row.value.clone())
        .collect::<Vec<_>>();
    assert_eq!(values, vec![json!("charlie")]);
    assert_eq!(results.rows[0].doc.as_ref().unwrap()["_id"], json!("p3"));

    let unregistered = store.query_view("blog", "by_length", &ViewParams::new()).await;
    assert!(unregistered.unwrap_err().is_not_found());

    let missing_db = store
        .query_temp_view("nope", by_length, &ViewParams::new())
        .await;
    assert!(matches!(missing_db, Err(DocumentStoreError::DatabaseNotFound(_))));
}

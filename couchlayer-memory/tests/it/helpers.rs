use couchlayer_core::backend::StoreBackendBuilder;
use couchlayer_memory::InMemoryStore;
use serde_json::{Map, Value as Json, json};

pub fn body(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// A store with a `blog` database and a `by_title` view emitting `(title, 1)`.
pub async fn blog_store() -> InMemoryStore {
    InMemoryStore::builder()
        .database("blog")
        .view("blog", "by_title", |doc| match doc.get("title") {
            Some(title) => vec![(title.clone(), json!(1))],
            None => Vec::new(),
        })
        .build()
        .await
        .unwrap()
}

//! Typed, schema-aware document mapping over a JSON document database.
//!
//! This crate is the entry point for users of couchlayer. It re-exports the schema engine
//! and persistence layer from `couchlayer-core` and the bundled storage backends.
//!
//! # Features
//!
//! - **Shapes** - Declare typed properties with defaults, choices, validators and inheritance
//! - **Dynamic fields** - Store undeclared fields next to declared ones, with type detection
//! - **Live containers** - Edit nested maps and lists in place, with the canonical JSON kept in step
//! - **Persistence** - Save, fetch, delete and bulk-save documents with revision checks
//! - **Views** - Query map views by key range, with rows wrapped back into documents
//!
//! # Quick Start
//!
//! ```ignore
//! use couchlayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder()
//!         .view("blog", "by_title", |doc| {
//!             doc.get("title")
//!                 .map(|title| vec![(title.clone(), serde_json::Value::Null)])
//!                 .unwrap_or_default()
//!         })
//!         .build()
//!         .await?;
//!     let store = DocumentStore::new(backend);
//!     let blog = store.database("blog");
//!
//!     let post = Shape::builder("Post")
//!         .property("title", Property::text().required(true))
//!         .property("tags", Property::string_list())
//!         .build()?;
//!
//!     let doc = post.create([("title", "Hello")])?;
//!     doc.list("tags")?.push("intro")?;
//!     blog.save(&doc).await?;
//!
//!     let fetched = blog.get(&post, &doc.id().unwrap_or_default()).await?;
//!     assert_eq!(fetched.value("title")?, Value::from("Hello"));
//!
//!     let rows = blog
//!         .view(&post, "by_title", &ViewParams::builder().include_docs(true).build())
//!         .await?;
//!     assert_eq!(rows.len(), 1);
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A [`store::DocumentStore`] can erase its backend type with `into_dyn`, for code that
//! picks the backend at runtime. `downcast_ref` and `into_static` recover the concrete
//! backend.
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing

pub mod prelude;

pub use couchlayer_core::{
    backend, container, convert, database, document, error, property, shape, store, value, view,
};

// Re-exported so applications build values and backends against the same versions
pub use async_trait;
pub use chrono;
pub use rust_decimal;
pub use serde_json;

/// In-memory storage backend.
pub mod memory {
    pub use couchlayer_memory::{InMemoryStore, InMemoryStoreBuilder, MapFn, collate};
}

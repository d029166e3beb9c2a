//! In-memory document storage backend for couchlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and testing.
//!
//! # Features
//!
//! - **Revision checks** - Writes to an existing document must carry its current `_rev`
//! - **Bulk writes** - All or nothing
//! - **Views** - Map functions written in Rust, queried with key ranges, paging and ordering
//! - **Attachments** - Stored per document, reported as `_attachments` stubs
//!
//! # Quick Start
//!
//! ```ignore
//! use couchlayer::prelude::*;
//! use couchlayer::memory::InMemoryStore;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().database("blog").build().await?;
//!     let store = DocumentStore::new(backend);
//!
//!     let post = Shape::builder("Post")
//!         .property("title", Property::text())
//!         .build()?;
//!
//!     let doc = post.create([("title", "Hello")])?;
//!     store.database("blog").save(&doc).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as couchlayer_memory;

pub mod collate;
pub mod store;

pub use collate::collate;
pub use store::{InMemoryStore, InMemoryStoreBuilder, MapFn};

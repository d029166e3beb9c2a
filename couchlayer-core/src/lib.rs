//! A schema-aware document mapper over a JSON document database.
//!
//! This crate is the core of the couchlayer project and provides:
//!
//! - **Native values** ([`value`]) - The application-side value model
//! - **Type converters** ([`convert`]) - Conversion between native values and canonical JSON
//! - **Property descriptors** ([`property`]) - Typed field declarations with defaults, choices and validators
//! - **Synchronized containers** ([`container`]) - Map and list handles that keep both views of a document in step
//! - **Schemas** ([`shape`]) - Named sets of properties with inheritance and dynamic-field policy
//! - **Documents** ([`document`]) - Instances of a schema, with declared and dynamic fields
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Databases and views** ([`database`], [`view`]) - Saving, fetching and querying documents
//! - **Document store** ([`store`]) - Entry point owning a backend
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use couchlayer_core::{property::Property, shape::Shape, value::Value};
//!
//! let post = Shape::builder("Post")
//!     .property("title", Property::text().required(true))
//!     .property("tags", Property::string_list())
//!     .build()?;
//!
//! let doc = post.create([("title", "Hello")])?;
//! doc.list("tags")?.push("rust")?;
//! doc.set("mood", "happy")?;
//!
//! assert_eq!(doc.to_json()["tags"], serde_json::json!(["rust"]));
//! assert_eq!(doc.value("mood")?, Value::from("happy"));
//! # Ok::<(), couchlayer_core::error::DocumentError>(())
//! ```

#[allow(unused_extern_crates)]
extern crate self as couchlayer_core;

pub mod backend;
pub mod container;
pub mod convert;
pub mod database;
pub mod document;
pub mod error;
pub mod property;
pub mod shape;
pub mod store;
pub mod value;
pub mod view;

pub(crate) mod tree;

//! Convenient re-exports of commonly used types from couchlayer.
//!
//! ```ignore
//! use couchlayer::prelude::*;
//! ```
//!
//! This provides access to shapes and properties, documents and their containers, the
//! store and database handles, view queries, and the error types.

pub use couchlayer_core::{
    backend::{Attachment, DocRevision, DynStoreBackend, StoreBackend, StoreBackendBuilder},
    container::{Field, LazyList, LazyMap},
    database::Database,
    document::Document,
    error::{DocumentError, DocumentResult, DocumentStoreError, DocumentStoreResult},
    property::{Property, PropertyKind},
    shape::{Shape, ShapeBuilder},
    store::{DocumentStore, DynDocumentStore},
    value::{Value, ValueKind},
    view::{ViewEntry, ViewParams, ViewResults, ViewRow},
};

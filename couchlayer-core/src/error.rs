//! Error types and result types for schema and document store operations.
//!
//! Two layers of errors exist:
//!
//! - [`DocumentError`] is raised locally and synchronously by the schema engine: shape
//!   declaration, attribute routing, conversion and validation. These are programming
//!   errors and are never retried.
//! - [`DocumentStoreError`] covers everything that involves the store collaborator. Schema
//!   errors raised while persisting are carried in [`DocumentStoreError::Schema`].
//!
//! Use [`DocumentResult<T>`] and [`DocumentStoreResult<T>`] as return types.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Errors raised by the schema engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    /// A required field holds an empty value at validation time.
    #[error("Property {0} is required")]
    RequiredFieldMissing(String),
    /// The value is not one of the configured choices for the field.
    #[error("Property {field} is {value}; must be one of {choices}")]
    ChoiceViolation {
        field: String,
        value: String,
        choices: String,
    },
    /// The value does not have the type expected by the declared kind.
    #[error("Property {field} must be {expected}, not {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },
    /// The value cannot be represented in the canonical document.
    #[error("Document cannot accept values of type {0}")]
    UnsupportedValueType(String),
    /// The shape does not allow dynamic fields and the name is not declared.
    #[error("{0} is not defined in schema (not a valid property)")]
    UndeclaredField(String),
    /// A field name is declared more than once across a shape and its parents.
    #[error("Duplicate property: {0}")]
    DuplicateField(String),
    /// A document id is not a string or starts with an underscore.
    #[error("id {0} is invalid")]
    InvalidIdentifier(String),
    /// A reserved name was used to declare or set a field.
    #[error("Cannot define property using reserved word {0}")]
    ReservedFieldName(String),
    /// A configured validator rejected the value.
    #[error("Property {field} failed validation: {reason}")]
    ValidationFailed { field: String, reason: String },
    /// The name is neither declared, dynamic, nor present in the document.
    #[error("Field not found: {0}")]
    FieldNotFound(String),
    /// A list index is outside the list bounds.
    #[error("Index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    /// A container handle points at a region that no longer exists or changed shape.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// A specialized `Result` type for schema engine operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

impl DocumentError {
    /// Names the field a type mismatch was raised for.
    pub(crate) fn with_field(self, name: &str) -> Self {
        match self {
            DocumentError::TypeMismatch {
                expected, found, ..
            } => DocumentError::TypeMismatch {
                field: name.to_string(),
                expected,
                found,
            },
            other => other,
        }
    }
}

/// Represents all possible errors that can occur when interacting with a document store.
///
/// This enum covers serialization errors, document lifecycle issues, database management,
/// revision conflicts and backend-specific errors.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting documents to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document was not found in the database.
    /// The first argument is the document ID, the second is the database name.
    #[error("Document not found {0} in database {1}")]
    DocumentNotFound(String, String),
    /// The requested database does not exist in the store.
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),
    /// A database with the given name already exists.
    #[error("Database already exists: {0}")]
    DatabaseAlreadyExists(String),
    /// The revision sent with a write does not match the stored revision.
    /// The first argument is the document ID, the second is the database name.
    #[error("Document update conflict for {0} in database {1}")]
    Conflict(String, String),
    /// The operation needs a document that has been saved at least once.
    #[error("The document is not saved")]
    NotSaved,
    /// The document violates structural constraints of the store.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The schema engine rejected the document before it reached the store.
    #[error(transparent)]
    Schema(#[from] DocumentError),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A specialized `Result` type for document store operations.
///
/// This type alias is used throughout the crate to indicate operations that may fail
/// with a [`DocumentStoreError`].
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Returns `true` when the error reports a missing document or database.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::DocumentNotFound(..) | DocumentStoreError::DatabaseNotFound(_)
        )
    }

    /// Returns `true` when the error is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DocumentStoreError::Conflict(..))
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

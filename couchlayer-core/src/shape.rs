//! Document shapes: named, composable sets of properties.
//!
//! A shape is declared once with [`ShapeBuilder`] and shared behind an [`Arc`]. Shapes
//! compose explicitly: every parent passed to [`ShapeBuilder::parent`] contributes its
//! properties, and a field name may only come from one place.
//!
//! ```ignore
//! let base = Shape::builder("Base")
//!     .property("created", Property::datetime().auto_now_add(true))
//!     .build()?;
//!
//! let post = Shape::builder("Post")
//!     .parent(&base)
//!     .property("title", Property::text().required(true))
//!     .literal("views", 0)
//!     .build()?;
//!
//! let doc = post.create([("title", Value::from("Hello"))])?;
//! ```

use std::{collections::BTreeMap, sync::Arc};

use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::{
    document::Document,
    error::{DocumentError, DocumentResult},
    property::Property,
    value::Value,
};

/// Keys that can never be declared or set as fields.
pub const RESERVED_FIELDS: &[&str] = &["_id", "_rev", "$schema", "type", "doc_type"];

/// The key holding the shape tag in every canonical document.
pub const DOC_TYPE_FIELD: &str = "doc_type";

/// Returns `true` for names that are not usable as field names.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with('_') || RESERVED_FIELDS.contains(&name)
}

/// Where a read or write of a named attribute goes.
pub(crate) enum Route<'a> {
    /// `_id`.
    Id,
    /// `_rev`.
    Rev,
    /// Any other reserved key, such as the shape tag or `_attachments`.
    Reserved,
    Declared(&'a Arc<Property>),
    Dynamic,
}

/// An aggregated set of properties plus the tag written into every instance.
#[derive(Debug)]
pub struct Shape {
    name: String,
    doc_type: String,
    properties: BTreeMap<String, Arc<Property>>,
    fields: BTreeMap<String, String>,
    parents: Vec<String>,
    allow_dynamic: bool,
}

impl Shape {
    pub fn builder(name: impl Into<String>) -> ShapeBuilder {
        ShapeBuilder::new(name)
    }

    /// Derives an unnamed shape from `parent` with additional properties.
    pub fn anonymous<K, I>(parent: &Arc<Shape>, properties: I) -> DocumentResult<Arc<Shape>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Property)>,
    {
        properties
            .into_iter()
            .fold(
                Shape::builder(format!("{}_anonymous", parent.name))
                    .doc_type(parent.doc_type.clone())
                    .parent(parent),
                |builder, (attr, property)| builder.property(attr, property),
            )
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Names of the shapes this one was composed from.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn allow_dynamic(&self) -> bool {
        self.allow_dynamic
    }

    /// Declared properties by attribute name, inherited ones included.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Arc<Property>)> {
        self.properties
            .iter()
            .map(|(attr, property)| (attr.as_str(), property))
    }

    pub fn property(&self, attr: &str) -> Option<&Arc<Property>> {
        self.properties.get(attr)
    }

    /// The property stored under the canonical key `field`.
    pub fn property_for_field(&self, field: &str) -> Option<(&str, &Arc<Property>)> {
        let attr = self.fields.get(field)?;
        self.properties
            .get(attr)
            .map(|property| (attr.as_str(), property))
    }

    /// Returns `true` when `field` is the canonical key of a declared property.
    pub fn claims(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub(crate) fn route(&self, name: &str) -> Route<'_> {
        match name {
            "_id" => Route::Id,
            "_rev" => Route::Rev,
            _ if is_reserved(name) => Route::Reserved,
            _ => match self
                .properties
                .get(name)
                .or_else(|| self.property_for_field(name).map(|(_, property)| property))
            {
                Some(property) => Route::Declared(property),
                None => Route::Dynamic,
            },
        }
    }

    /// Creates a document with every property at its default.
    pub fn new_document(self: &Arc<Self>) -> DocumentResult<Document> {
        Document::build(Arc::clone(self), BTreeMap::new())
    }

    /// Creates a document from attribute values.
    ///
    /// Declared attributes are initialized from the given value or their default. `_id` is
    /// validated and stored. Everything else is set as a dynamic field.
    pub fn create<K, V>(
        self: &Arc<Self>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> DocumentResult<Document>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Document::build(Arc::clone(self), fields)
    }

    /// Reconstructs a document from its canonical form.
    pub fn wrap(self: &Arc<Self>, json: Map<String, Json>) -> DocumentResult<Document> {
        debug!(shape = %self.name, id = ?json.get("_id"), "wrapping document");
        Document::load(Arc::clone(self), json)
    }

    /// Like [`Shape::wrap`] for any JSON value; fails unless it is an object.
    pub fn wrap_value(self: &Arc<Self>, json: Json) -> DocumentResult<Document> {
        match json {
            Json::Object(object) => self.wrap(object),
            other => Err(DocumentError::TypeMismatch {
                field: self.name.clone(),
                expected: String::from("object"),
                found: other.to_string(),
            }),
        }
    }
}

enum Declaration {
    Property(Property),
    Literal(Value),
}

/// Builder for [`Shape`].
pub struct ShapeBuilder {
    name: String,
    doc_type: Option<String>,
    parents: Vec<Arc<Shape>>,
    declarations: Vec<(String, Declaration)>,
    allow_dynamic: Option<bool>,
}

impl ShapeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc_type: None,
            parents: Vec::new(),
            declarations: Vec::new(),
            allow_dynamic: None,
        }
    }

    /// Overrides the shape tag, which defaults to the shape name.
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn parent(mut self, parent: &Arc<Shape>) -> Self {
        self.parents.push(Arc::clone(parent));
        self
    }

    pub fn property(mut self, attr: impl Into<String>, property: Property) -> Self {
        self.declarations
            .push((attr.into(), Declaration::Property(property)));
        self
    }

    /// Declares a field from a plain value; it becomes a property of the value's kind
    /// defaulting to that value.
    pub fn literal(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.declarations
            .push((attr.into(), Declaration::Literal(value.into())));
        self
    }

    /// Whether undeclared fields may be set. Inherited from the first parent when unset,
    /// otherwise `true`.
    pub fn allow_dynamic(mut self, allow: bool) -> Self {
        self.allow_dynamic = Some(allow);
        self
    }

    pub fn build(self) -> DocumentResult<Arc<Shape>> {
        let mut properties: BTreeMap<String, Arc<Property>> = BTreeMap::new();

        for parent in &self.parents {
            for (attr, property) in &parent.properties {
                match properties.get(attr) {
                    Some(existing) if Arc::ptr_eq(existing, property) => {}
                    Some(_) => return Err(DocumentError::DuplicateField(attr.clone())),
                    None => {
                        properties.insert(attr.clone(), Arc::clone(property));
                    }
                }
            }
        }

        for (attr, declaration) in self.declarations {
            if is_reserved(&attr) {
                return Err(DocumentError::ReservedFieldName(attr));
            }
            if properties.contains_key(&attr) {
                return Err(DocumentError::DuplicateField(attr));
            }

            let mut property = match declaration {
                Declaration::Property(property) => property,
                Declaration::Literal(value) => Property::for_value(value)
                    .ok_or_else(|| DocumentError::UnsupportedValueType(String::from("null")))?,
            };
            property.configure(&attr);
            if is_reserved(property.field()) {
                return Err(DocumentError::ReservedFieldName(property.field().to_string()));
            }
            properties.insert(attr, Arc::new(property));
        }

        let mut fields = BTreeMap::new();
        for (attr, property) in &properties {
            if fields
                .insert(property.field().to_string(), attr.clone())
                .is_some()
            {
                return Err(DocumentError::DuplicateField(property.field().to_string()));
            }
        }

        let allow_dynamic = self
            .allow_dynamic
            .or_else(|| self.parents.first().map(|parent| parent.allow_dynamic))
            .unwrap_or(true);

        debug!(
            shape = %self.name,
            properties = properties.len(),
            allow_dynamic,
            "built shape"
        );

        Ok(Arc::new(Shape {
            doc_type: self.doc_type.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            properties,
            fields,
            parents: self
                .parents
                .iter()
                .map(|parent| parent.name.clone())
                .collect(),
            allow_dynamic,
        }))
    }
}

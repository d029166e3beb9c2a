//! Document instances and attribute routing.
//!
//! A [`Document`] pairs a [`Shape`] with a canonical JSON object. Every named read, write
//! and delete is routed the same way:
//!
//! 1. `_id` and `_rev` go straight to the canonical object. Other reserved keys (the shape
//!    tag, `_attachments`, any `_`-prefixed key) can be read but never written.
//! 2. A name declared by the shape, by attribute or by stored key, goes through its
//!    [`Property`].
//! 3. Anything else is a dynamic field, allowed only when the shape allows dynamic
//!    fields.
//!
//! Reads of map and list fields return live [`LazyMap`]/[`LazyList`] handles and reads of
//! embedded-document fields return a [`Document`] sharing storage with its parent. All of
//! them edit the same canonical object, which is what gets persisted.
//!
//! Documents use shared single-threaded storage and are therefore neither `Send` nor
//! `Sync`. Use one per task and move the canonical form ([`Document::to_json`]) across
//! threads if needed.
//!
//! # Example
//!
//! ```ignore
//! let doc = post.new_document()?;
//! doc.set("title", "Hello")?;
//! doc.set("tags", vec!["a", "b"])?;
//! doc.list("tags")?.push("c")?;
//! assert_eq!(doc.to_json()["tags"], json!(["a", "b", "c"]));
//! ```

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc, sync::Arc};

use serde_json::{Map, Value as Json};
use tracing::trace;

use crate::{
    container::{Field, LazyList, LazyMap},
    convert::{detect, to_canonical},
    error::{DocumentError, DocumentResult},
    property::{Property, PropertyKind},
    shape::{DOC_TYPE_FIELD, Route, Shape, is_reserved},
    tree::{FieldPath, SharedTree, Slot, Tree, child_path, describe},
    value::Value,
};

/// The key holding the document id.
pub const ID_FIELD: &str = "_id";

/// The key holding the revision token.
pub const REV_FIELD: &str = "_rev";

/// The key holding attachment stubs.
pub const ATTACHMENTS_FIELD: &str = "_attachments";

/// A document of a given [`Shape`].
pub struct Document {
    shape: Arc<Shape>,
    tree: SharedTree,
    base: FieldPath,
}

impl Document {
    pub(crate) fn build(shape: Arc<Shape>, fields: BTreeMap<String, Value>) -> DocumentResult<Self> {
        let doc = Document {
            shape,
            tree: Tree::shared(Map::new()),
            base: Vec::new(),
        };
        doc.populate(fields)?;
        Ok(doc)
    }

    pub(crate) fn load(shape: Arc<Shape>, json: Map<String, Json>) -> DocumentResult<Self> {
        let doc = Document {
            shape,
            tree: Tree::shared(json),
            base: Vec::new(),
        };
        doc.reload()?;
        Ok(doc)
    }

    fn embedded_at(&self, key: &str, shape: &Arc<Shape>) -> Document {
        Document {
            shape: Arc::clone(shape),
            tree: Rc::clone(&self.tree),
            base: child_path(&self.base, key),
        }
    }

    /// Writes the shape tag, `_id`, every declared property and the remaining fields.
    fn populate(&self, mut fields: BTreeMap<String, Value>) -> DocumentResult<()> {
        self.put(DOC_TYPE_FIELD, Json::String(self.shape.doc_type().to_string()), None)?;

        if let Some(id) = fields.remove(ID_FIELD) {
            self.assign_id(id)?;
        }

        for (attr, property) in self.shape.properties() {
            let value = fields
                .remove(attr)
                .or_else(|| fields.remove(property.field()))
                .unwrap_or_default();
            self.init_property(property, value)?;
        }

        for (name, value) in fields {
            if !value.is_null() {
                self.set(&name, value)?;
            }
        }
        Ok(())
    }

    /// Rebuilds both views from the canonical object this document was loaded with.
    fn reload(&self) -> DocumentResult<()> {
        if self.raw(DOC_TYPE_FIELD).is_none() {
            self.put(DOC_TYPE_FIELD, Json::String(self.shape.doc_type().to_string()), None)?;
        }

        for (_, property) in self.shape.properties() {
            let key = property.field();
            let raw = self.raw(key).unwrap_or(Json::Null);

            if let PropertyKind::Schema(shape) = property.kind() {
                match raw {
                    Json::Object(_) => self.embedded_at(key, shape).reload()?,
                    _ => self.init_embedded(key, shape, property.default_value())?,
                }
                continue;
            }

            let (value, json) = if raw.is_null() {
                let value = property.default_value();
                let json = property.to_canonical(&value)?;
                (value, json)
            } else {
                let value = property.to_native(&raw)?;
                let json = to_canonical(&value)?;
                (value, json)
            };
            property.validate(&value, false)?;
            self.store_declared(property, value, json)?;
        }

        if self.shape.allow_dynamic() {
            let unclaimed = self
                .tree
                .borrow()
                .node(&self.base)
                .map(|node| {
                    node.iter()
                        .filter(|(key, _)| !is_reserved(key) && !self.shape.claims(key))
                        .map(|(key, raw)| (key.clone(), detect(raw)))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            // Null dynamic fields are dropped, as if they were never set.
            for (key, value) in unclaimed {
                if value.is_null() {
                    self.tree.borrow_mut().remove_field(&self.base, &key)?;
                } else {
                    self.set_dynamic(&key, value)?;
                }
            }
        }
        Ok(())
    }

    fn raw(&self, key: &str) -> Option<Json> {
        self.tree
            .borrow()
            .node(&self.base)
            .and_then(|node| node.get(key))
            .cloned()
    }

    fn put(&self, key: &str, json: Json, slot: Option<Slot>) -> DocumentResult<()> {
        self.tree.borrow_mut().put_field(&self.base, key, json, slot)
    }

    fn init_property(&self, property: &Property, value: Value) -> DocumentResult<()> {
        let value = if value.is_null() {
            property.default_value()
        } else {
            value
        };

        match property.kind() {
            PropertyKind::Schema(shape) => self.init_embedded(property.field(), shape, value),
            _ if value.is_null() => self.put(property.field(), Json::Null, None),
            _ => self.write_declared(property, value),
        }
    }

    fn init_embedded(&self, key: &str, shape: &Arc<Shape>, value: Value) -> DocumentResult<()> {
        let fields = match value {
            Value::Null => BTreeMap::new(),
            Value::Map(entries) => entries,
            other => {
                return Err(DocumentError::TypeMismatch {
                    field: key.to_string(),
                    expected: String::from("document"),
                    found: other.kind().name().to_string(),
                });
            }
        };
        let staged = Document::build(Arc::clone(shape), fields)?;
        let subtree = staged
            .tree
            .borrow()
            .subtree(&[])
            .ok_or_else(|| DocumentError::InvalidPath(key.to_string()))?;
        self.tree.borrow_mut().graft(&self.base, key, subtree, None)
    }

    fn write_declared(&self, property: &Property, value: Value) -> DocumentResult<()> {
        property.validate(&value, false)?;
        let json = property.to_canonical(&value)?;
        self.store_declared(property, value, json)
    }

    fn store_declared(&self, property: &Property, value: Value, json: Json) -> DocumentResult<()> {
        let slot = match value {
            Value::Map(_) | Value::List(_) if property.kind().is_container() => {
                Some(Slot::Value(value))
            }
            _ => None,
        };
        self.put(property.field(), json, slot)
    }

    fn set_dynamic(&self, key: &str, value: Value) -> DocumentResult<()> {
        let json = to_canonical(&value)?;
        trace!(field = key, kind = %value.kind(), "setting dynamic field");
        self.put(key, json, Some(Slot::Value(value)))
    }

    fn ensure_dynamic(&self, name: &str) -> DocumentResult<()> {
        if self.shape.allow_dynamic() {
            Ok(())
        } else {
            Err(DocumentError::UndeclaredField(name.to_string()))
        }
    }

    fn assign_id(&self, value: Value) -> DocumentResult<()> {
        match value {
            Value::Text(id) if !id.starts_with('_') => self.put(ID_FIELD, Json::String(id), None),
            other => Err(DocumentError::InvalidIdentifier(other.to_string())),
        }
    }

    /// Live handle over a map or list stored at `key`, if both views hold one.
    fn container_at(&self, key: &str) -> Option<Field> {
        let path = child_path(&self.base, key);
        let tree = self.tree.borrow();
        match tree.materialize_ref(&path, &[])? {
            (Json::Object(_), Value::Map(_)) => Some(Field::Map(LazyMap::new(
                Rc::clone(&self.tree),
                path,
                Vec::new(),
            ))),
            (Json::Array(_), Value::List(_)) => Some(Field::List(LazyList::new(
                Rc::clone(&self.tree),
                path,
                Vec::new(),
            ))),
            _ => None,
        }
    }

    fn read_declared(&self, property: &Property) -> DocumentResult<Field> {
        let key = property.field();
        match property.kind() {
            PropertyKind::Schema(shape) => {
                if !matches!(self.raw(key), Some(Json::Object(_))) {
                    self.init_embedded(key, shape, property.default_value())?;
                }
                Ok(Field::Document(self.embedded_at(key, shape)))
            }
            kind if kind.is_container() => match self.container_at(key) {
                Some(field) => Ok(field),
                None => {
                    let default = property.default_value();
                    if default.is_null() {
                        return Ok(Field::Value(Value::Null));
                    }
                    self.write_declared(property, default)?;
                    self.container_at(key).ok_or_else(|| {
                        DocumentError::InvalidPath(describe(&child_path(&self.base, key), &[]))
                    })
                }
            },
            _ => {
                let value = match self.raw(key) {
                    Some(raw) if !raw.is_null() => property.to_native(&raw)?,
                    _ => property.default_value(),
                };
                Ok(Field::Value(value))
            }
        }
    }

    fn read_dynamic(&self, name: &str) -> DocumentResult<Field> {
        let path = child_path(&self.base, name);
        let tree = self.tree.borrow();
        match tree.slot(&path) {
            Some(Slot::Value(Value::Map(_))) => {
                return Ok(Field::Map(LazyMap::new(Rc::clone(&self.tree), path, Vec::new())));
            }
            Some(Slot::Value(Value::List(_))) => {
                return Ok(Field::List(LazyList::new(Rc::clone(&self.tree), path, Vec::new())));
            }
            Some(Slot::Value(value)) => return Ok(Field::Value(value.clone())),
            Some(Slot::Embedded(shape)) => {
                return Ok(Field::Document(Document {
                    shape: Arc::clone(shape),
                    tree: Rc::clone(&self.tree),
                    base: path,
                }));
            }
            None => {}
        }

        tree.node(&self.base)
            .and_then(|node| node.get(name))
            .map(|raw| Field::Value(detect(raw)))
            .ok_or_else(|| DocumentError::FieldNotFound(name.to_string()))
    }

    /// Native value of a declared field as currently stored, without defaults.
    fn current_value(&self, property: &Property) -> DocumentResult<Value> {
        let key = property.field();
        if property.kind().is_container() {
            let path = child_path(&self.base, key);
            if let Some(Slot::Value(value)) = self.tree.borrow().slot(&path) {
                return Ok(value.clone());
            }
        }
        match self.raw(key) {
            Some(raw) => property.to_native(&raw),
            None => Ok(Value::Null),
        }
    }

    /// Reads a field.
    ///
    /// Declared fields whose stored value is absent or null read as their default. Map and
    /// list fields come back as live handles, embedded documents as [`Field::Document`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::FieldNotFound`] when the name is not declared and nothing
    /// is stored under it, or a conversion error when the stored value cannot be read as
    /// the declared kind.
    pub fn get(&self, name: &str) -> DocumentResult<Field> {
        match self.shape.route(name) {
            Route::Id | Route::Rev => Ok(Field::Value(match self.raw(name) {
                Some(Json::String(token)) => Value::Text(token),
                _ => Value::Null,
            })),
            Route::Reserved => self
                .raw(name)
                .map(|raw| Field::Value(detect(&raw)))
                .ok_or_else(|| DocumentError::FieldNotFound(name.to_string())),
            Route::Declared(property) => self.read_declared(property),
            Route::Dynamic => self.read_dynamic(name),
        }
    }

    /// Reads a detached native copy of a field.
    pub fn value(&self, name: &str) -> DocumentResult<Value> {
        self.get(name).map(Field::into_value)
    }

    /// Reads a map field as a live handle.
    pub fn map(&self, name: &str) -> DocumentResult<LazyMap> {
        self.get(name)?.into_map().map_err(|err| err.with_field(name))
    }

    /// Reads a list field as a live handle.
    pub fn list(&self, name: &str) -> DocumentResult<LazyList> {
        self.get(name)?.into_list().map_err(|err| err.with_field(name))
    }

    /// Reads an embedded document field.
    pub fn embedded(&self, name: &str) -> DocumentResult<Document> {
        self.get(name)?
            .into_document()
            .map_err(|err| err.with_field(name))
    }

    /// Writes a field.
    ///
    /// Declared fields are validated (without the required check) and converted by their
    /// property. Assigning a map to an embedded-document field builds a document of that
    /// shape from it. Other names become dynamic fields; map and list values get a fresh
    /// canonical node.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::InvalidIdentifier`] for an `_id` that is not text or starts with
    ///   an underscore.
    /// - [`DocumentError::ReservedFieldName`] for `_rev` and other reserved keys.
    /// - [`DocumentError::UndeclaredField`] for dynamic names on a shape without dynamic
    ///   fields.
    /// - [`DocumentError::UnsupportedValueType`] when the value cannot be stored as JSON.
    /// - Any validation error raised by the property.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> DocumentResult<()> {
        let value = value.into();
        match self.shape.route(name) {
            Route::Id => self.assign_id(value),
            Route::Rev | Route::Reserved => Err(DocumentError::ReservedFieldName(name.to_string())),
            Route::Declared(property) => match property.kind() {
                PropertyKind::Schema(shape) => self.init_embedded(property.field(), shape, value),
                _ => self.write_declared(property, value),
            },
            Route::Dynamic => {
                self.ensure_dynamic(name)?;
                self.set_dynamic(name, value)
            }
        }
    }

    /// Stores a copy of `document` under `name`.
    ///
    /// A declared embedded-document field only accepts documents with its shape tag. A
    /// dynamic field remembers the shape, so later reads return a [`Document`]. The copy
    /// is live from then on: read it back with [`Document::embedded`] to edit it in place.
    pub fn set_embedded(&self, name: &str, document: &Document) -> DocumentResult<()> {
        let subtree = document
            .tree
            .borrow()
            .subtree(&document.base)
            .ok_or_else(|| DocumentError::InvalidPath(describe(&document.base, &[])))?;

        match self.shape.route(name) {
            Route::Declared(property) => match property.kind() {
                PropertyKind::Schema(shape) if shape.doc_type() == document.shape.doc_type() => {
                    self.tree
                        .borrow_mut()
                        .graft(&self.base, property.field(), subtree, None)
                }
                kind => Err(DocumentError::TypeMismatch {
                    field: property.field().to_string(),
                    expected: match kind {
                        PropertyKind::Schema(shape) => shape.doc_type().to_string(),
                        other => other.name().to_string(),
                    },
                    found: document.shape.doc_type().to_string(),
                }),
            },
            Route::Dynamic => {
                self.ensure_dynamic(name)?;
                trace!(field = name, shape = document.shape.name(), "embedding document");
                self.tree.borrow_mut().graft(
                    &self.base,
                    name,
                    subtree,
                    Some(Slot::Embedded(Arc::clone(&document.shape))),
                )
            }
            Route::Id | Route::Rev | Route::Reserved => {
                Err(DocumentError::ReservedFieldName(name.to_string()))
            }
        }
    }

    /// Removes a field. A declared field reads as its default afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::ReservedFieldName`] for reserved keys and
    /// [`DocumentError::FieldNotFound`] for unknown dynamic names.
    pub fn delete(&self, name: &str) -> DocumentResult<()> {
        match self.shape.route(name) {
            Route::Id | Route::Rev | Route::Reserved => {
                Err(DocumentError::ReservedFieldName(name.to_string()))
            }
            Route::Declared(property) => self
                .tree
                .borrow_mut()
                .remove_field(&self.base, property.field())
                .map(|_| ()),
            Route::Dynamic => {
                if self.tree.borrow_mut().remove_field(&self.base, name)? {
                    Ok(())
                } else {
                    Err(DocumentError::FieldNotFound(name.to_string()))
                }
            }
        }
    }

    /// Returns `true` when something is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        match self.shape.route(name) {
            Route::Declared(property) => self.raw(property.field()).is_some(),
            _ => self.raw(name).is_some(),
        }
    }

    /// Number of keys in the canonical object, reserved keys included.
    pub fn len(&self) -> usize {
        self.tree
            .borrow()
            .node(&self.base)
            .map(Map::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn id(&self) -> Option<String> {
        self.raw(ID_FIELD)
            .and_then(|raw| raw.as_str().map(str::to_string))
    }

    pub fn rev(&self) -> Option<String> {
        self.raw(REV_FIELD)
            .and_then(|raw| raw.as_str().map(str::to_string))
    }

    /// Sets the document id.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidIdentifier`] when the id starts with an underscore.
    pub fn set_id(&self, id: impl Into<String>) -> DocumentResult<()> {
        self.assign_id(Value::Text(id.into()))
    }

    /// The stored shape tag, or the shape's own tag when none is stored.
    pub fn doc_type(&self) -> String {
        match self.raw(DOC_TYPE_FIELD) {
            Some(Json::String(doc_type)) => doc_type,
            _ => self.shape.doc_type().to_string(),
        }
    }

    /// Returns `true` until the document has been saved.
    pub fn is_new(&self) -> bool {
        self.rev().is_none()
    }

    /// Returns `true` for documents living inside another document.
    pub fn is_embedded(&self) -> bool {
        !self.base.is_empty()
    }

    /// Names of the attachments recorded in the canonical object.
    pub fn attachments(&self) -> Vec<String> {
        match self.raw(ATTACHMENTS_FIELD) {
            Some(Json::Object(stubs)) => stubs.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Names of the dynamic fields currently set.
    pub fn dynamic_fields(&self) -> Vec<String> {
        self.tree
            .borrow()
            .child_anchors(&self.base)
            .into_iter()
            .filter(|key| !self.shape.claims(key))
            .collect()
    }

    /// Declared properties of this document's shape.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Arc<Property>)> {
        self.shape.properties()
    }

    /// Every non-null field, declared ones first.
    pub fn items(&self) -> DocumentResult<Vec<(String, Field)>> {
        let mut items = Vec::new();
        for (attr, _) in self.shape.properties() {
            let field = self.get(attr)?;
            if !field.is_null() {
                items.push((attr.to_string(), field));
            }
        }
        for name in self.dynamic_fields() {
            let field = self.read_dynamic(&name)?;
            if !field.is_null() {
                items.push((name, field));
            }
        }
        Ok(items)
    }

    /// Validates every stored key that belongs to a declared property.
    ///
    /// Keys are visited in canonical order and the first failure is returned. Dynamic
    /// fields are not validated. Pass `required = true` to also enforce required
    /// properties, as persistence does.
    pub fn validate(&self, required: bool) -> DocumentResult<()> {
        let keys = self
            .tree
            .borrow()
            .node(&self.base)
            .map(|node| node.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        for key in keys {
            let Some((_, property)) = self.shape.property_for_field(&key) else {
                continue;
            };
            match property.kind() {
                PropertyKind::Schema(shape) => match self.raw(&key) {
                    Some(Json::Object(_)) => self.embedded_at(&key, shape).validate(required)?,
                    _ if required && property.is_required() => {
                        return Err(DocumentError::RequiredFieldMissing(key));
                    }
                    _ => {}
                },
                _ => {
                    let value = self.current_value(property)?;
                    property.validate(&value, required)?;
                }
            }
        }
        Ok(())
    }

    /// Creates an independent copy without `_id`, `_rev` or attachment stubs, then
    /// applies `overrides` to it.
    pub fn clone_with<K, V>(
        &self,
        overrides: impl IntoIterator<Item = (K, V)>,
    ) -> DocumentResult<Document>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut subtree = self
            .tree
            .borrow()
            .subtree(&self.base)
            .ok_or_else(|| DocumentError::InvalidPath(describe(&self.base, &[])))?;
        subtree.json.retain(|key, _| !key.starts_with('_'));

        let copy = Document {
            shape: Arc::clone(&self.shape),
            tree: Rc::new(RefCell::new(Tree::with_slots(
                subtree.json,
                subtree.slots.into_iter().collect(),
            ))),
            base: Vec::new(),
        };
        for (name, value) in overrides {
            copy.set(name.as_ref(), value)?;
        }
        Ok(copy)
    }

    /// Canonical form of this document.
    pub fn to_json(&self) -> Json {
        Json::Object(self.to_json_map())
    }

    pub fn to_json_map(&self) -> Map<String, Json> {
        self.tree
            .borrow()
            .node(&self.base)
            .cloned()
            .unwrap_or_default()
    }

    /// Detached native snapshot of the canonical form.
    pub fn to_value(&self) -> Value {
        detect(&self.to_json())
    }

    pub(crate) fn merge_revision(&self, id: &str, rev: &str) -> DocumentResult<()> {
        self.put(ID_FIELD, Json::String(id.to_string()), None)?;
        self.set_rev(rev)
    }

    pub(crate) fn set_rev(&self, rev: &str) -> DocumentResult<()> {
        self.put(REV_FIELD, Json::String(rev.to_string()), None)
    }

    pub(crate) fn clear_identity(&self) -> DocumentResult<()> {
        let mut tree = self.tree.borrow_mut();
        tree.remove_field(&self.base, ID_FIELD)?;
        tree.remove_field(&self.base, REV_FIELD)?;
        Ok(())
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("shape", &self.shape.name())
            .field("path", &describe(&self.base, &[]))
            .field("json", &self.to_json())
            .finish()
    }
}

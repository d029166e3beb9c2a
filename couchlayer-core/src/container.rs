//! Live map and list handles over a region of a document.
//!
//! A [`LazyMap`] or [`LazyList`] is returned whenever a map or list field is read. The
//! handle does not own data: it names a region of the document tree and every operation
//! resolves that region again. Mutations convert the incoming value to its canonical form
//! first, then apply the change to the canonical node and to the native shadow in one
//! step, so both sides stay in agreement after every call.
//!
//! Two handles over the same region observe each other's writes. A handle whose region
//! was replaced (for example because the whole field was reassigned with a value of a
//! different kind) reads as empty and rejects writes with
//! [`DocumentError::InvalidPath`].
//!
//! Handles reached through a list item are pinned to that item's position. Once
//! `insert`, `remove`, `pop` or `clear` moves the items of that list, the handle is stale
//! in the same way, even if another item now sits at its old index.

use std::{collections::BTreeMap, fmt, rc::Rc};

use serde_json::{Map, Value as Json};

use crate::{
    convert::to_canonical,
    document::Document,
    error::{DocumentError, DocumentResult},
    tree::{FieldPath, Segment, SharedTree, Slot, Tree, describe},
    value::{Value, ValueKind},
};

/// The result of reading a field or a container entry.
pub enum Field {
    /// A scalar or null value, detached from the document.
    Value(Value),
    /// A live handle over a map region.
    Map(LazyMap),
    /// A live handle over a list region.
    List(LazyList),
    /// An embedded document sharing storage with its parent.
    Document(Document),
}

impl Field {
    /// Returns a detached native snapshot of the field.
    pub fn to_value(&self) -> Value {
        match self {
            Field::Value(value) => value.clone(),
            Field::Map(map) => map.to_value(),
            Field::List(list) => list.to_value(),
            Field::Document(doc) => doc.to_value(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Field::Value(value) => value,
            other => other.to_value(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Value(Value::Null))
    }

    pub fn into_map(self) -> DocumentResult<LazyMap> {
        match self {
            Field::Map(map) => Ok(map),
            other => Err(other.mismatch(ValueKind::Map.name())),
        }
    }

    pub fn into_list(self) -> DocumentResult<LazyList> {
        match self {
            Field::List(list) => Ok(list),
            other => Err(other.mismatch(ValueKind::List.name())),
        }
    }

    pub fn into_document(self) -> DocumentResult<Document> {
        match self {
            Field::Document(doc) => Ok(doc),
            other => Err(other.mismatch("document")),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Field::Value(value) => value.kind().name(),
            Field::Map(_) => ValueKind::Map.name(),
            Field::List(_) => ValueKind::List.name(),
            Field::Document(_) => "document",
        }
    }

    fn mismatch(&self, expected: &str) -> DocumentError {
        DocumentError::TypeMismatch {
            field: String::from("<field>"),
            expected: expected.to_string(),
            found: self.kind_name().to_string(),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Field::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Field::List(list) => f.debug_tuple("List").field(list).finish(),
            Field::Document(doc) => f.debug_tuple("Document").field(doc).finish(),
        }
    }
}

impl PartialEq<Value> for Field {
    fn eq(&self, other: &Value) -> bool {
        match self {
            Field::Value(value) => value == other,
            _ => &self.to_value() == other,
        }
    }
}

/// Handle over a map region of a document.
#[derive(Clone)]
pub struct LazyMap {
    tree: SharedTree,
    anchor: FieldPath,
    sub: Vec<Segment>,
    pins: Vec<Pin>,
}

/// Handle over a list region of a document.
#[derive(Clone)]
pub struct LazyList {
    tree: SharedTree,
    anchor: FieldPath,
    sub: Vec<Segment>,
    pins: Vec<Pin>,
}

/// An index step of a handle's path, with the shift stamp its list had at the time.
#[derive(Debug, Clone, Copy)]
struct Pin {
    depth: usize,
    stamp: u64,
}

fn pins_hold(tree: &Tree, anchor: &[String], sub: &[Segment], pins: &[Pin]) -> bool {
    pins.iter()
        .all(|pin| tree.shift_stamp(anchor, &sub[..pin.depth]) == pin.stamp)
}

fn child_field(
    tree: &SharedTree,
    anchor: &FieldPath,
    sub: &[Segment],
    pins: &[Pin],
    step: Segment,
    value: &Value,
) -> Field {
    let mut pins = pins.to_vec();
    if let Segment::Index(_) = step {
        pins.push(Pin {
            depth: sub.len(),
            stamp: tree.borrow().shift_stamp(anchor, sub),
        });
    }
    let mut path = sub.to_vec();
    path.push(step);
    match value {
        Value::Map(_) => Field::Map(LazyMap {
            tree: Rc::clone(tree),
            anchor: anchor.clone(),
            sub: path,
            pins,
        }),
        Value::List(_) => Field::List(LazyList {
            tree: Rc::clone(tree),
            anchor: anchor.clone(),
            sub: path,
            pins,
        }),
        other => Field::Value(other.clone()),
    }
}

impl LazyMap {
    pub(crate) fn new(tree: SharedTree, anchor: FieldPath, sub: Vec<Segment>) -> Self {
        Self {
            tree,
            anchor,
            sub,
            pins: Vec::new(),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Map<String, Json>, &BTreeMap<String, Value>) -> R) -> Option<R> {
        let tree = self.tree.borrow();
        if !pins_hold(&tree, &self.anchor, &self.sub, &self.pins) {
            return None;
        }
        match tree.materialize_ref(&self.anchor, &self.sub)? {
            (Json::Object(json), Value::Map(native)) => Some(f(json, native)),
            _ => None,
        }
    }

    fn write<R>(
        &self,
        f: impl FnOnce(&mut Map<String, Json>, &mut BTreeMap<String, Value>) -> DocumentResult<R>,
    ) -> DocumentResult<R> {
        let mut tree = self.tree.borrow_mut();
        if !pins_hold(&tree, &self.anchor, &self.sub, &self.pins) {
            return Err(DocumentError::InvalidPath(describe(&self.anchor, &self.sub)));
        }
        match tree.materialize(&self.anchor, &self.sub)? {
            (Json::Object(json), Value::Map(native)) => f(json, native),
            _ => Err(DocumentError::InvalidPath(describe(&self.anchor, &self.sub))),
        }
    }

    pub fn len(&self) -> usize {
        self.read(|_, native| native.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read(|_, native| native.contains_key(key)).unwrap_or(false)
    }

    pub fn keys(&self) -> Vec<String> {
        self.read(|_, native| native.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Reads an entry. Nested maps and lists come back as handles over the same document.
    pub fn get(&self, key: &str) -> Option<Field> {
        self.read(|_, native| {
            native.get(key).map(|value| {
                child_field(
                    &self.tree,
                    &self.anchor,
                    &self.sub,
                    &self.pins,
                    Segment::Key(key.to_string()),
                    value,
                )
            })
        })
        .flatten()
    }

    /// Reads a detached copy of an entry.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.read(|_, native| native.get(key).cloned()).flatten()
    }

    /// Returns the nested map stored under `key`.
    pub fn map(&self, key: &str) -> DocumentResult<LazyMap> {
        self.get(key)
            .ok_or_else(|| DocumentError::FieldNotFound(key.to_string()))?
            .into_map()
    }

    /// Returns the nested list stored under `key`.
    pub fn list(&self, key: &str) -> DocumentResult<LazyList> {
        self.get(key)
            .ok_or_else(|| DocumentError::FieldNotFound(key.to_string()))?
            .into_list()
    }

    /// Inserts or replaces an entry.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> DocumentResult<()> {
        let key = key.into();
        let value = value.into();
        let canonical = to_canonical(&value)?;
        self.write(|json, native| {
            json.insert(key.clone(), canonical);
            native.insert(key, value);
            Ok(())
        })
    }

    /// Removes an entry and returns its native value.
    pub fn remove(&self, key: &str) -> DocumentResult<Option<Value>> {
        self.write(|json, native| {
            json.remove(key);
            Ok(native.remove(key))
        })
    }

    /// Inserts every entry of `entries`, stopping at the first value that cannot be stored.
    pub fn update<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> DocumentResult<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Returns the entry under `key`, inserting `default` first when it is missing.
    pub fn set_default(&self, key: &str, default: impl Into<Value>) -> DocumentResult<Field> {
        if !self.contains_key(key) {
            self.insert(key, default)?;
        }
        self.get(key)
            .ok_or_else(|| DocumentError::InvalidPath(describe(&self.anchor, &self.sub)))
    }

    pub fn clear(&self) -> DocumentResult<()> {
        self.write(|json, native| {
            json.clear();
            native.clear();
            Ok(())
        })
    }

    /// Detached native snapshot. A stale handle yields [`Value::Null`].
    pub fn to_value(&self) -> Value {
        self.read(|_, native| Value::Map(native.clone()))
            .unwrap_or(Value::Null)
    }

    /// Canonical snapshot. A stale handle yields `null`.
    pub fn to_json(&self) -> Json {
        self.read(|json, _| Json::Object(json.clone()))
            .unwrap_or(Json::Null)
    }
}

impl fmt::Debug for LazyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyMap")
            .field("path", &describe(&self.anchor, &self.sub))
            .field("value", &self.to_value())
            .finish()
    }
}

impl LazyList {
    pub(crate) fn new(tree: SharedTree, anchor: FieldPath, sub: Vec<Segment>) -> Self {
        Self {
            tree,
            anchor,
            sub,
            pins: Vec::new(),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Vec<Json>, &Vec<Value>) -> R) -> Option<R> {
        let tree = self.tree.borrow();
        if !pins_hold(&tree, &self.anchor, &self.sub, &self.pins) {
            return None;
        }
        match tree.materialize_ref(&self.anchor, &self.sub)? {
            (Json::Array(json), Value::List(native)) => Some(f(json, native)),
            _ => None,
        }
    }

    fn write<R>(
        &self,
        f: impl FnOnce(&mut Vec<Json>, &mut Vec<Value>) -> DocumentResult<R>,
    ) -> DocumentResult<R> {
        let mut tree = self.tree.borrow_mut();
        if !pins_hold(&tree, &self.anchor, &self.sub, &self.pins) {
            return Err(DocumentError::InvalidPath(describe(&self.anchor, &self.sub)));
        }
        match tree.materialize(&self.anchor, &self.sub)? {
            (Json::Array(json), Value::List(native)) => f(json, native),
            _ => Err(DocumentError::InvalidPath(describe(&self.anchor, &self.sub))),
        }
    }

    /// Like `write`, for changes that move items. Handles pinned to items of this list go stale.
    fn shift<R>(
        &self,
        f: impl FnOnce(&mut Vec<Json>, &mut Vec<Value>) -> DocumentResult<R>,
    ) -> DocumentResult<R> {
        let result = self.write(f)?;
        self.tree
            .borrow_mut()
            .record_shift(&self.anchor, &self.sub);
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.read(|_, native| native.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads an item. Nested maps and lists come back as handles over the same document.
    pub fn get(&self, index: usize) -> Option<Field> {
        self.read(|_, native| {
            native
                .get(index)
                .map(|value| {
                    child_field(
                        &self.tree,
                        &self.anchor,
                        &self.sub,
                        &self.pins,
                        Segment::Index(index),
                        value,
                    )
                })
        })
        .flatten()
    }

    pub fn value(&self, index: usize) -> Option<Value> {
        self.read(|_, native| native.get(index).cloned()).flatten()
    }

    pub fn values(&self) -> Vec<Value> {
        self.read(|_, native| native.clone()).unwrap_or_default()
    }

    pub fn map(&self, index: usize) -> DocumentResult<LazyMap> {
        self.get(index)
            .ok_or(DocumentError::IndexOutOfBounds {
                index,
                len: self.len(),
            })?
            .into_map()
    }

    pub fn list(&self, index: usize) -> DocumentResult<LazyList> {
        self.get(index)
            .ok_or(DocumentError::IndexOutOfBounds {
                index,
                len: self.len(),
            })?
            .into_list()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.read(|_, native| native.contains(value)).unwrap_or(false)
    }

    /// Replaces the item at `index`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> DocumentResult<()> {
        let value = value.into();
        let canonical = to_canonical(&value)?;
        self.write(|json, native| {
            let len = native.len();
            if index >= len {
                return Err(DocumentError::IndexOutOfBounds { index, len });
            }
            json[index] = canonical;
            native[index] = value;
            Ok(())
        })
    }

    pub fn push(&self, value: impl Into<Value>) -> DocumentResult<()> {
        let value = value.into();
        let canonical = to_canonical(&value)?;
        self.write(|json, native| {
            json.push(canonical);
            native.push(value);
            Ok(())
        })
    }

    /// Inserts an item before `index`. `index == len` appends.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> DocumentResult<()> {
        let value = value.into();
        let canonical = to_canonical(&value)?;
        self.shift(|json, native| {
            let len = native.len();
            if index > len {
                return Err(DocumentError::IndexOutOfBounds { index, len });
            }
            json.insert(index, canonical);
            native.insert(index, value);
            Ok(())
        })
    }

    /// Removes the item at `index` and returns it.
    pub fn remove(&self, index: usize) -> DocumentResult<Value> {
        self.shift(|json, native| {
            let len = native.len();
            if index >= len {
                return Err(DocumentError::IndexOutOfBounds { index, len });
            }
            json.remove(index);
            Ok(native.remove(index))
        })
    }

    /// Removes the last item.
    pub fn pop(&self) -> DocumentResult<Option<Value>> {
        self.shift(|json, native| {
            json.pop();
            Ok(native.pop())
        })
    }

    /// Appends every item, converting all of them before anything is written.
    pub fn extend<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> DocumentResult<()> {
        let items = items.into_iter().map(Into::into).collect::<Vec<Value>>();
        let canonical = items
            .iter()
            .map(to_canonical)
            .collect::<DocumentResult<Vec<_>>>()?;
        self.write(|json, native| {
            json.extend(canonical);
            native.extend(items);
            Ok(())
        })
    }

    pub fn clear(&self) -> DocumentResult<()> {
        self.shift(|json, native| {
            json.clear();
            native.clear();
            Ok(())
        })
    }

    /// Detached native snapshot. A stale handle yields [`Value::Null`].
    pub fn to_value(&self) -> Value {
        self.read(|_, native| Value::List(native.clone()))
            .unwrap_or(Value::Null)
    }

    /// Canonical snapshot. A stale handle yields `null`.
    pub fn to_json(&self) -> Json {
        self.read(|json, _| Json::Array(json.clone()))
            .unwrap_or(Json::Null)
    }
}

impl fmt::Debug for LazyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyList")
            .field("path", &describe(&self.anchor, &self.sub))
            .field("value", &self.to_value())
            .finish()
    }
}

/// Creates a free-standing map with its own storage, not attached to any document.
pub fn detached_map(value: BTreeMap<String, Value>) -> DocumentResult<LazyMap> {
    let (tree, anchor) = detached(Value::Map(value))?;
    Ok(LazyMap::new(tree, anchor, Vec::new()))
}

/// Creates a free-standing list with its own storage, not attached to any document.
pub fn detached_list(value: Vec<Value>) -> DocumentResult<LazyList> {
    let (tree, anchor) = detached(Value::List(value))?;
    Ok(LazyList::new(tree, anchor, Vec::new()))
}

fn detached(value: Value) -> DocumentResult<(SharedTree, FieldPath)> {
    const ROOT: &str = "value";
    let canonical = to_canonical(&value)?;
    let tree = Tree::shared(Map::new());
    tree.borrow_mut()
        .put_field(&[], ROOT, canonical, Some(Slot::Value(value)))?;
    Ok((tree, vec![ROOT.to_string()]))
}

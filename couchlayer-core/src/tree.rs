//! The per-document arena holding both views of a document.
//!
//! Every root [`Document`](crate::document::Document) owns one [`Tree`]. The tree holds
//! the canonical JSON object (the only form that is ever persisted) and a table of native
//! shadows. A shadow is anchored at the path of a field: every dynamic field has one, and
//! so does every declared map or list field. Embedded sub-documents live inside the same
//! tree under their field path, so anchors are paths rather than plain keys.
//!
//! Container handles never hold references into the tree. They hold an anchor and a
//! sub-path and resolve both nodes with [`Tree::materialize`] on every access.

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc, sync::Arc};

use serde_json::{Map, Value as Json};

use crate::{
    error::{DocumentError, DocumentResult},
    shape::Shape,
    value::Value,
};

/// Path from the root object to a field, one key per level.
pub(crate) type FieldPath = Vec<String>;

pub(crate) type SharedTree = Rc<RefCell<Tree>>;

/// One step inside a container region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, ".{key}"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Native side of a field anchored in the tree.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    /// Native value of a dynamic field or of a declared map/list field.
    Value(Value),
    /// A dynamic field holding an embedded document of the given shape.
    Embedded(Arc<Shape>),
}

#[derive(Debug, Default, Clone)]
pub(crate) struct Tree {
    pub(crate) json: Map<String, Json>,
    pub(crate) slots: BTreeMap<FieldPath, Slot>,
    /// Last shift stamp of every list whose items moved, keyed by anchor and list path.
    shifts: BTreeMap<(FieldPath, Vec<Segment>), u64>,
    stamp: u64,
}

/// Snapshot of a document node used to copy it into another tree.
#[derive(Debug, Clone)]
pub(crate) struct Subtree {
    pub(crate) json: Map<String, Json>,
    pub(crate) slots: Vec<(FieldPath, Slot)>,
}

impl Tree {
    pub(crate) fn shared(json: Map<String, Json>) -> SharedTree {
        Rc::new(RefCell::new(Tree::with_slots(json, BTreeMap::new())))
    }

    pub(crate) fn with_slots(json: Map<String, Json>, slots: BTreeMap<FieldPath, Slot>) -> Tree {
        Tree {
            json,
            slots,
            ..Tree::default()
        }
    }

    /// Shift stamp of the list at `anchor` + `list`; `0` until its items first move.
    pub(crate) fn shift_stamp(&self, anchor: &[String], list: &[Segment]) -> u64 {
        self.shifts
            .get(&(anchor.to_vec(), list.to_vec()))
            .copied()
            .unwrap_or(0)
    }

    /// Records that items of the list at `anchor` + `list` changed position.
    pub(crate) fn record_shift(&mut self, anchor: &[String], list: &[Segment]) {
        self.stamp += 1;
        self.shifts
            .insert((anchor.to_vec(), list.to_vec()), self.stamp);
    }

    /// Canonical object of the document node at `base`.
    pub(crate) fn node(&self, base: &[String]) -> Option<&Map<String, Json>> {
        match base.split_first() {
            None => Some(&self.json),
            Some((first, rest)) => {
                let mut node = self.json.get(first)?;
                for key in rest {
                    node = node.as_object()?.get(key)?;
                }
                node.as_object()
            }
        }
    }

    pub(crate) fn node_mut(&mut self, base: &[String]) -> DocumentResult<&mut Map<String, Json>> {
        let missing = || DocumentError::InvalidPath(describe(base, &[]));
        match base.split_first() {
            None => Ok(&mut self.json),
            Some((first, rest)) => {
                let mut node = self.json.get_mut(first).ok_or_else(missing)?;
                for key in rest {
                    node = node
                        .as_object_mut()
                        .and_then(|object| object.get_mut(key))
                        .ok_or_else(missing)?;
                }
                node.as_object_mut().ok_or_else(missing)
            }
        }
    }

    pub(crate) fn slot(&self, path: &[String]) -> Option<&Slot> {
        self.slots.get(path)
    }

    /// Resolves the canonical node and the native node at `anchor` + `sub`.
    ///
    /// Both nodes are returned together so a mutation can be applied to each in the same
    /// step. Fails with [`DocumentError::InvalidPath`] when either side is gone.
    pub(crate) fn materialize(
        &mut self,
        anchor: &[String],
        sub: &[Segment],
    ) -> DocumentResult<(&mut Json, &mut Value)> {
        let invalid = || DocumentError::InvalidPath(describe(anchor, sub));

        let (key, parent) = anchor.split_last().ok_or_else(invalid)?;
        let mut json = match parent.split_first() {
            None => self.json.get_mut(key),
            Some((first, rest)) => {
                let mut node = self.json.get_mut(first);
                for step in rest.iter().chain(std::iter::once(key)) {
                    node = node.and_then(|n| n.as_object_mut()).and_then(|o| o.get_mut(step));
                }
                node
            }
        }
        .ok_or_else(invalid)?;

        let mut native = match self.slots.get_mut(anchor) {
            Some(Slot::Value(value)) => value,
            _ => return Err(invalid()),
        };

        for segment in sub {
            json = step_json(json, segment).ok_or_else(invalid)?;
            native = step_native(native, segment).ok_or_else(invalid)?;
        }

        Ok((json, native))
    }

    /// Read-only counterpart of [`Tree::materialize`].
    pub(crate) fn materialize_ref(
        &self,
        anchor: &[String],
        sub: &[Segment],
    ) -> Option<(&Json, &Value)> {
        let (key, parent) = anchor.split_last()?;
        let mut json = self.node(parent)?.get(key)?;
        let Some(Slot::Value(native)) = self.slots.get(anchor) else {
            return None;
        };
        let mut native = native;

        for segment in sub {
            json = match (segment, json) {
                (Segment::Key(k), Json::Object(object)) => object.get(k)?,
                (Segment::Index(i), Json::Array(items)) => items.get(*i)?,
                _ => return None,
            };
            native = match (segment, native) {
                (Segment::Key(k), Value::Map(entries)) => entries.get(k)?,
                (Segment::Index(i), Value::List(items)) => items.get(*i)?,
                _ => return None,
            };
        }

        Some((json, native))
    }

    /// Writes a field of the node at `base`, replacing any shadow anchored under it.
    pub(crate) fn put_field(
        &mut self,
        base: &[String],
        key: &str,
        json: Json,
        slot: Option<Slot>,
    ) -> DocumentResult<()> {
        let path = child_path(base, key);
        self.node_mut(base)?.insert(key.to_string(), json);
        self.drop_slots_under(&path);
        if let Some(slot) = slot {
            self.slots.insert(path, slot);
        }
        Ok(())
    }

    /// Removes a field of the node at `base` along with its shadows.
    ///
    /// Returns `true` when either side held something.
    pub(crate) fn remove_field(&mut self, base: &[String], key: &str) -> DocumentResult<bool> {
        let path = child_path(base, key);
        let had_json = self.node_mut(base)?.remove(key).is_some();
        let had_slot = self.drop_slots_under(&path);
        Ok(had_json || had_slot)
    }

    fn drop_slots_under(&mut self, path: &[String]) -> bool {
        let doomed = self
            .slots
            .keys()
            .filter(|anchor| anchor.starts_with(path))
            .cloned()
            .collect::<Vec<_>>();
        for anchor in &doomed {
            self.slots.remove(anchor);
        }
        !doomed.is_empty()
    }

    /// Anchors of the shadows belonging directly to the node at `base`.
    pub(crate) fn child_anchors(&self, base: &[String]) -> Vec<String> {
        self.slots
            .keys()
            .filter(|anchor| anchor.len() == base.len() + 1 && anchor.starts_with(base))
            .filter_map(|anchor| anchor.last().cloned())
            .collect()
    }

    /// Copies the node at `base` and every shadow under it, re-rooted at `base`.
    pub(crate) fn subtree(&self, base: &[String]) -> Option<Subtree> {
        let json = self.node(base)?.clone();
        let slots = self
            .slots
            .iter()
            .filter(|(anchor, _)| anchor.len() > base.len() && anchor.starts_with(base))
            .map(|(anchor, slot)| (anchor[base.len()..].to_vec(), slot.clone()))
            .collect();
        Some(Subtree { json, slots })
    }

    /// Places a copied subtree at `base` + `key`.
    pub(crate) fn graft(
        &mut self,
        base: &[String],
        key: &str,
        subtree: Subtree,
        slot: Option<Slot>,
    ) -> DocumentResult<()> {
        let path = child_path(base, key);
        self.put_field(base, key, Json::Object(subtree.json), slot)?;
        for (relative, slot) in subtree.slots {
            let mut anchor = path.clone();
            anchor.extend(relative);
            self.slots.insert(anchor, slot);
        }
        Ok(())
    }
}

pub(crate) fn child_path(base: &[String], key: &str) -> FieldPath {
    let mut path = base.to_vec();
    path.push(key.to_string());
    path
}

pub(crate) fn describe(anchor: &[String], sub: &[Segment]) -> String {
    let mut out = anchor.join(".");
    for segment in sub {
        out.push_str(&segment.to_string());
    }
    out
}

fn step_json<'a>(node: &'a mut Json, segment: &Segment) -> Option<&'a mut Json> {
    match (segment, node) {
        (Segment::Key(key), Json::Object(object)) => object.get_mut(key),
        (Segment::Index(index), Json::Array(items)) => items.get_mut(*index),
        _ => None,
    }
}

fn step_native<'a>(node: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (segment, node) {
        (Segment::Key(key), Value::Map(entries)) => entries.get_mut(key),
        (Segment::Index(index), Value::List(items)) => items.get_mut(*index),
        _ => None,
    }
}

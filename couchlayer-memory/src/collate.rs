//! View key ordering for in-memory view queries.
//!
//! Keys are ordered by type first and by value within a type:
//! `null < false < true < numbers < strings < arrays < objects`.
//! Arrays compare element by element, then by length. Objects compare entry by entry
//! in key order (key first, then value), then by size.

use std::cmp::Ordering;

use serde_json::{Map, Value as Json};

/// Type-ordered view of a JSON key.
#[derive(Debug)]
pub(crate) enum Collated<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    Array(&'a [Json]),
    Object(&'a Map<String, Json>),
}

impl<'a> From<&'a Json> for Collated<'a> {
    fn from(json: &'a Json) -> Self {
        match json {
            Json::Null => Collated::Null,
            Json::Bool(value) => Collated::Bool(*value),
            Json::Number(value) => Collated::Number(value.as_f64().unwrap_or(f64::NAN)),
            Json::String(value) => Collated::String(value),
            Json::Array(items) => Collated::Array(items),
            Json::Object(entries) => Collated::Object(entries),
        }
    }
}

impl Collated<'_> {
    fn rank(&self) -> u8 {
        match self {
            Collated::Null => 0,
            Collated::Bool(false) => 1,
            Collated::Bool(true) => 2,
            Collated::Number(_) => 3,
            Collated::String(_) => 4,
            Collated::Array(_) => 5,
            Collated::Object(_) => 6,
        }
    }
}

impl Ord for Collated<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Collated::Number(a), Collated::Number(b)) => a.total_cmp(b),
            (Collated::String(a), Collated::String(b)) => a.cmp(b),
            (Collated::Array(a), Collated::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| collate(x, y))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Collated::Object(a), Collated::Object(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| collate(va, vb)))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Collated<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Collated<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Collated<'_> {}

/// Orders two view keys.
pub fn collate(left: &Json, right: &Json) -> Ordering {
    Collated::from(left).cmp(&Collated::from(right))
}

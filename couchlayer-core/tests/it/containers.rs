use couchlayer_core::{
    container::{Field, detached_list, detached_map},
    error::DocumentError,
    property::Property,
    shape::Shape,
    value::Value,
};
use serde_json::json;
use std::{collections::BTreeMap, sync::Arc};

fn profile() -> Arc<Shape> {
    Shape::builder("Profile")
        .property("settings", Property::map())
        .property("history", Property::list())
        .build()
        .unwrap()
}

#[test]
fn test_two_reads_of_nested_map_alias() {
    let doc = profile().new_document().unwrap();
    doc.map("settings")
        .unwrap()
        .insert("display", Value::map([("theme", "dark")]))
        .unwrap();

    let first = doc.map("settings").unwrap().map("display").unwrap();
    let second = doc.map("settings").unwrap().map("display").unwrap();
    first.insert("font", "mono").unwrap();

    assert_eq!(second.value("font"), Some(Value::from("mono")));
    assert_eq!(
        doc.to_json()["settings"],
        json!({"display": {"theme": "dark", "font": "mono"}})
    );
}

#[test]
fn test_list_of_maps_edits_in_place() {
    let doc = profile().new_document().unwrap();
    let history = doc.list("history").unwrap();
    history.push(Value::map([("step", 1)])).unwrap();
    history.push(Value::map([("step", 2)])).unwrap();

    history.map(1).unwrap().insert("done", true).unwrap();
    assert_eq!(
        doc.to_json()["history"],
        json!([{"step": 1}, {"step": 2, "done": true}])
    );

    match history.get(0) {
        Some(Field::Map(entry)) => assert_eq!(entry.value("step"), Some(Value::Int(1))),
        other => panic!("expected a map handle, got {other:?}"),
    }
}

#[test]
fn test_replacing_a_field_detaches_old_handles() {
    let doc = profile().new_document().unwrap();
    doc.map("settings")
        .unwrap()
        .insert("inner", Value::empty_map())
        .unwrap();
    let inner = doc.map("settings").unwrap().map("inner").unwrap();

    doc.set("settings", Value::map([("inner", 5)])).unwrap();

    assert!(inner.is_empty());
    assert!(matches!(
        inner.insert("k", 1),
        Err(DocumentError::InvalidPath(_))
    ));
    assert_eq!(doc.to_json()["settings"], json!({"inner": 5}));
}

#[test]
fn test_failed_mutation_leaves_both_views_unchanged() {
    let doc = profile().new_document().unwrap();
    let history = doc.list("history").unwrap();
    history.extend([1, 2]).unwrap();

    assert!(matches!(
        history.set(5, 3),
        Err(DocumentError::IndexOutOfBounds { index: 5, len: 2 })
    ));
    assert!(history.extend([Value::Int(3), Value::Float(f64::NAN)]).is_err());

    assert_eq!(history.to_value(), Value::list([1, 2]));
    assert_eq!(doc.to_json()["history"], json!([1, 2]));
}

#[test]
fn test_failed_embedded_assignment_keeps_old_document() {
    let author = Shape::builder("Author")
        .property("name", Property::text())
        .property("age", Property::integer())
        .build()
        .unwrap();
    let book = Shape::builder("Book")
        .property("author", Property::schema(&author))
        .build()
        .unwrap();
    let doc = book.new_document().unwrap();
    doc.set("author", Value::map([("name", Value::from("Ann")), ("age", Value::Int(40))]))
        .unwrap();
    let before = doc.to_json();

    let result = doc.set("author", Value::map([("name", 5)]));
    assert!(matches!(result, Err(DocumentError::TypeMismatch { .. })));

    assert_eq!(doc.to_json(), before);
    let embedded = doc.embedded("author").unwrap();
    assert_eq!(embedded.value("name").unwrap(), Value::from("Ann"));
    assert_eq!(embedded.value("age").unwrap(), Value::Int(40));
}

#[test]
fn test_moving_list_items_detaches_item_handles() {
    let doc = profile().new_document().unwrap();
    let history = doc.list("history").unwrap();
    history.push(Value::map([("who", "first")])).unwrap();

    let first = history.map(0).unwrap();
    history.insert(0, Value::map([("who", "new")])).unwrap();

    assert!(matches!(
        first.insert("touched", true),
        Err(DocumentError::InvalidPath(_))
    ));
    assert!(first.is_empty());
    assert_eq!(first.value("who"), None);
    assert_eq!(
        doc.to_json()["history"],
        json!([{"who": "new"}, {"who": "first"}])
    );

    let moved = history.map(1).unwrap();
    moved.insert("touched", true).unwrap();
    assert_eq!(
        doc.to_json()["history"],
        json!([{"who": "new"}, {"who": "first", "touched": true}])
    );

    // Appending and replacing keep positions.
    history.push(Value::map([("who", "last")])).unwrap();
    history.set(0, Value::map([("who", "renamed")])).unwrap();
    moved.insert("seen", true).unwrap();
    assert_eq!(moved.value("seen"), Some(Value::Bool(true)));

    history.pop().unwrap();
    assert!(moved.insert("late", true).is_err());
}

#[test]
fn test_detached_containers() {
    let map = detached_map(BTreeMap::from([("a".to_string(), Value::Int(1))])).unwrap();
    map.insert("b", vec![1, 2]).unwrap();
    map.list("b").unwrap().push(3).unwrap();
    assert_eq!(map.to_json(), json!({"a": 1, "b": [1, 2, 3]}));

    let list = detached_list(vec![Value::from("x")]).unwrap();
    list.insert(0, "w").unwrap();
    assert_eq!(list.pop().unwrap(), Some(Value::from("x")));
    assert_eq!(list.to_json(), json!(["w"]));
}

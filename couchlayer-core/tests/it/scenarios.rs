use chrono::{NaiveDate, TimeZone, Utc};
use couchlayer_core::{
    error::DocumentError,
    property::Property,
    shape::Shape,
    value::Value,
};
use serde_json::json;

#[test]
fn test_empty_instance_takes_defaults() {
    let shape = Shape::builder("Greeting")
        .property("name", Property::text().default("x"))
        .build()
        .unwrap();

    let doc = shape.new_document().unwrap();
    assert_eq!(doc.to_json(), json!({"doc_type": "Greeting", "name": "x"}));
}

#[test]
fn test_appending_to_dynamic_list_updates_canonical() {
    let shape = Shape::builder("Note").build().unwrap();
    let doc = shape.new_document().unwrap();

    doc.set("tags", vec!["a", "b"]).unwrap();
    doc.list("tags").unwrap().push("c").unwrap();

    assert_eq!(doc.to_json()["tags"], json!(["a", "b", "c"]));
    assert_eq!(doc.value("tags").unwrap(), Value::list(["a", "b", "c"]));
}

#[test]
fn test_datetime_canonical_form() {
    let shape = Shape::builder("Event")
        .property("created", Property::datetime())
        .build()
        .unwrap();
    let doc = shape.new_document().unwrap();

    let created = NaiveDate::from_ymd_opt(2008, 11, 10)
        .unwrap()
        .and_hms_micro_opt(8, 0, 0, 250)
        .unwrap()
        .and_utc();
    doc.set("created", created).unwrap();

    assert_eq!(doc.to_json()["created"], json!("2008-11-10T08:00:00Z"));
    assert_eq!(
        doc.value("created").unwrap(),
        Value::DateTime(Utc.with_ymd_and_hms(2008, 11, 10, 8, 0, 0).unwrap())
    );
}

#[test]
fn test_wrap_then_validate() {
    let shape = Shape::builder("Counter")
        .property("count", Property::integer().required(true))
        .build()
        .unwrap();

    let ok = shape
        .wrap_value(json!({"_id": "x", "count": 4}))
        .unwrap();
    assert!(ok.validate(true).is_ok());
    assert_eq!(ok.value("count").unwrap(), Value::Int(4));

    let missing = shape.wrap_value(json!({"_id": "x"})).unwrap();
    assert_eq!(
        missing.validate(true),
        Err(DocumentError::RequiredFieldMissing("count".to_string()))
    );
}

#[test]
fn test_nested_dynamic_maps() {
    let shape = Shape::builder("Bag").build().unwrap();
    let doc = shape.new_document().unwrap();

    doc.set("d", Value::empty_map()).unwrap();
    doc.map("d").unwrap().insert("inner", Value::empty_map()).unwrap();
    doc.map("d")
        .unwrap()
        .map("inner")
        .unwrap()
        .insert("s", "v")
        .unwrap();

    assert_eq!(doc.to_json()["d"], json!({"inner": {"s": "v"}}));
    let inner = doc.map("d").unwrap().map("inner").unwrap();
    assert_eq!(inner.value("s"), Some(Value::from("v")));
}

#[test]
fn test_independent_ancestors_with_same_field() {
    let left = Shape::builder("Left")
        .property("name", Property::text())
        .build()
        .unwrap();
    let right = Shape::builder("Right")
        .property("name", Property::text())
        .build()
        .unwrap();

    let result = Shape::builder("Both").parent(&left).parent(&right).build();
    assert!(matches!(result, Err(DocumentError::DuplicateField(name)) if name == "name"));
}

#[test]
fn test_load_edit_and_serialize() {
    let shape = Shape::builder("Post")
        .property("title", Property::text().required(true))
        .property("tags", Property::string_list())
        .property("meta", Property::map())
        .build()
        .unwrap();

    let doc = shape
        .wrap_value(json!({
            "_id": "post-1",
            "_rev": "3-abc",
            "doc_type": "Post",
            "title": "Hello",
            "tags": ["a"],
            "meta": {"views": 1},
            "mood": "happy"
        }))
        .unwrap();

    doc.list("tags").unwrap().push("b").unwrap();
    doc.map("meta").unwrap().insert("views", 2).unwrap();
    doc.set("mood", "sleepy").unwrap();
    doc.set("title", "").unwrap();

    assert_eq!(
        doc.to_json(),
        json!({
            "_id": "post-1",
            "_rev": "3-abc",
            "doc_type": "Post",
            "title": "",
            "tags": ["a", "b"],
            "meta": {"views": 2},
            "mood": "sleepy"
        })
    );
    assert!(doc.validate(false).is_ok());
    assert_eq!(
        doc.validate(true),
        Err(DocumentError::RequiredFieldMissing("title".to_string()))
    );
    assert_eq!(doc.dynamic_fields(), vec!["mood".to_string()]);
}

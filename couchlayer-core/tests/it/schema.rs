use couchlayer_core::{
    error::DocumentError,
    property::Property,
    shape::Shape,
    value::{Value, ValueKind},
};
use serde_json::json;

#[test]
fn test_required_gate_only_applies_when_asked() {
    let title = Property::text().required(true).name("title");

    assert!(title.validate(&Value::from(""), false).is_ok());
    assert!(matches!(
        title.validate(&Value::from(""), true),
        Err(DocumentError::RequiredFieldMissing(field)) if field == "title"
    ));
    assert!(title.validate(&Value::from("Hello"), true).is_ok());

    let count = Property::integer().required(true);
    assert!(count.validate(&Value::Int(0), true).is_ok());
}

#[test]
fn test_declared_name_wins_over_dynamic() {
    let shape = Shape::builder("Post")
        .property("title", Property::text())
        .build()
        .unwrap();
    let doc = shape.new_document().unwrap();

    doc.set("mood", "calm").unwrap();
    doc.set("weather", "rain").unwrap();
    doc.set("title", "Hello").unwrap();

    assert_eq!(doc.dynamic_fields(), vec!["mood", "weather"]);
    assert!(matches!(
        doc.set("title", 5),
        Err(DocumentError::TypeMismatch { .. })
    ));
    assert_eq!(doc.value("title").unwrap(), Value::from("Hello"));
}

#[test]
fn test_wrap_drops_null_dynamic_fields() {
    let shape = Shape::builder("Note")
        .property("name", Property::text())
        .build()
        .unwrap();
    let doc = shape
        .wrap_value(json!({"doc_type": "Note", "name": "n", "gone": null, "kept": 1}))
        .unwrap();

    assert_eq!(doc.dynamic_fields(), vec!["kept"]);
    assert!(!doc.to_json().as_object().unwrap().contains_key("gone"));
    assert_eq!(doc.value("kept").unwrap(), Value::Int(1));
}

#[test]
fn test_renamed_property_uses_field_name() {
    let shape = Shape::builder("Post")
        .property("author", Property::text().name("author_name"))
        .build()
        .unwrap();
    let doc = shape.create([("author", "ada")]).unwrap();

    assert_eq!(doc.to_json()["author_name"], json!("ada"));
    assert_eq!(doc.value("author").unwrap(), Value::from("ada"));
    assert!(doc.dynamic_fields().is_empty());
}

#[test]
fn test_inherited_properties_and_policy() {
    let base = Shape::builder("Base")
        .property("created_by", Property::text())
        .allow_dynamic(false)
        .build()
        .unwrap();
    let post = Shape::builder("Post")
        .parent(&base)
        .property("title", Property::text())
        .build()
        .unwrap();

    assert!(!post.allow_dynamic());
    assert_eq!(post.parents(), ["Base"]);
    assert!(post.property("created_by").is_some());

    let doc = post
        .create([("title", "Hi"), ("created_by", "ada")])
        .unwrap();
    assert_eq!(
        doc.to_json(),
        json!({"doc_type": "Post", "title": "Hi", "created_by": "ada"})
    );
    assert!(matches!(
        doc.set("mood", "calm"),
        Err(DocumentError::UndeclaredField(name)) if name == "mood"
    ));
}

#[test]
fn test_redeclaring_parent_property_fails() {
    let base = Shape::builder("Base")
        .property("title", Property::text())
        .build()
        .unwrap();
    let result = Shape::builder("Post")
        .parent(&base)
        .property("title", Property::text())
        .build();

    assert!(matches!(result, Err(DocumentError::DuplicateField(name)) if name == "title"));
}

#[test]
fn test_choices_and_validators() {
    let shape = Shape::builder("Ticket")
        .property(
            "status",
            Property::text().choices(["open", "closed"]).default("open"),
        )
        .property(
            "priority",
            Property::integer().validator(|value| match value.as_i64() {
                Some(n) if !(1..=5).contains(&n) => Err(format!("{n} is outside 1..=5")),
                _ => Ok(()),
            }),
        )
        .build()
        .unwrap();
    let doc = shape.new_document().unwrap();

    assert!(matches!(
        doc.set("status", "lost"),
        Err(DocumentError::ChoiceViolation { .. })
    ));
    doc.set("status", "closed").unwrap();
    doc.set("status", Value::Null).unwrap();

    assert!(matches!(
        doc.set("priority", 9),
        Err(DocumentError::ValidationFailed { field, .. }) if field == "priority"
    ));
    doc.set("priority", 3).unwrap();
    assert_eq!(doc.to_json()["priority"], json!(3));
}

#[test]
fn test_typed_list_items() {
    let shape = Shape::builder("Post")
        .property("scores", Property::list().item_kind(ValueKind::Integer))
        .build()
        .unwrap();
    let doc = shape.new_document().unwrap();

    doc.set("scores", vec![1, 2]).unwrap();
    assert!(matches!(
        doc.set("scores", vec![Value::Int(1), Value::from("two")]),
        Err(DocumentError::TypeMismatch { .. })
    ));
    assert_eq!(doc.to_json()["scores"], json!([1, 2]));
}

#[test]
fn test_anonymous_shape_keeps_doc_type() {
    let post = Shape::builder("Post")
        .property("title", Property::text())
        .build()
        .unwrap();
    let draft = Shape::anonymous(&post, [("revision", Property::integer())]).unwrap();

    let doc = draft.create([("title", "Hi")]).unwrap();
    doc.set("revision", 2).unwrap();
    assert_eq!(doc.doc_type(), "Post");
    assert_eq!(doc.to_json()["revision"], json!(2));
}

#[test]
fn test_embedded_schema_property() {
    let author = Shape::builder("Author")
        .property("name", Property::text().required(true))
        .build()
        .unwrap();
    let post = Shape::builder("Post")
        .property("author", Property::schema(&author))
        .build()
        .unwrap();
    let doc = post.new_document().unwrap();

    let embedded = doc.embedded("author").unwrap();
    assert!(embedded.is_embedded());
    embedded.set("name", "ada").unwrap();

    assert_eq!(
        doc.to_json()["author"],
        json!({"doc_type": "Author", "name": "ada"})
    );
    assert!(doc.validate(true).is_ok());
}

use chrono::{DateTime, NaiveDate, NaiveTime};
use couchlayer_core::{
    convert::{to_canonical, to_native},
    shape::Shape,
    value::Value,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::Float),
        "\\PC{0,16}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
        (any::<i64>(), 0u32..=10).prop_map(|(mantissa, scale)| Value::Decimal(Decimal::new(mantissa, scale))),
        (1i32..=730_000).prop_filter_map("date", |days| {
            NaiveDate::from_num_days_from_ce_opt(days).map(Value::Date)
        }),
        (0u32..86_400).prop_filter_map("time", |secs| {
            NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).map(Value::Time)
        }),
        (0i64..4_102_444_800).prop_filter_map("datetime", |secs| {
            DateTime::from_timestamp(secs, 0).map(Value::DateTime)
        }),
    ]
}

#[derive(Debug, Clone)]
enum ListOp {
    Push(i64),
    PushMap(String, i64),
    Insert(usize, i64),
    Set(usize, String),
    Remove(usize),
    Pop,
    Clear,
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        4 => any::<i64>().prop_map(ListOp::Push),
        2 => ("[a-z]{1,4}", any::<i64>()).prop_map(|(k, v)| ListOp::PushMap(k, v)),
        2 => (0usize..8, any::<i64>()).prop_map(|(i, v)| ListOp::Insert(i, v)),
        2 => (0usize..8, "[a-z]{0,4}").prop_map(|(i, v)| ListOp::Set(i, v)),
        2 => (0usize..8).prop_map(ListOp::Remove),
        1 => Just(ListOp::Pop),
        1 => Just(ListOp::Clear),
    ]
}

#[derive(Debug, Clone)]
enum MapOp {
    Insert(String, i64),
    InsertList(String, Vec<i64>),
    Nested(String, String, bool),
    Remove(String),
    Clear,
}

fn key() -> impl Strategy<Value = String> {
    "[a-e]"
}

fn map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        4 => (key(), any::<i64>()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        2 => (key(), prop::collection::vec(any::<i64>(), 0..4)).prop_map(|(k, v)| MapOp::InsertList(k, v)),
        2 => (key(), key(), any::<bool>()).prop_map(|(k, n, v)| MapOp::Nested(k, n, v)),
        2 => key().prop_map(MapOp::Remove),
        1 => Just(MapOp::Clear),
    ]
}

proptest! {
    #[test]
    fn test_scalar_values_survive_canonical_form(value in scalar()) {
        let canonical = to_canonical(&value).unwrap();
        prop_assert_eq!(to_native(&canonical, value.kind()).unwrap(), value);
    }

    #[test]
    fn test_list_handle_stays_in_step(ops in prop::collection::vec(list_op(), 1..40)) {
        let doc = Shape::builder("Log").build().unwrap().new_document().unwrap();
        doc.set("items", Value::empty_list()).unwrap();
        let items = doc.list("items").unwrap();
        let mut model: Vec<Value> = Vec::new();

        for op in ops {
            match op {
                ListOp::Push(v) => {
                    items.push(v).unwrap();
                    model.push(Value::Int(v));
                }
                ListOp::PushMap(k, v) => {
                    let entry = Value::map([(k, v)]);
                    items.push(entry.clone()).unwrap();
                    model.push(entry);
                }
                ListOp::Insert(i, v) => {
                    let result = items.insert(i, v);
                    prop_assert_eq!(result.is_ok(), i <= model.len());
                    if i <= model.len() {
                        model.insert(i, Value::Int(v));
                    }
                }
                ListOp::Set(i, v) => {
                    let result = items.set(i, v.as_str());
                    prop_assert_eq!(result.is_ok(), i < model.len());
                    if i < model.len() {
                        model[i] = Value::Text(v);
                    }
                }
                ListOp::Remove(i) => {
                    let result = items.remove(i);
                    if i < model.len() {
                        prop_assert_eq!(result.unwrap(), model.remove(i));
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
                ListOp::Pop => prop_assert_eq!(items.pop().unwrap(), model.pop()),
                ListOp::Clear => {
                    items.clear().unwrap();
                    model.clear();
                }
            }

            prop_assert_eq!(items.to_value(), Value::List(model.clone()));
            prop_assert_eq!(
                &doc.to_json()["items"],
                &to_canonical(&items.to_value()).unwrap()
            );
        }
    }

    #[test]
    fn test_map_handle_stays_in_step(ops in prop::collection::vec(map_op(), 1..40)) {
        let doc = Shape::builder("Settings").build().unwrap().new_document().unwrap();
        doc.set("prefs", Value::empty_map()).unwrap();
        let prefs = doc.map("prefs").unwrap();

        for op in ops {
            match op {
                MapOp::Insert(k, v) => prefs.insert(k, v).unwrap(),
                MapOp::InsertList(k, v) => prefs.insert(k, v).unwrap(),
                MapOp::Nested(k, n, v) => {
                    if !matches!(prefs.value(&k), Some(Value::Map(_))) {
                        prefs.insert(k.clone(), Value::empty_map()).unwrap();
                    }
                    prefs.map(&k).unwrap().insert(n, v).unwrap();
                }
                MapOp::Remove(k) => {
                    prefs.remove(&k).unwrap();
                }
                MapOp::Clear => prefs.clear().unwrap(),
            }

            prop_assert_eq!(
                &doc.to_json()["prefs"],
                &to_canonical(&prefs.to_value()).unwrap()
            );
            prop_assert_eq!(doc.value("prefs").unwrap(), prefs.to_value());
        }
    }
}

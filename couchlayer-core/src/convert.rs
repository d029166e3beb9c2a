//! Conversion between native [`Value`]s and canonical JSON values.
//!
//! The canonical form is what gets stored and sent over the wire:
//!
//! | native     | canonical                         |
//! |------------|-----------------------------------|
//! | datetime   | `"2008-11-10T08:00:00Z"` (UTC)    |
//! | date       | `"2008-11-10"`                    |
//! | time       | `"08:00:00"`                      |
//! | decimal    | `"12.50"`                         |
//! | list / map | element-wise conversion           |
//!
//! Sub-second precision is dropped on the way out.
//!
//! Values loaded without a declared kind go through [`detect`], a best-effort classifier
//! that recognizes date, time, datetime and decimal strings by format. It is a heuristic:
//! a string that matches a format but fails to parse stays a string.

use std::{collections::BTreeMap, str::FromStr, sync::LazyLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value as Json};

use crate::{
    error::{DocumentError, DocumentResult},
    value::{Value, ValueKind},
};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

static RE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})\D?(0[1-9]|1[0-2])\D?([12]\d|0[1-9]|3[01])$").expect("valid date regex")
});

static RE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3])\D?([0-5]\d)\D?([0-5]\d)?\D?(\d{3})?$").expect("valid time regex")
});

static RE_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})\D?(0[1-9]|1[0-2])\D?([12]\d|0[1-9]|3[01])(\D?([01]\d|2[0-3])\D?([0-5]\d)\D?([0-5]\d)?\D?(\d{3})?([zZ]|([\+-])([01]\d|2[0-3])\D?([0-5]\d)?)?)?$",
    )
    .expect("valid datetime regex")
});

static RE_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+).(\d+)$").expect("valid decimal regex"));

/// Converts a native value to its canonical JSON form.
///
/// # Errors
///
/// Fails with [`DocumentError::UnsupportedValueType`] for values JSON cannot carry
/// (non-finite floats).
pub fn to_canonical(value: &Value) -> DocumentResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => Json::Number(
            Number::from_f64(*f)
                .ok_or_else(|| DocumentError::UnsupportedValueType(format!("float {f}")))?,
        ),
        Value::Text(s) => Json::String(s.clone()),
        Value::Decimal(d) => Json::String(d.to_string()),
        Value::Date(d) => Json::String(format_date(d)),
        Value::Time(t) => Json::String(format_time(t)),
        Value::DateTime(dt) => Json::String(format_datetime(dt)),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(to_canonical)
                .collect::<DocumentResult<Vec<_>>>()?,
        ),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_canonical(v)?)))
                .collect::<DocumentResult<Map<_, _>>>()?,
        ),
    })
}

/// Converts a canonical JSON value to a native value of the given kind.
///
/// Conversion is lenient the way the declared kinds are: numbers read as text for a text
/// field, numeric strings read as numbers for numeric fields and booleans use
/// truthiness. Map and list kinds convert their elements with [`detect`].
///
/// # Errors
///
/// Fails with [`DocumentError::TypeMismatch`] when the canonical value cannot be read as
/// the requested kind (e.g. an unparseable date string).
pub fn to_native(json: &Json, kind: ValueKind) -> DocumentResult<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = || DocumentError::TypeMismatch {
        field: String::from("<canonical>"),
        expected: kind.name().to_string(),
        found: json.to_string(),
    };

    Ok(match kind {
        ValueKind::Null => Value::Null,
        ValueKind::Text => match json {
            Json::String(s) => Value::Text(s.clone()),
            Json::Array(_) | Json::Object(_) => return Err(mismatch()),
            other => Value::Text(other.to_string()),
        },
        ValueKind::Integer => match json {
            Json::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| (i64::MIN as f64..i64::MAX as f64).contains(f))
                        .map(|f| f.trunc() as i64)
                })
                .map(Value::Int)
                .ok_or_else(mismatch)?,
            Json::String(s) => s.trim().parse().map(Value::Int).map_err(|_| mismatch())?,
            Json::Bool(b) => Value::Int(i64::from(*b)),
            _ => return Err(mismatch()),
        },
        ValueKind::Float => match json {
            Json::Number(n) => n.as_f64().map(Value::Float).ok_or_else(mismatch)?,
            Json::String(s) => s.trim().parse().map(Value::Float).map_err(|_| mismatch())?,
            _ => return Err(mismatch()),
        },
        ValueKind::Boolean => Value::Bool(json_truthy(json)),
        ValueKind::Decimal => match json {
            Json::String(s) => parse_decimal(s).map(Value::Decimal).ok_or_else(mismatch)?,
            Json::Number(n) => parse_decimal(&n.to_string())
                .map(Value::Decimal)
                .ok_or_else(mismatch)?,
            _ => return Err(mismatch()),
        },
        ValueKind::Date => match json {
            Json::String(s) => parse_date(s).map(Value::Date).ok_or_else(mismatch)?,
            _ => return Err(mismatch()),
        },
        ValueKind::Time => match json {
            Json::String(s) => parse_time(s).map(Value::Time).ok_or_else(mismatch)?,
            _ => return Err(mismatch()),
        },
        ValueKind::DateTime => match json {
            Json::String(s) => parse_datetime(s).map(Value::DateTime).ok_or_else(mismatch)?,
            _ => return Err(mismatch()),
        },
        ValueKind::List => match json {
            Json::Array(_) => detect(json),
            _ => return Err(mismatch()),
        },
        ValueKind::Map => match json {
            Json::Object(_) => detect(json),
            _ => return Err(mismatch()),
        },
    })
}

/// Speculatively converts a canonical JSON value to a native value.
///
/// Strings are classified by format with the precedence date, time, datetime, decimal.
/// Only a full match is converted, and a match that fails to parse is left as the
/// original string. Lists and maps are converted element-wise.
pub fn detect(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => number_to_native(n),
        Json::String(s) => detect_str(s),
        Json::Array(items) => Value::List(items.iter().map(detect).collect()),
        Json::Object(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), detect(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

fn detect_str(s: &str) -> Value {
    let parsed = if RE_DATE.is_match(s) {
        parse_date(s).map(Value::Date)
    } else if RE_TIME.is_match(s) {
        parse_time(s).map(Value::Time)
    } else if RE_DATETIME.is_match(s) {
        parse_datetime(s).map(Value::DateTime)
    } else if RE_DECIMAL.is_match(s) {
        parse_decimal(s).map(Value::Decimal)
    } else {
        None
    };

    parsed.unwrap_or_else(|| Value::Text(s.to_string()))
}

fn number_to_native(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn json_truthy(json: &Json) -> bool {
    match json {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(items) => !items.is_empty(),
        Json::Object(entries) => !entries.is_empty(),
    }
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub(crate) fn format_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_time(t: &NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parses an ISO-8601 datetime, ignoring sub-seconds and a trailing `Z`.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = strip_subseconds(s).trim_end_matches('Z');
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Parses an `HH:MM:SS` time, ignoring sub-seconds.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(strip_subseconds(s), TIME_FORMAT).ok()
}

pub fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s.trim()).ok()
}

fn strip_subseconds(s: &str) -> &str {
    s.split_once('.').map_or(s, |(head, _)| head)
}

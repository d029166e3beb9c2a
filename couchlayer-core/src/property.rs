//! Typed field descriptors.
//!
//! A [`Property`] declares one field of a [`Shape`]: its kind, the key it is stored under
//! in the canonical document, its default and the checks a value has to pass. Properties
//! are built with chained setters and handed to [`crate::shape::ShapeBuilder::property`]:
//!
//! ```ignore
//! let shape = Shape::builder("Post")
//!     .property("title", Property::text().required(true))
//!     .property("created", Property::datetime().auto_now_add(true))
//!     .property("state", Property::text().choices(["draft", "published"]).default("draft"))
//!     .build()?;
//! ```
//!
//! A property is shared by every document of its shape and of every shape deriving from
//! it. It never holds per-document state.

use std::{fmt, sync::Arc};

use chrono::{Local, Utc};
use serde_json::Value as Json;

use crate::{
    convert::{detect, to_canonical, to_native},
    error::{DocumentError, DocumentResult},
    shape::Shape,
    value::{Value, ValueKind},
};

/// A validation hook. Returning `Err(reason)` rejects the value.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A producer of default values, called once per new document.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// The declared kind of a property.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Text,
    Integer,
    Float,
    Boolean,
    Decimal,
    Date,
    Time,
    DateTime,
    Map,
    List,
    /// An embedded document of the given shape.
    Schema(Arc<Shape>),
}

impl PropertyKind {
    /// The native value kind, or `None` for embedded documents.
    pub fn value_kind(&self) -> Option<ValueKind> {
        Some(match self {
            PropertyKind::Text => ValueKind::Text,
            PropertyKind::Integer => ValueKind::Integer,
            PropertyKind::Float => ValueKind::Float,
            PropertyKind::Boolean => ValueKind::Boolean,
            PropertyKind::Decimal => ValueKind::Decimal,
            PropertyKind::Date => ValueKind::Date,
            PropertyKind::Time => ValueKind::Time,
            PropertyKind::DateTime => ValueKind::DateTime,
            PropertyKind::Map => ValueKind::Map,
            PropertyKind::List => ValueKind::List,
            PropertyKind::Schema(_) => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self.value_kind() {
            Some(kind) => kind.name(),
            None => "document",
        }
    }

    /// Returns `true` for map and list kinds, whose reads return live handles.
    pub fn is_container(&self) -> bool {
        matches!(self, PropertyKind::Map | PropertyKind::List)
    }

    fn from_value_kind(kind: ValueKind) -> Option<Self> {
        Some(match kind {
            ValueKind::Text => PropertyKind::Text,
            ValueKind::Integer => PropertyKind::Integer,
            ValueKind::Float => PropertyKind::Float,
            ValueKind::Boolean => PropertyKind::Boolean,
            ValueKind::Decimal => PropertyKind::Decimal,
            ValueKind::Date => PropertyKind::Date,
            ValueKind::Time => PropertyKind::Time,
            ValueKind::DateTime => PropertyKind::DateTime,
            ValueKind::Map => PropertyKind::Map,
            ValueKind::List => PropertyKind::List,
            ValueKind::Null => return None,
        })
    }
}

#[derive(Clone, Default)]
enum DefaultValue {
    #[default]
    Unset,
    Literal(Value),
    Producer(DefaultFn),
}

/// A typed field descriptor.
#[derive(Clone)]
pub struct Property {
    kind: PropertyKind,
    name: Option<String>,
    verbose_name: Option<String>,
    default: DefaultValue,
    required: bool,
    validators: Vec<Validator>,
    choices: Option<Vec<Value>>,
    item_kind: Option<ValueKind>,
    auto_now: bool,
    auto_now_add: bool,
}

impl Property {
    pub fn new(kind: PropertyKind) -> Self {
        Self {
            kind,
            name: None,
            verbose_name: None,
            default: DefaultValue::Unset,
            required: false,
            validators: Vec::new(),
            choices: None,
            item_kind: None,
            auto_now: false,
            auto_now_add: false,
        }
    }

    pub fn text() -> Self {
        Self::new(PropertyKind::Text)
    }

    pub fn integer() -> Self {
        Self::new(PropertyKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(PropertyKind::Float)
    }

    pub fn boolean() -> Self {
        Self::new(PropertyKind::Boolean)
    }

    pub fn decimal() -> Self {
        Self::new(PropertyKind::Decimal)
    }

    pub fn date() -> Self {
        Self::new(PropertyKind::Date)
    }

    pub fn time() -> Self {
        Self::new(PropertyKind::Time)
    }

    pub fn datetime() -> Self {
        Self::new(PropertyKind::DateTime)
    }

    pub fn map() -> Self {
        Self::new(PropertyKind::Map)
    }

    pub fn list() -> Self {
        Self::new(PropertyKind::List)
    }

    /// A list whose items are all text.
    pub fn string_list() -> Self {
        Self::list().item_kind(ValueKind::Text)
    }

    /// An embedded document of `shape`. Its default is a fresh document of that shape.
    pub fn schema(shape: &Arc<Shape>) -> Self {
        Self::new(PropertyKind::Schema(Arc::clone(shape)))
    }

    /// The property matching the kind of `value`, defaulting to `value`.
    ///
    /// Used for literal declarations. Returns `None` for [`Value::Null`].
    pub fn for_value(value: Value) -> Option<Self> {
        let kind = PropertyKind::from_value_kind(value.kind())?;
        Some(Self::new(kind).default(value))
    }

    /// Stores the field under `name` instead of the attribute name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    /// A literal default, copied for every new document.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultValue::Literal(value.into());
        self
    }

    /// A default computed for every new document.
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = DefaultValue::Producer(Arc::new(producer));
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts list items to one kind. Nested lists and maps are checked recursively.
    pub fn item_kind(mut self, kind: ValueKind) -> Self {
        self.item_kind = Some(kind);
        self
    }

    /// Date, time and datetime only: every write stores the current time.
    pub fn auto_now(mut self, auto_now: bool) -> Self {
        self.auto_now = auto_now;
        self
    }

    /// Date, time and datetime only: new documents default to the current time.
    pub fn auto_now_add(mut self, auto_now_add: bool) -> Self {
        self.auto_now_add = auto_now_add;
        self
    }

    /// Binds the default field key. Called once when the owning shape is built.
    pub(crate) fn configure(&mut self, attr: &str) {
        if self.name.is_none() {
            self.name = Some(attr.to_string());
        }
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// The key this property is stored under in the canonical document.
    pub fn field(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn label(&self) -> &str {
        self.verbose_name.as_deref().unwrap_or_else(|| self.field())
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn choice_list(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    fn is_temporal(&self) -> bool {
        matches!(
            self.kind,
            PropertyKind::Date | PropertyKind::Time | PropertyKind::DateTime
        )
    }

    fn now(&self) -> Value {
        match self.kind {
            PropertyKind::Date => Value::Date(Local::now().date_naive()),
            PropertyKind::Time => Value::Time(Local::now().time()),
            _ => Value::DateTime(Utc::now()),
        }
    }

    /// Produces the value a new document starts with.
    ///
    /// Literal defaults are copied, producers are called, and map/list properties without
    /// a default start empty. Embedded documents are built by the document itself.
    pub fn default_value(&self) -> Value {
        if self.is_temporal() && (self.auto_now || self.auto_now_add) {
            return self.now();
        }
        match &self.default {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Producer(producer) => producer(),
            DefaultValue::Unset => match self.kind {
                PropertyKind::Map => Value::empty_map(),
                PropertyKind::List => Value::empty_list(),
                _ => Value::Null,
            },
        }
    }

    /// Numeric and boolean kinds treat only null as empty.
    pub fn is_empty(&self, value: &Value) -> bool {
        match self.kind {
            PropertyKind::Integer | PropertyKind::Float | PropertyKind::Boolean => {
                value.is_null()
            }
            _ => value.is_falsy(),
        }
    }

    /// Checks `value` against this property.
    ///
    /// The required check only runs when `required` is `true`, which is the case when a
    /// whole document is validated before persistence. Individual writes pass `false`.
    pub fn validate(&self, value: &Value, required: bool) -> DocumentResult<()> {
        if required && self.is_empty(value) {
            if self.required {
                return Err(DocumentError::RequiredFieldMissing(self.field().to_string()));
            }
        } else if let Some(choices) = &self.choices {
            if !value.is_null() && !choices.contains(value) {
                return Err(DocumentError::ChoiceViolation {
                    field: self.field().to_string(),
                    value: value.to_string(),
                    choices: Value::List(choices.clone()).to_string(),
                });
            }
        }

        for validator in &self.validators {
            validator(value).map_err(|reason| DocumentError::ValidationFailed {
                field: self.field().to_string(),
                reason,
            })?;
        }

        if value.is_null() {
            return Ok(());
        }
        self.check_kind(value)
    }

    fn check_kind(&self, value: &Value) -> DocumentResult<()> {
        let expected = match &self.kind {
            PropertyKind::Schema(_) => ValueKind::Map,
            other => other.value_kind().unwrap_or(ValueKind::Map),
        };
        if value.kind() != expected {
            return Err(self.mismatch(self.kind.name(), value));
        }
        if let (Some(item_kind), Value::List(items)) = (self.item_kind, value) {
            self.check_items(item_kind, items)?;
        }
        Ok(())
    }

    fn check_items(&self, item_kind: ValueKind, items: &[Value]) -> DocumentResult<()> {
        for item in items {
            match item {
                Value::List(nested) => self.check_items(item_kind, nested)?,
                Value::Map(entries) => {
                    let nested = entries.values().cloned().collect::<Vec<_>>();
                    self.check_items(item_kind, &nested)?;
                }
                other if other.kind() != item_kind => {
                    return Err(self.mismatch(item_kind.name(), other));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn mismatch(&self, expected: &str, found: &Value) -> DocumentError {
        DocumentError::TypeMismatch {
            field: self.field().to_string(),
            expected: expected.to_string(),
            found: found.kind().name().to_string(),
        }
    }

    /// Converts a native value to the form stored in the canonical document.
    ///
    /// `auto_now` temporal properties ignore `value` and store the current time.
    pub fn to_canonical(&self, value: &Value) -> DocumentResult<Json> {
        if self.is_temporal() && self.auto_now {
            return to_canonical(&self.now());
        }
        to_canonical(value)
    }

    /// Converts a canonical value to the native form for this property.
    pub fn to_native(&self, json: &Json) -> DocumentResult<Value> {
        let Some(kind) = self.kind.value_kind() else {
            return Ok(detect(json));
        };

        let native = match (self.item_kind, json) {
            (Some(item_kind), Json::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Json::Array(_) | Json::Object(_) => Ok(detect(item)),
                    scalar => to_native(scalar, item_kind),
                })
                .collect::<DocumentResult<Vec<_>>>()
                .map(Value::List),
            _ => to_native(json, kind),
        };
        native.map_err(|err| err.with_field(self.field()))
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("kind", &self.kind.name())
            .field("field", &self.field())
            .field("required", &self.required)
            .field("choices", &self.choices)
            .field("item_kind", &self.item_kind)
            .field("validators", &self.validators.len())
            .finish()
    }
}

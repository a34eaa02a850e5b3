//! Input type descriptors and JSON Schema generation
//!
//! Tools, prompts, and resources declare their inputs as an [`InputType`]: a
//! named collection of fields, each carrying a semantic type, an optionality
//! flag, and a constraint bundle. The generator turns a descriptor into a
//! JSON Schema object the registry serves from `tools/list` and the
//! dispatcher validates arguments against.
//!
//! Array element types are captured explicitly at declaration time; erased
//! element types degrade to string items.

use once_cell::sync::Lazy;
use serde_json::{Map, Value, json};

/// Schema served for tools and prompts that declare no input type
pub static EMPTY_OBJECT_SCHEMA: Lazy<Value> =
    Lazy::new(|| json!({"type": "object", "properties": {}}));

/// Semantic type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// Array with an optional element type; `None` degrades to string items
    Array(Option<Box<FieldType>>),
    Object,
}

impl FieldType {
    /// JSON Schema `type` keyword for this semantic type
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array(_) => "array",
            FieldType::Object => "object",
        }
    }
}

/// Constraint bundle attached to a field, emitted verbatim into its schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub description: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
}

impl Constraints {
    fn is_empty(&self) -> bool {
        *self == Constraints::default()
    }
}

/// One declared field of an input type
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub field_type: Option<FieldType>,
    pub optional: bool,
    pub constraints: Constraints,
}

impl Field {
    /// Declare a field with an explicit semantic type
    pub fn new<S: Into<String>>(name: S, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type: Some(field_type),
            optional: false,
            constraints: Constraints::default(),
        }
    }

    /// Declare a field whose type must be inferred from its constraints
    pub fn untyped<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            optional: false,
            constraints: Constraints::default(),
        }
    }

    pub fn string<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn number<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn boolean<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn array<S: Into<String>>(name: S, element: FieldType) -> Self {
        Self::new(name, FieldType::Array(Some(Box::new(element))))
    }

    /// Array whose element type was not recoverable at declaration time
    pub fn array_untyped<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldType::Array(None))
    }

    pub fn object<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldType::Object)
    }

    /// Mark the field optional; optional fields are excluded from `required`
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.constraints.description = Some(description.into());
        self
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        self.constraints.minimum = Some(minimum);
        self
    }

    pub fn maximum(mut self, maximum: f64) -> Self {
        self.constraints.maximum = Some(maximum);
        self
    }

    pub fn min_length(mut self, min_length: u64) -> Self {
        self.constraints.min_length = Some(min_length);
        self
    }

    pub fn max_length(mut self, max_length: u64) -> Self {
        self.constraints.max_length = Some(max_length);
        self
    }

    pub fn pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    /// Restrict the field to an enumerated set of values
    pub fn one_of<I: IntoIterator<Item = Value>>(mut self, values: I) -> Self {
        self.constraints.enum_values = Some(values.into_iter().collect());
        self
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.constraints.default = Some(default);
        self
    }
}

/// A named input type: the declared shape of a tool's or prompt's arguments
#[derive(Debug, Clone, Default)]
pub struct InputType {
    pub name: String,
    pub fields: Vec<Field>,
}

impl InputType {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Generate the JSON Schema for this input type.
    ///
    /// Produces `{type:"object", properties:{...}, required:[...]}` where
    /// `required` lists exactly the non-optional fields and is omitted when
    /// empty. Every array schema carries an `items` sub-schema.
    pub fn schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            properties.insert(field.name.clone(), field_schema(field));
            if !field.optional {
                required.push(Value::String(field.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }

        Value::Object(schema)
    }
}

/// Generate the sub-schema for one field: resolved type plus verbatim
/// constraint fields.
fn field_schema(field: &Field) -> Value {
    let mut schema = Map::new();

    match resolve_type(field) {
        Some(FieldType::Array(element)) => {
            schema.insert("type".to_string(), json!("array"));
            let items = element
                .map(|e| type_schema(&e))
                .unwrap_or_else(|| json!({"type": "string"}));
            schema.insert("items".to_string(), items);
        }
        Some(ty) => {
            schema.insert("type".to_string(), json!(ty.type_name()));
        }
        None => {
            schema.insert("type".to_string(), json!("object"));
        }
    }

    let c = &field.constraints;
    if let Some(description) = &c.description {
        schema.insert("description".to_string(), json!(description));
    }
    if let Some(minimum) = c.minimum {
        schema.insert("minimum".to_string(), number_value(minimum));
    }
    if let Some(maximum) = c.maximum {
        schema.insert("maximum".to_string(), number_value(maximum));
    }
    if let Some(min_length) = c.min_length {
        schema.insert("minLength".to_string(), json!(min_length));
    }
    if let Some(max_length) = c.max_length {
        schema.insert("maxLength".to_string(), json!(max_length));
    }
    if let Some(pattern) = &c.pattern {
        schema.insert("pattern".to_string(), json!(pattern));
    }
    if let Some(enum_values) = &c.enum_values {
        schema.insert("enum".to_string(), Value::Array(enum_values.clone()));
    }
    if let Some(default) = &c.default {
        schema.insert("default".to_string(), default.clone());
    }

    Value::Object(schema)
}

/// Recursively render a semantic type as a plain type schema
fn type_schema(ty: &FieldType) -> Value {
    match ty {
        FieldType::Array(element) => {
            let items = element
                .as_ref()
                .map(|e| type_schema(e))
                .unwrap_or_else(|| json!({"type": "string"}));
            json!({"type": "array", "items": items})
        }
        other => json!({"type": other.type_name()}),
    }
}

/// Resolve the effective type of a field, inferring from constraints when no
/// type was declared: length/pattern constraints imply string, numeric bounds
/// imply number, otherwise the runtime kind of the first enum value.
fn resolve_type(field: &Field) -> Option<FieldType> {
    if let Some(ty) = &field.field_type {
        return Some(ty.clone());
    }
    if field.constraints.is_empty() {
        return None;
    }

    let c = &field.constraints;
    if c.min_length.is_some() || c.max_length.is_some() || c.pattern.is_some() {
        return Some(FieldType::String);
    }
    if c.minimum.is_some() || c.maximum.is_some() {
        return Some(FieldType::Number);
    }
    if let Some(values) = &c.enum_values {
        return values.first().map(|v| match v {
            Value::String(_) => FieldType::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => FieldType::Integer,
            Value::Number(_) => FieldType::Number,
            Value::Bool(_) => FieldType::Boolean,
            Value::Array(_) => FieldType::Array(None),
            _ => FieldType::Object,
        });
    }

    None
}

/// Emit integral minimum/maximum bounds without a trailing `.0`
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

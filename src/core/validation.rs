//! Argument validation against generated input schemas
//!
//! The dispatcher validates `tools/call` arguments before invoking a handler.
//! Validation is schema-driven and reports the first violation it finds; the
//! message is surfaced to the caller as an error content block.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::core::error::{McpError, McpResult};

/// Human-readable kind name for a JSON value
fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Schema-driven validator for tool arguments
#[derive(Debug, Clone)]
pub struct ArgumentValidator {
    schema: Value,
}

impl ArgumentValidator {
    pub fn new(schema: Value) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate arguments, stopping at the first violation
    pub fn validate(&self, arguments: &HashMap<String, Value>) -> McpResult<()> {
        let schema = self
            .schema
            .as_object()
            .ok_or_else(|| McpError::validation("schema must be an object"))?;

        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for name in required.iter().filter_map(|v| v.as_str()) {
                if !arguments.contains_key(name) {
                    return Err(McpError::validation(format!(
                        "missing required parameter '{name}'"
                    )));
                }
            }
        }

        if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
            for (name, value) in arguments {
                if let Some(property) = properties.get(name).and_then(|p| p.as_object()) {
                    self.validate_value(name, value, property)?;
                }
            }
        }

        Ok(())
    }

    fn validate_value(
        &self,
        name: &str,
        value: &Value,
        schema: &Map<String, Value>,
    ) -> McpResult<()> {
        if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
            self.check_type(name, value, expected)?;
        }

        match value {
            Value::String(s) => self.check_string(name, s, schema)?,
            Value::Number(n) => self.check_number(name, n.as_f64().unwrap_or(0.0), schema)?,
            Value::Array(items) => self.check_array(name, items, schema)?,
            _ => {}
        }

        if let Some(enum_values) = schema.get("enum").and_then(|e| e.as_array()) {
            if !enum_values.contains(value) {
                return Err(McpError::validation(format!(
                    "parameter '{name}' must be one of the enumerated values"
                )));
            }
        }

        Ok(())
    }

    fn check_type(&self, name: &str, value: &Value, expected: &str) -> McpResult<()> {
        let ok = match expected {
            "string" => value.is_string(),
            "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            "null" => value.is_null(),
            _ => true,
        };

        if ok {
            Ok(())
        } else {
            Err(McpError::validation(format!(
                "parameter '{name}' must be a {expected}, got {}",
                value_type_name(value)
            )))
        }
    }

    fn check_string(&self, name: &str, value: &str, schema: &Map<String, Value>) -> McpResult<()> {
        if let Some(min) = schema.get("minLength").and_then(|v| v.as_u64()) {
            if (value.chars().count() as u64) < min {
                return Err(McpError::validation(format!(
                    "parameter '{name}' must be at least {min} characters"
                )));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(|v| v.as_u64()) {
            if (value.chars().count() as u64) > max {
                return Err(McpError::validation(format!(
                    "parameter '{name}' must be at most {max} characters"
                )));
            }
        }
        if let Some(pattern) = schema.get("pattern").and_then(|v| v.as_str()) {
            if !pattern_matches(pattern, value) {
                return Err(McpError::validation(format!(
                    "parameter '{name}' does not match pattern '{pattern}'"
                )));
            }
        }
        Ok(())
    }

    fn check_number(&self, name: &str, value: f64, schema: &Map<String, Value>) -> McpResult<()> {
        if let Some(min) = schema.get("minimum").and_then(|v| v.as_f64()) {
            if value < min {
                return Err(McpError::validation(format!(
                    "parameter '{name}' must be >= {min}"
                )));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(|v| v.as_f64()) {
            if value > max {
                return Err(McpError::validation(format!(
                    "parameter '{name}' must be <= {max}"
                )));
            }
        }
        Ok(())
    }

    fn check_array(&self, name: &str, items: &[Value], schema: &Map<String, Value>) -> McpResult<()> {
        if let Some(item_schema) = schema.get("items").and_then(|i| i.as_object()) {
            for (index, item) in items.iter().enumerate() {
                if let Some(expected) = item_schema.get("type").and_then(|t| t.as_str()) {
                    self.check_type(&format!("{name}[{index}]"), item, expected)?;
                }
            }
        }
        Ok(())
    }
}

/// Anchored-literal pattern check.
///
/// Patterns generated by this crate's own schemas are simple anchors over
/// literal text; anything carrying other regex metacharacters is treated as
/// advisory and accepted.
fn pattern_matches(pattern: &str, value: &str) -> bool {
    let anchored_start = pattern.starts_with('^');
    let anchored_end = pattern.ends_with('$');
    let literal = pattern
        .trim_start_matches('^')
        .trim_end_matches('$');

    if literal
        .chars()
        .any(|c| ".*+?()[]{}|\\".contains(c))
    {
        return true;
    }

    match (anchored_start, anchored_end) {
        (true, true) => value == literal,
        (true, false) => value.starts_with(literal),
        (false, true) => value.ends_with(literal),
        (false, false) => value.contains(literal),
    }
}

//! Elicitation: form descriptions returned in place of tool execution
//!
//! A tool may carry an [`ElicitationConfig`]. Before dispatch runs the
//! handler, the interceptor checks whether every required form field has a
//! present, non-empty argument; if not, the tool call resolves to a form
//! object describing the missing inputs instead of executing. Multi-step
//! flows return one step per round; accumulated state lives with the client.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Semantic type of a form field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitFieldType {
    Text,
    Integer,
    Number,
    Boolean,
    Select,
}

/// One field of an elicitation form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitField {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub field_type: ElicitFieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Choices for select fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Value>>,
    /// Validation rules, informational for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Value>,
}

impl ElicitField {
    pub fn new<S: Into<String>>(name: S, field_type: ElicitFieldType) -> Self {
        Self {
            name: name.into(),
            label: None,
            field_type,
            required: false,
            default: None,
            options: None,
            validation: None,
        }
    }

    pub fn text<S: Into<String>>(name: S) -> Self {
        Self::new(name, ElicitFieldType::Text)
    }

    pub fn integer<S: Into<String>>(name: S) -> Self {
        Self::new(name, ElicitFieldType::Integer)
    }

    pub fn boolean<S: Into<String>>(name: S) -> Self {
        Self::new(name, ElicitFieldType::Boolean)
    }

    pub fn select<S: Into<String>, I: IntoIterator<Item = Value>>(name: S, options: I) -> Self {
        let mut field = Self::new(name, ElicitFieldType::Select);
        field.options = Some(options.into_iter().collect());
        field
    }

    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn validation(mut self, rules: Value) -> Self {
        self.validation = Some(rules);
        self
    }
}

/// Definition of one form (or one step of a multi-step flow)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormDef {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<ElicitField>,
}

impl FormDef {
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, field: ElicitField) -> Self {
        self.fields.push(field);
        self
    }
}

/// What a builder yields: a single form or an ordered list of steps
#[derive(Debug, Clone)]
pub enum ElicitationPlan {
    Form(FormDef),
    Steps(Vec<FormDef>),
}

type Condition = dyn Fn(&HashMap<String, Value>) -> bool + Send + Sync;
type Builder = dyn Fn(&HashMap<String, Value>) -> ElicitationPlan + Send + Sync;

/// Elicitation configuration attached to a tool
#[derive(Clone)]
pub struct ElicitationConfig {
    form: Option<FormDef>,
    condition: Option<Arc<Condition>>,
    builder: Option<Arc<Builder>>,
}

impl ElicitationConfig {
    /// Static form definition
    pub fn form(form: FormDef) -> Self {
        Self {
            form: Some(form),
            condition: None,
            builder: None,
        }
    }

    /// Builder callable, invoked per request with the call arguments
    pub fn builder<F>(builder: F) -> Self
    where
        F: Fn(&HashMap<String, Value>) -> ElicitationPlan + Send + Sync + 'static,
    {
        Self {
            form: None,
            condition: None,
            builder: Some(Arc::new(builder)),
        }
    }

    /// Gate elicitation on a predicate over the call arguments
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&HashMap<String, Value>) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Decide whether this call must elicit. Returns the form to send back,
    /// rendered as the tool result, or `None` to let the handler run.
    pub fn intercept(&self, arguments: &HashMap<String, Value>) -> Option<Value> {
        if let Some(condition) = &self.condition {
            if !condition(arguments) {
                return None;
            }
        }

        let plan = match (&self.form, &self.builder) {
            (Some(form), _) => ElicitationPlan::Form(form.clone()),
            (None, Some(builder)) => builder(arguments),
            (None, None) => return None,
        };

        match plan {
            ElicitationPlan::Form(form) => {
                if has_missing_required(&form, arguments) {
                    Some(render_form(&form, None))
                } else {
                    None
                }
            }
            ElicitationPlan::Steps(steps) => {
                let total = steps.len();
                steps
                    .into_iter()
                    .enumerate()
                    .find(|(_, step)| has_missing_required(step, arguments))
                    .map(|(index, step)| render_form(&step, Some((index, total))))
            }
        }
    }
}

impl fmt::Debug for ElicitationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElicitationConfig")
            .field("static_form", &self.form.is_some())
            .field("has_condition", &self.condition.is_some())
            .field("has_builder", &self.builder.is_some())
            .finish()
    }
}

/// A required field is satisfied by a present, non-empty value
fn has_missing_required(form: &FormDef, arguments: &HashMap<String, Value>) -> bool {
    form.fields
        .iter()
        .filter(|field| field.required)
        .any(|field| !is_present(arguments.get(&field.name)))
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Render a form as the `{type:"elicitation", ...}` result object
fn render_form(form: &FormDef, step: Option<(usize, usize)>) -> Value {
    let mut metadata = serde_json::Map::new();
    if let Some((index, total)) = step {
        metadata.insert("step".to_string(), json!(index + 1));
        metadata.insert("totalSteps".to_string(), json!(total));
    }

    let mut rendered = json!({
        "type": "elicitation",
        "title": form.title,
        "fields": form.fields,
        "metadata": Value::Object(metadata),
    });
    if let Some(description) = &form.description {
        rendered["description"] = json!(description);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_form() -> FormDef {
        FormDef::new("Create a channel")
            .description("A channel name is required")
            .field(
                ElicitField::text("channelName")
                    .label("Channel name")
                    .required()
                    .validation(json!({"minLength": 1})),
            )
            .field(ElicitField::boolean("private").default_value(json!(false)))
    }

    fn args(value: Value) -> HashMap<String, Value> {
        value
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[test]
    fn test_missing_required_elicits() {
        let config = ElicitationConfig::form(channel_form());
        let form = config.intercept(&args(json!({}))).expect("should elicit");
        assert_eq!(form["type"], "elicitation");
        assert_eq!(form["title"], "Create a channel");
        assert_eq!(form["fields"][0]["name"], "channelName");
        assert_eq!(form["fields"][0]["required"], true);
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let config = ElicitationConfig::form(channel_form());
        assert!(config.intercept(&args(json!({"channelName": ""}))).is_some());
        assert!(config.intercept(&args(json!({"channelName": null}))).is_some());
    }

    #[test]
    fn test_present_required_skips_elicitation() {
        let config = ElicitationConfig::form(channel_form());
        assert!(
            config
                .intercept(&args(json!({"channelName": "general"})))
                .is_none()
        );
    }

    #[test]
    fn test_condition_gates_elicitation() {
        let config = ElicitationConfig::form(channel_form())
            .with_condition(|arguments| arguments.get("interactive") == Some(&json!(true)));

        // Condition false: never elicit, even with missing fields
        assert!(config.intercept(&args(json!({}))).is_none());
        assert!(
            config
                .intercept(&args(json!({"interactive": true})))
                .is_some()
        );
    }

    #[test]
    fn test_multi_step_returns_first_unsatisfied_step() {
        let config = ElicitationConfig::builder(|_| {
            ElicitationPlan::Steps(vec![
                FormDef::new("Account").field(ElicitField::text("email").required()),
                FormDef::new("Profile").field(ElicitField::text("displayName").required()),
            ])
        });

        let first = config.intercept(&args(json!({}))).unwrap();
        assert_eq!(first["title"], "Account");
        assert_eq!(first["metadata"]["step"], 1);
        assert_eq!(first["metadata"]["totalSteps"], 2);

        let second = config
            .intercept(&args(json!({"email": "a@b.c"})))
            .unwrap();
        assert_eq!(second["title"], "Profile");
        assert_eq!(second["metadata"]["step"], 2);

        assert!(
            config
                .intercept(&args(json!({"email": "a@b.c", "displayName": "Ada"})))
                .is_none()
        );
    }
}

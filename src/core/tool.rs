//! Tool records: handler, generated schema, validator, elicitation config
//!
//! A registered tool owns its handler trait object and the JSON Schema
//! generated from its declared input type. Validation runs before dispatch;
//! an optional [`ElicitationConfig`] can suspend dispatch entirely.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::core::context::RequestContext;
use crate::core::elicitation::ElicitationConfig;
use crate::core::error::McpResult;
use crate::core::schema::InputType;
use crate::core::validation::ArgumentValidator;
use crate::protocol::types::{ToolInfo, ToolInputSchema};

/// Trait for implementing tool handlers
///
/// Handlers return a raw [`Value`]; the dispatcher formats it (strings pass
/// through, everything else is pretty-printed JSON) and wraps it in content.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        arguments: HashMap<String, Value>,
        context: RequestContext,
    ) -> McpResult<Value>;
}

/// Adapter implementing [`ToolHandler`] for async closures
pub struct FnToolHandler<F>(pub F);

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(HashMap<String, Value>, RequestContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = McpResult<Value>> + Send,
{
    async fn call(
        &self,
        arguments: HashMap<String, Value>,
        context: RequestContext,
    ) -> McpResult<Value> {
        (self.0)(arguments, context).await
    }
}

/// A registered tool
pub struct Tool {
    /// Information served by tools/list
    pub info: ToolInfo,
    /// Handler implementing the tool
    pub handler: Box<dyn ToolHandler>,
    /// Validator over the generated input schema
    pub validator: ArgumentValidator,
    /// Optional elicitation configuration
    pub elicitation: Option<ElicitationConfig>,
}

impl Tool {
    /// Create a tool from its declared input type (or none for an empty
    /// object schema).
    pub fn new<H>(
        name: String,
        description: Option<String>,
        input: Option<&InputType>,
        handler: H,
    ) -> Self
    where
        H: ToolHandler + 'static,
    {
        let schema = input
            .map(|i| i.schema())
            .unwrap_or_else(|| crate::core::schema::EMPTY_OBJECT_SCHEMA.clone());

        Self {
            info: ToolInfo {
                name,
                description,
                input_schema: ToolInputSchema::from_value(&schema),
                title: None,
            },
            handler: Box::new(handler),
            validator: ArgumentValidator::new(schema),
            elicitation: None,
        }
    }

    pub fn with_title(mut self, title: String) -> Self {
        self.info.title = Some(title);
        self
    }

    pub fn with_elicitation(mut self, config: ElicitationConfig) -> Self {
        self.elicitation = Some(config);
        self
    }

    /// Validate arguments without executing the tool
    pub fn validate_arguments(&self, arguments: &HashMap<String, Value>) -> McpResult<()> {
        self.validator.validate(arguments)
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("info", &self.info)
            .field("has_elicitation", &self.elicitation.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Field;
    use serde_json::json;

    fn echo_tool() -> Tool {
        let input = InputType::new("EchoInput").field(Field::string("message"));
        Tool::new(
            "echo".to_string(),
            Some("Echo a message".to_string()),
            Some(&input),
            FnToolHandler(|arguments: HashMap<String, Value>, _ctx| async move {
                Ok(arguments.get("message").cloned().unwrap_or(Value::Null))
            }),
        )
    }

    #[tokio::test]
    async fn test_tool_call_through_handler() {
        let tool = echo_tool();
        let mut arguments = HashMap::new();
        arguments.insert("message".to_string(), json!("hi"));
        let result = tool
            .handler
            .call(arguments, RequestContext::new())
            .await
            .unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[test]
    fn test_tool_schema_required() {
        let tool = echo_tool();
        assert_eq!(
            tool.info.input_schema.required.as_deref(),
            Some(&["message".to_string()][..])
        );
    }

    #[test]
    fn test_tool_without_input_gets_empty_schema() {
        let tool = Tool::new(
            "ping".to_string(),
            None,
            None,
            FnToolHandler(|_, _| async { Ok(json!("pong")) }),
        );
        assert!(tool.info.input_schema.required.is_none());
        assert!(tool.info.input_schema.properties.as_ref().unwrap().is_empty());
        assert!(tool.validate_arguments(&HashMap::new()).is_ok());
    }
}

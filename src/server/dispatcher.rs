//! JSON-RPC request dispatch
//!
//! Routes the recognized MCP methods to the capability registry, validates
//! tool arguments, applies elicitation interception, and formats results.
//!
//! Error surfacing follows the protocol taxonomy: schema-violating arguments
//! and handler failures on tools come back as `isError` content inside a
//! successful envelope; resource and prompt handler failures fail the request
//! with `-32603`; unknown names map to `-32601`; session/protocol violations
//! map to `-32000`.

use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::context::RequestContext;
use crate::core::error::{McpError, McpResult};
use crate::core::registry::CapabilityRegistry;
use crate::protocol::methods;
use crate::protocol::types::{
    GetPromptResult, InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcRequest,
    JsonRpcResponse, LATEST_PROTOCOL_VERSION, ListPromptsResult, ListResourcesResult,
    ListToolsResult, PromptMessage, PromptsCapability, ReadResourceResult, ResourceContents,
    ResourcesCapability, SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, ToolResult,
    ToolsCapability, error_codes,
};

#[derive(Debug, Deserialize)]
struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    protocol_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: HashMap<String, Value>,
    #[serde(rename = "_meta")]
    meta: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    uri: String,
    #[serde(rename = "_meta")]
    meta: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: HashMap<String, Value>,
    #[serde(rename = "_meta")]
    meta: Option<Value>,
}

/// Dispatcher for one server identity over a shared capability registry
#[derive(Clone)]
pub struct Dispatcher {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    registry: Arc<CapabilityRegistry>,
}

impl Dispatcher {
    pub fn new(name: String, version: String, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            info: ServerInfo::new(name, version),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                resources: Some(ResourcesCapability::default()),
                prompts: Some(PromptsCapability::default()),
            },
            registry,
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Handle one JSON-RPC frame. Notifications produce no response.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        context: RequestContext,
    ) -> Option<JsonRpcMessage> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcMessage::Error(JsonRpcError::error(
                request.id,
                error_codes::INVALID_REQUEST,
                "unsupported JSON-RPC version".to_string(),
                None,
            )));
        }

        if request.method.starts_with("notifications/") {
            tracing::debug!(method = %request.method, "notification accepted");
            return None;
        }

        tracing::debug!(method = %request.method, "dispatching request");

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request.params),
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => self.handle_tools_list(),
            methods::TOOLS_CALL => self.handle_tools_call(request.params, context).await,
            methods::RESOURCES_LIST => self.handle_resources_list(),
            methods::RESOURCES_READ => self.handle_resources_read(request.params, context).await,
            methods::PROMPTS_LIST => self.handle_prompts_list(),
            methods::PROMPTS_GET => self.handle_prompts_get(request.params, context).await,
            method => Err(McpError::MethodNotFound(method.to_string())),
        };

        Some(match result {
            Ok(value) => JsonRpcMessage::Response(JsonRpcResponse::success(request.id, value)),
            Err(error) => {
                let code = match &error {
                    McpError::ToolNotFound(_)
                    | McpError::ResourceNotFound(_)
                    | McpError::PromptNotFound(_)
                    | McpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
                    McpError::InvalidParams(_) | McpError::Validation(_) => {
                        error_codes::INVALID_PARAMS
                    }
                    McpError::Protocol(_) | McpError::Session(_) => error_codes::BAD_REQUEST,
                    _ => error_codes::INTERNAL_ERROR,
                };
                tracing::debug!(method = %request.method, code, error = %error, "request failed");
                JsonRpcMessage::Error(JsonRpcError::error(
                    request.id,
                    code,
                    error.to_string(),
                    None,
                ))
            }
        })
    }

    fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| McpError::InvalidParams(format!("invalid initialize params: {e}")))?,
            None => InitializeParams {
                protocol_version: None,
            },
        };

        // Echo a supported client version, otherwise answer with our latest
        let protocol_version = params
            .protocol_version
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(&v.as_str()))
            .unwrap_or_else(|| LATEST_PROTOCOL_VERSION.to_string());

        let result = InitializeResult {
            protocol_version,
            capabilities: self.capabilities.clone(),
            server_info: self.info.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_tools_list(&self) -> McpResult<Value> {
        let mut tools: Vec<_> = self.registry.tools().map(|t| t.info.clone()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(serde_json::to_value(ListToolsResult {
            tools,
            next_cursor: None,
        })?)
    }

    async fn handle_tools_call(
        &self,
        params: Option<Value>,
        context: RequestContext,
    ) -> McpResult<Value> {
        let params: CallToolParams = serde_json::from_value(
            params.ok_or_else(|| McpError::InvalidParams("missing tool call params".to_string()))?,
        )
        .map_err(|e| McpError::InvalidParams(format!("invalid tool call params: {e}")))?;

        let tool = self
            .registry
            .tool(&params.name)
            .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;

        // Elicitation runs before validation: missing required inputs become
        // a form instead of a validation failure
        if let Some(config) = &tool.elicitation {
            if let Some(form) = config.intercept(&params.arguments) {
                tracing::debug!(tool = %params.name, "returning elicitation form");
                return Ok(form);
            }
        }

        if let Err(error) = tool.validate_arguments(&params.arguments) {
            return Ok(serde_json::to_value(ToolResult::error(error.to_string()))?);
        }

        let context = match params.meta {
            Some(meta) => context.with_meta(meta),
            None => context,
        };

        match tool.handler.call(params.arguments, context).await {
            Ok(value) => Ok(serde_json::to_value(ToolResult::text(render_text(&value)))?),
            Err(error) => {
                tracing::error!(tool = %params.name, error = %error, "tool handler failed");
                Ok(serde_json::to_value(ToolResult::error(error.to_string()))?)
            }
        }
    }

    fn handle_resources_list(&self) -> McpResult<Value> {
        let mut resources: Vec<_> = self.registry.resources().map(|r| r.info.clone()).collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        Ok(serde_json::to_value(ListResourcesResult {
            resources,
            next_cursor: None,
        })?)
    }

    async fn handle_resources_read(
        &self,
        params: Option<Value>,
        context: RequestContext,
    ) -> McpResult<Value> {
        let params: ReadResourceParams = serde_json::from_value(
            params.ok_or_else(|| McpError::InvalidParams("missing read params".to_string()))?,
        )
        .map_err(|e| McpError::InvalidParams(format!("invalid read params: {e}")))?;

        let resource = self
            .registry
            .resource(&params.uri)
            .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;

        let context = match params.meta {
            Some(meta) => context.with_meta(meta),
            None => context,
        };

        // Resource handler failures fail the request, unlike tools
        let value = resource.handler.read(context).await.map_err(|error| {
            tracing::error!(uri = %params.uri, error = %error, "resource handler failed");
            McpError::Internal(error.to_string())
        })?;

        Ok(serde_json::to_value(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: params.uri,
                mime_type: Some(resource.mime_type().to_string()),
                text: Some(render_text(&value)),
            }],
        })?)
    }

    fn handle_prompts_list(&self) -> McpResult<Value> {
        let mut prompts: Vec<_> = self.registry.prompts().map(|p| p.info.clone()).collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(serde_json::to_value(ListPromptsResult {
            prompts,
            next_cursor: None,
        })?)
    }

    async fn handle_prompts_get(
        &self,
        params: Option<Value>,
        context: RequestContext,
    ) -> McpResult<Value> {
        let params: GetPromptParams = serde_json::from_value(
            params.ok_or_else(|| McpError::InvalidParams("missing prompt params".to_string()))?,
        )
        .map_err(|e| McpError::InvalidParams(format!("invalid prompt params: {e}")))?;

        let prompt = self
            .registry
            .prompt(&params.name)
            .ok_or_else(|| McpError::PromptNotFound(params.name.clone()))?;

        let context = match params.meta {
            Some(meta) => context.with_meta(meta),
            None => context,
        };

        let value = prompt
            .handler
            .render(params.arguments, context)
            .await
            .map_err(|error| {
                tracing::error!(prompt = %params.name, error = %error, "prompt handler failed");
                McpError::Internal(error.to_string())
            })?;

        // Results already shaped as {messages: [...]} pass through
        if value.get("messages").is_some() {
            return Ok(value);
        }

        let description = prompt.info.description.clone();
        Ok(serde_json::to_value(GetPromptResult {
            description,
            messages: vec![PromptMessage::user_text(render_text(&value))],
        })?)
    }
}

/// Render a handler result as text: strings pass through, everything else is
/// serialized as JSON with 2-space indentation.
fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

//! Prompt records: templated messages with derived argument lists

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::core::context::RequestContext;
use crate::core::error::McpResult;
use crate::protocol::types::PromptInfo;

/// Trait for implementing prompt handlers
///
/// A handler may return either a value already carrying a `messages` field
/// (passed through verbatim) or any other value, which the dispatcher wraps
/// as a single user-role text message.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn render(
        &self,
        arguments: HashMap<String, Value>,
        context: RequestContext,
    ) -> McpResult<Value>;
}

/// Adapter implementing [`PromptHandler`] for async closures
pub struct FnPromptHandler<F>(pub F);

#[async_trait]
impl<F, Fut> PromptHandler for FnPromptHandler<F>
where
    F: Fn(HashMap<String, Value>, RequestContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = McpResult<Value>> + Send,
{
    async fn render(
        &self,
        arguments: HashMap<String, Value>,
        context: RequestContext,
    ) -> McpResult<Value> {
        (self.0)(arguments, context).await
    }
}

/// A registered prompt
pub struct Prompt {
    /// Information served by prompts/list, including the derived arguments
    pub info: PromptInfo,
    /// Handler implementing the prompt
    pub handler: Box<dyn PromptHandler>,
}

impl Prompt {
    pub fn new<H>(info: PromptInfo, handler: H) -> Self
    where
        H: PromptHandler + 'static,
    {
        Self {
            info,
            handler: Box::new(handler),
        }
    }
}

impl std::fmt::Debug for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt").field("info", &self.info).finish()
    }
}

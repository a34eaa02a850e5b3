//! Resource records: readable data endpoints

use async_trait::async_trait;
use serde_json::Value;

use crate::core::context::RequestContext;
use crate::core::error::McpResult;
use crate::protocol::types::ResourceInfo;

/// Default MIME type for resources that do not declare one
pub const DEFAULT_RESOURCE_MIME_TYPE: &str = "application/json";

/// Trait for implementing resource handlers
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Read the resource. Invoked with no arguments beyond the context.
    async fn read(&self, context: RequestContext) -> McpResult<Value>;
}

/// Adapter implementing [`ResourceHandler`] for async closures
pub struct FnResourceHandler<F>(pub F);

#[async_trait]
impl<F, Fut> ResourceHandler for FnResourceHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = McpResult<Value>> + Send,
{
    async fn read(&self, context: RequestContext) -> McpResult<Value> {
        (self.0)(context).await
    }
}

/// A registered resource
pub struct Resource {
    /// Information served by resources/list
    pub info: ResourceInfo,
    /// Handler implementing the resource
    pub handler: Box<dyn ResourceHandler>,
}

impl Resource {
    pub fn new<H>(info: ResourceInfo, handler: H) -> Self
    where
        H: ResourceHandler + 'static,
    {
        Self {
            info,
            handler: Box::new(handler),
        }
    }

    /// MIME type to report in read results
    pub fn mime_type(&self) -> &str {
        self.info
            .mime_type
            .as_deref()
            .unwrap_or(DEFAULT_RESOURCE_MIME_TYPE)
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("info", &self.info).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_resource_read() {
        let resource = Resource::new(
            ResourceInfo {
                uri: "inventory://levels".to_string(),
                name: "levels".to_string(),
                description: None,
                mime_type: None,
            },
            FnResourceHandler(|_ctx| async { Ok(json!({"widgets": 12})) }),
        );

        assert_eq!(resource.mime_type(), DEFAULT_RESOURCE_MIME_TYPE);
        let value = resource.handler.read(RequestContext::new()).await.unwrap();
        assert_eq!(value["widgets"], 12);
    }
}

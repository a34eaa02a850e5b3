//! Capability registry: service registration and the tools/resources/prompts
//! index
//!
//! Services declare their capabilities through an explicit registration
//! builder: a [`ServiceDef`] lists the tools, resources, and prompts a
//! service exposes, and [`CapabilityRegistry::register_service`] indexes
//! them. Resource URIs take the form `<service-slug>://<method-name>`.
//!
//! Registration is idempotent per (kind, name) tuple; re-registering a name
//! within a kind overwrites the prior entry and is reported at `warn!`.

use std::collections::HashMap;

use crate::core::elicitation::ElicitationConfig;
use crate::core::prompt::{Prompt, PromptHandler};
use crate::core::resource::{Resource, ResourceHandler};
use crate::core::schema::InputType;
use crate::core::tool::{Tool, ToolHandler};
use crate::core::validation::ArgumentValidator;
use crate::protocol::types::{PromptArgument, PromptInfo, ResourceInfo, ToolInfo, ToolInputSchema};

/// Declaration of one tool on a service
pub struct ToolDef {
    name: String,
    description: Option<String>,
    title: Option<String>,
    input: Option<InputType>,
    elicitation: Option<ElicitationConfig>,
    handler: Box<dyn ToolHandler>,
}

impl ToolDef {
    pub fn new<S: Into<String>, H: ToolHandler + 'static>(name: S, handler: H) -> Self {
        Self {
            name: name.into(),
            description: None,
            title: None,
            input: None,
            elicitation: None,
            handler: Box::new(handler),
        }
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Declare the tool's input type; its schema feeds tools/list and
    /// argument validation.
    pub fn input(mut self, input: InputType) -> Self {
        self.input = Some(input);
        self
    }

    pub fn elicitation(mut self, config: ElicitationConfig) -> Self {
        self.elicitation = Some(config);
        self
    }
}

/// Declaration of one resource method on a service
pub struct ResourceDef {
    method: String,
    description: Option<String>,
    mime_type: Option<String>,
    handler: Box<dyn ResourceHandler>,
}

impl ResourceDef {
    pub fn new<S: Into<String>, H: ResourceHandler + 'static>(method: S, handler: H) -> Self {
        Self {
            method: method.into(),
            description: None,
            mime_type: None,
            handler: Box::new(handler),
        }
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Declaration of one prompt on a service
pub struct PromptDef {
    name: String,
    description: Option<String>,
    input: Option<InputType>,
    handler: Box<dyn PromptHandler>,
}

impl PromptDef {
    pub fn new<S: Into<String>, H: PromptHandler + 'static>(name: S, handler: H) -> Self {
        Self {
            name: name.into(),
            description: None,
            input: None,
            handler: Box::new(handler),
        }
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn input(mut self, input: InputType) -> Self {
        self.input = Some(input);
        self
    }
}

/// Registration builder for one service instance
pub struct ServiceDef {
    name: String,
    tools: Vec<ToolDef>,
    resources: Vec<ResourceDef>,
    prompts: Vec<PromptDef>,
}

impl ServiceDef {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
            resources: Vec::new(),
            prompts: Vec::new(),
        }
    }

    pub fn tool(mut self, tool: ToolDef) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn resource(mut self, resource: ResourceDef) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn prompt(mut self, prompt: PromptDef) -> Self {
        self.prompts.push(prompt);
        self
    }
}

/// Slug used in resource URIs: the service name lowercased with a trailing
/// "service" suffix stripped.
pub fn service_slug(name: &str) -> String {
    let lowered = name.to_lowercase();
    lowered
        .strip_suffix("service")
        .filter(|s| !s.is_empty())
        .unwrap_or(&lowered)
        .to_string()
}

/// Index of every registered capability, shared read-only after startup
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    tools: HashMap<String, Tool>,
    resources: HashMap<String, Resource>,
    prompts: HashMap<String, Prompt>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every capability a service declares
    pub fn register_service(&mut self, service: ServiceDef) {
        let slug = service_slug(&service.name);

        for def in service.tools {
            self.register_tool(def);
        }

        for def in service.resources {
            let uri = format!("{slug}://{}", def.method);
            let info = ResourceInfo {
                uri: uri.clone(),
                name: def.method,
                description: def.description,
                mime_type: def.mime_type,
            };
            if self.resources.contains_key(&uri) {
                tracing::warn!(uri = %uri, "overwriting resource registration");
            }
            self.resources
                .insert(uri, Resource { info, handler: def.handler });
        }

        for def in service.prompts {
            self.register_prompt(def);
        }
    }

    /// Register a single tool outside a service definition
    pub fn register_tool(&mut self, def: ToolDef) {
        let schema = def
            .input
            .as_ref()
            .map(|i| i.schema())
            .unwrap_or_else(|| crate::core::schema::EMPTY_OBJECT_SCHEMA.clone());

        let tool = Tool {
            info: ToolInfo {
                name: def.name.clone(),
                description: def.description,
                input_schema: ToolInputSchema::from_value(&schema),
                title: def.title,
            },
            handler: def.handler,
            validator: ArgumentValidator::new(schema),
            elicitation: def.elicitation,
        };

        if self.tools.contains_key(&def.name) {
            tracing::warn!(tool = %def.name, "overwriting tool registration");
        }
        self.tools.insert(def.name, tool);
    }

    /// Register a single prompt outside a service definition
    pub fn register_prompt(&mut self, def: PromptDef) {
        let arguments = def.input.as_ref().map(derive_prompt_arguments);
        let info = PromptInfo {
            name: def.name.clone(),
            description: def.description,
            arguments,
        };
        if self.prompts.contains_key(&def.name) {
            tracing::warn!(prompt = %def.name, "overwriting prompt registration");
        }
        self.prompts.insert(def.name, Prompt { info, handler: def.handler });
    }

    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resources.get(uri)
    }

    pub fn prompt(&self, name: &str) -> Option<&Prompt> {
        self.prompts.get(name)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn prompts(&self) -> impl Iterator<Item = &Prompt> {
        self.prompts.values()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn resource_uris(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    pub fn prompt_names(&self) -> Vec<String> {
        self.prompts.keys().cloned().collect()
    }
}

/// Derive the prompt `arguments` list from an input type: one entry per
/// property, carrying name, description, and required flag.
fn derive_prompt_arguments(input: &InputType) -> Vec<PromptArgument> {
    input
        .fields
        .iter()
        .map(|field| PromptArgument {
            name: field.name.clone(),
            description: field.constraints.description.clone(),
            required: Some(!field.optional),
        })
        .collect()
}

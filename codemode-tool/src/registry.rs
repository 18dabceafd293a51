//! Tool registry: register, filter, authorize and execute tools.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use codemode_types::{
    AuthContext, Tool, ToolContext, ToolDefinition, ToolDyn, ToolError, ToolOutput,
};

use crate::filter::ToolFilter;
use crate::middleware::{Next, ToolCall, ToolMiddleware};

/// Registry of tools with optional middleware pipelines.
///
/// Tools are stored as type-erased [`ToolDyn`] trait objects in name order,
/// so every enumeration is deterministic. A [`ToolFilter`] and the caller's
/// [`AuthContext`] decide which tools are enabled for a request; disabled
/// tools are neither listed nor executable.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolDyn>>,
    filter: ToolFilter,
    global_middleware: Vec<Arc<dyn ToolMiddleware>>,
    tool_middleware: HashMap<String, Vec<Arc<dyn ToolMiddleware>>>,
}

impl ToolRegistry {
    /// Create an empty registry that admits every tool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            filter: ToolFilter::allow_all(),
            global_middleware: Vec::new(),
            tool_middleware: HashMap::new(),
        }
    }

    /// Replace the include/exclude filter.
    #[must_use]
    pub fn with_filter(mut self, filter: ToolFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Register a strongly-typed tool (auto-erased to `ToolDyn`).
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(T::NAME.to_string(), Arc::new(tool));
    }

    /// Register a pre-erased tool.
    pub fn register_dyn(&mut self, tool: Arc<dyn ToolDyn>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name, ignoring filters and authorization.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolDyn>> {
        self.tools.get(name).cloned()
    }

    /// Definitions for all registered tools, in name order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Definitions of the tools enabled for `auth`, in name order.
    #[must_use]
    pub fn enabled_definitions(&self, auth: &AuthContext) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| t.definition())
            .filter(|def| self.filter.allows(def) && auth.grants_all(&def.required_scopes))
            .collect()
    }

    /// Whether the named tool is registered and enabled for `auth`.
    #[must_use]
    pub fn is_enabled(&self, name: &str, auth: &AuthContext) -> bool {
        self.check_enabled(name, auth).is_ok()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Add global middleware (applies to all tool executions).
    pub fn add_middleware(&mut self, m: impl ToolMiddleware + 'static) -> &mut Self {
        self.global_middleware.push(Arc::new(m));
        self
    }

    /// Add middleware that only applies to a specific tool.
    pub fn add_tool_middleware(
        &mut self,
        tool_name: &str,
        m: impl ToolMiddleware + 'static,
    ) -> &mut Self {
        self.tool_middleware
            .entry(tool_name.to_string())
            .or_default()
            .push(Arc::new(m));
        self
    }

    /// Execute a tool by name, running it through the middleware chain.
    ///
    /// Middleware order: global middleware first, then per-tool middleware,
    /// then the actual tool.
    ///
    /// # Errors
    ///
    /// [`ToolError::NotFound`] for unknown or filtered-out tools,
    /// [`ToolError::PermissionDenied`] when the caller lacks a required
    /// scope, otherwise whatever the chain or the tool returns.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self.check_enabled(name, &ctx.auth)?;

        let call = ToolCall {
            request_id: ctx.request_id.clone(),
            name: name.to_string(),
            input,
        };

        let mut chain: Vec<Arc<dyn ToolMiddleware>> = self.global_middleware.clone();
        if let Some(per_tool) = self.tool_middleware.get(name) {
            chain.extend(per_tool.iter().cloned());
        }

        Next::new(tool.as_ref(), &chain).run(&call, ctx).await
    }

    fn check_enabled(
        &self,
        name: &str,
        auth: &AuthContext,
    ) -> Result<&Arc<dyn ToolDyn>, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let def = tool.definition();
        if !self.filter.allows(&def) {
            return Err(ToolError::NotFound(name.to_string()));
        }
        if !auth.grants_all(&def.required_scopes) {
            return Err(ToolError::PermissionDenied(format!(
                "'{name}' requires scopes: {}",
                def.required_scopes.join(", ")
            )));
        }
        Ok(tool)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

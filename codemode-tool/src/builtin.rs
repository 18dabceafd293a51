//! Built-in middleware implementations.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use codemode_types::{BoxedFuture, ToolContext, ToolError, ToolOutput};

use crate::middleware::{Next, ToolCall, ToolMiddleware};
use crate::registry::ToolRegistry;
use crate::schema;

/// Middleware that validates tool call input against the tool's JSON Schema.
///
/// Every issue found is reported in a single [`ToolError::InvalidInput`],
/// one `path: message` entry per issue, so the caller can fix them all in
/// one round trip.
pub struct SchemaValidator {
    /// Map of tool name to its input_schema JSON value.
    schemas: HashMap<String, serde_json::Value>,
}

impl SchemaValidator {
    /// Create a new schema validator from the current tool registry.
    ///
    /// Snapshots all tool definitions at construction time. Tools registered
    /// after this call will not be validated.
    #[must_use]
    pub fn new(registry: &ToolRegistry) -> Self {
        let schemas = registry
            .definitions()
            .into_iter()
            .map(|def| (def.name, def.input_schema))
            .collect();
        Self { schemas }
    }
}

impl ToolMiddleware for SchemaValidator {
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            if let Some(schema) = self.schemas.get(&call.name) {
                let issues = schema::validate(&call.input, schema);
                if !issues.is_empty() {
                    let joined = issues
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ");
                    return Err(ToolError::InvalidInput(joined));
                }
            }
            next.run(call, ctx).await
        })
    }
}

/// Middleware that enforces a timeout on tool execution.
///
/// Wraps the downstream tool call in [`tokio::time::timeout`]. If the tool
/// does not complete within the configured duration, returns
/// `ToolError::ExecutionFailed` with a descriptive message.
///
/// Per-tool overrides allow different timeouts for tools with known
/// different latency profiles (e.g., a VizQL query vs. a metadata lookup).
pub struct TimeoutMiddleware {
    default_timeout: Duration,
    per_tool: HashMap<String, Duration>,
}

impl TimeoutMiddleware {
    /// Create a new timeout middleware with the given default timeout.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            per_tool: HashMap::new(),
        }
    }

    /// Set a per-tool timeout override.
    #[must_use]
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.per_tool.insert(tool_name.into(), timeout);
        self
    }
}

impl ToolMiddleware for TimeoutMiddleware {
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let timeout = self
                .per_tool
                .get(&call.name)
                .unwrap_or(&self.default_timeout);
            match tokio::time::timeout(*timeout, next.run(call, ctx)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ToolError::ExecutionFailed(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!(
                        "tool '{}' timed out after {:.1}s",
                        call.name,
                        timeout.as_secs_f64()
                    ),
                )))),
            }
        })
    }
}

/// Middleware that emits a `tracing` event for every tool call.
///
/// Successful calls are logged at debug level, failures and error outputs
/// at warn level. Inputs are never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl ToolMiddleware for TracingMiddleware {
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = next.run(call, ctx).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(output) if output.is_error => tracing::warn!(
                    tool = %call.name,
                    request_id = %call.request_id,
                    elapsed_ms,
                    "tool returned an error result"
                ),
                Ok(_) => tracing::debug!(
                    tool = %call.name,
                    request_id = %call.request_id,
                    elapsed_ms,
                    "tool call completed"
                ),
                Err(error) => tracing::warn!(
                    tool = %call.name,
                    request_id = %call.request_id,
                    elapsed_ms,
                    %error,
                    "tool call failed"
                ),
            }
            result
        })
    }
}

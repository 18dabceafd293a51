//! Middleware types for the tool execution pipeline.
//!
//! Middleware wraps tool execution with cross-cutting concerns such as
//! validation, deadlines and logging. Each middleware receives a [`Next`]
//! that it calls to continue the chain, or skips to short-circuit, the same
//! shape as axum's `from_fn`.

use std::sync::Arc;

use codemode_types::{BoxedFuture, ToolContext, ToolDyn, ToolError, ToolOutput};

/// A tool call in flight through the middleware pipeline.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Identifier of the request the call belongs to.
    pub request_id: String,
    /// Name of the tool being called.
    pub name: String,
    /// JSON input arguments.
    pub input: serde_json::Value,
}

/// One stage of the pipeline between [`ToolRegistry::execute`] and the tool.
///
/// A stage that returns without calling [`Next::run`] short-circuits the
/// call; the tool never sees it.
///
/// [`ToolRegistry::execute`]: crate::ToolRegistry::execute
pub trait ToolMiddleware: Send + Sync {
    /// Handle `call`, usually by awaiting `next.run(call, ctx)`.
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>>;
}

/// The stages after the current one, ending at the tool.
///
/// `run` takes `self`, so a stage can forward a call at most once.
pub struct Next<'a> {
    tool: &'a dyn ToolDyn,
    middleware: &'a [Arc<dyn ToolMiddleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(tool: &'a dyn ToolDyn, middleware: &'a [Arc<dyn ToolMiddleware>]) -> Self {
        Self { tool, middleware }
    }

    /// Continue the middleware chain, eventually calling the tool.
    pub async fn run(
        self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        match self.middleware.split_first() {
            Some((head, tail)) => head.process(call, ctx, Next::new(self.tool, tail)).await,
            None => self.tool.call_dyn(call.input.clone(), ctx).await,
        }
    }
}

struct MiddlewareFn<F> {
    f: F,
}

impl<F> ToolMiddleware for MiddlewareFn<F>
where
    F: for<'a> Fn(
            &'a ToolCall,
            &'a ToolContext,
            Next<'a>,
        ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>>
        + Send
        + Sync,
{
    fn process<'a>(
        &'a self,
        call: &'a ToolCall,
        ctx: &'a ToolContext,
        next: Next<'a>,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        (self.f)(call, ctx, next)
    }
}

/// Create middleware from a closure (like axum's `from_fn`).
///
/// The closure must return a `Box::pin(async move { ... })` future.
///
/// ```ignore
/// let audit = tool_middleware_fn(|call, ctx, next| {
///     Box::pin(async move {
///         tracing::info!(tool = %call.name, principal = ?ctx.auth.principal, "audit");
///         next.run(call, ctx).await
///     })
/// });
/// ```
#[must_use]
pub fn tool_middleware_fn<F>(f: F) -> impl ToolMiddleware
where
    F: for<'a> Fn(
            &'a ToolCall,
            &'a ToolContext,
            Next<'a>,
        ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>>
        + Send
        + Sync,
{
    MiddlewareFn { f }
}

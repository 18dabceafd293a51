use std::sync::{Arc, Weak};

use codemode_catalog::CapabilityCatalog;
use codemode_facade::InvocationFacade;
use codemode_sandbox::{InvokeHost, SandboxExecutor, SandboxReport, SandboxRequest};
use codemode_tool::ToolRegistry;
use codemode_types::{AuthContext, BoxedFuture, InvocationError, SandboxError, ToolContext};
use serde_json::Value;

use crate::config::CodeModeConfig;
use crate::meta::{ExecuteCodeTool, SearchOperationsTool};

/// Wires catalog, facade and sandbox together for each request.
///
/// Holds only a weak handle to the registry it serves, since the registry
/// in turn owns the meta-tools that hold this value.
pub struct CodeMode {
    registry: Weak<ToolRegistry>,
    executor: SandboxExecutor,
    config: CodeModeConfig,
}

impl CodeMode {
    /// Create a code mode host over `registry`.
    #[must_use]
    pub fn new(registry: Weak<ToolRegistry>, config: CodeModeConfig) -> Self {
        Self {
            registry,
            executor: SandboxExecutor::new(config.sandbox.clone()),
            config,
        }
    }

    /// Register `execute-code` and `search-operations` into `registry` and
    /// freeze it.
    #[must_use]
    pub fn install(registry: ToolRegistry, config: CodeModeConfig) -> Arc<ToolRegistry> {
        Arc::new_cyclic(|weak| {
            let mut registry = registry;
            let code_mode = Arc::new(Self::new(weak.clone(), config));
            registry.register_dyn(Arc::new(ExecuteCodeTool::new(code_mode.clone())));
            registry.register(SearchOperationsTool::new(code_mode));
            registry
        })
    }

    /// The settings this host runs with.
    #[must_use]
    pub fn config(&self) -> &CodeModeConfig {
        &self.config
    }

    fn registry(&self) -> Result<Arc<ToolRegistry>, SandboxError> {
        self.registry
            .upgrade()
            .ok_or_else(|| SandboxError::fault("the tool registry has been dropped"))
    }

    /// The operations `auth` may call, as of now.
    ///
    /// # Errors
    ///
    /// [`SandboxError::Fault`] when the registry is gone.
    pub fn catalog(&self, auth: &AuthContext) -> Result<CapabilityCatalog, SandboxError> {
        let registry = self.registry()?;
        Ok(CapabilityCatalog::build(&registry, auth))
    }

    /// Run `code` against a catalog built for `ctx.auth`, forwarding every
    /// call to the registry with `ctx`. Cancelling `ctx.cancellation_token`
    /// terminates the execution.
    ///
    /// # Errors
    ///
    /// Any [`SandboxError`].
    pub async fn execute(
        &self,
        code: &str,
        ctx: &ToolContext,
    ) -> Result<SandboxReport, SandboxError> {
        let registry = self.registry()?;
        let catalog = Arc::new(CapabilityCatalog::build(&registry, &ctx.auth));
        let spec = serde_json::to_value(catalog.to_spec())
            .map_err(|e| SandboxError::fault(format!("spec could not be serialized: {e}")))?;
        let max_output_bytes = self.config.sandbox.max_output_bytes;
        let request = SandboxRequest::new(code, spec, catalog.operation_map().clone())
            .with_max_output_bytes(max_output_bytes);

        tracing::info!(
            request_id = %ctx.request_id,
            operations = catalog.len(),
            script_bytes = code.len(),
            "executing code-mode script"
        );
        let host = FacadeHost {
            facade: InvocationFacade::new(catalog, registry, max_output_bytes),
            ctx,
        };
        self.executor
            .run(request, &host, &ctx.cancellation_token)
            .await
    }
}

/// Answers sandbox calls through the facade, on behalf of one request.
struct FacadeHost<'c> {
    facade: InvocationFacade,
    ctx: &'c ToolContext,
}

impl InvokeHost for FacadeHost<'_> {
    fn invoke<'a>(
        &'a self,
        operation_id: &'a str,
        args: Value,
    ) -> BoxedFuture<'a, Result<Value, InvocationError>> {
        Box::pin(self.facade.invoke(operation_id, args, self.ctx))
    }
}

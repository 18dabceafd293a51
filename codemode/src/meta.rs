//! The code-mode meta-tools.

use std::sync::Arc;

use codemode_catalog::Operation;
use codemode_types::{
    BoxedFuture, CODE_MODE_GROUP, SandboxError, Tool, ToolAnnotations, ToolContext,
    ToolDefinition, ToolDyn, ToolError, ToolOutput,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::CodeMode;

/// Hard cap on `search-operations` page size.
const MAX_SEARCH_LIMIT: usize = 100;

const EXECUTE_CODE_DESCRIPTION: &str = "\
Run one JavaScript function expression in a sandbox, e.g. \
`async () => { const rows = await tableau.operations.queryDatasource({...}); return rows.data.length; }`.

Globals:
- spec: every operation you may call, with its requestBody schema, examples and aliases.
- tableau.listOperations(), tableau.callTool(operationId, args), tableau.operations[operationId](args).
- console.log/info/warn/error/debug: captured and returned as logs.

Failed calls reject with an Error whose `code` is the error kind and whose `details` explain the fix. \
Only the returned value and logs leave the sandbox.";

#[derive(Debug, Deserialize)]
struct ExecuteCodeArgs {
    code: String,
}

/// `execute-code { code }`: runs a script through [`CodeMode::execute`].
///
/// Success carries `{result, logs, apiCalls, outputBytes}` as structured
/// content. Failures are error outputs carrying `{error: {kind, message,
/// stack?, details?}}`, so the agent can read them like any tool result.
pub struct ExecuteCodeTool {
    code_mode: Arc<CodeMode>,
}

impl ExecuteCodeTool {
    /// Tool name.
    pub const NAME: &'static str = "execute-code";

    /// Create the tool.
    #[must_use]
    pub fn new(code_mode: Arc<CodeMode>) -> Self {
        Self { code_mode }
    }
}

impl ToolDyn for ExecuteCodeTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            Self::NAME,
            EXECUTE_CODE_DESCRIPTION,
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "A single function expression such as `async () => { ... }`."
                    }
                },
                "required": ["code"],
                "additionalProperties": false
            }),
        )
        .with_group(CODE_MODE_GROUP)
        .with_annotations(ToolAnnotations {
            open_world_hint: Some(true),
            ..ToolAnnotations::default()
        })
    }

    fn call_dyn<'a>(
        &'a self,
        input: Value,
        ctx: &'a ToolContext,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let args: ExecuteCodeArgs = serde_json::from_value(input)
                .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
            match self.code_mode.execute(&args.code, ctx).await {
                Ok(report) => {
                    let value = serde_json::to_value(&report)
                        .map_err(|e| ToolError::ExecutionFailed(Box::new(e)))?;
                    Ok(ToolOutput::structured(value))
                }
                Err(error) => Ok(failure_output(&error)),
            }
        })
    }
}

fn failure_output(error: &SandboxError) -> ToolOutput {
    ToolOutput::error(error.to_string(), Some(json!({ "error": error.to_report() })))
}

/// Arguments for `search-operations`.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SearchOperationsArgs {
    /// Case-insensitive text matched against id, tool name, group, summary
    /// and description. Omit to list everything.
    #[serde(default)]
    pub query: Option<String>,
    /// Maximum number of operations to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Result of `search-operations`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOperationsOutput {
    /// Matches before the limit was applied.
    pub total_matches: usize,
    /// The matching operations, in id order.
    pub operations: Vec<Operation>,
}

/// `search-operations { query?, limit? }`: inspect the catalog without
/// running a sandbox.
pub struct SearchOperationsTool {
    code_mode: Arc<CodeMode>,
}

impl SearchOperationsTool {
    /// Create the tool.
    #[must_use]
    pub fn new(code_mode: Arc<CodeMode>) -> Self {
        Self { code_mode }
    }
}

impl Tool for SearchOperationsTool {
    const NAME: &'static str = "search-operations";
    type Args = SearchOperationsArgs;
    type Output = SearchOperationsOutput;
    type Error = SandboxError;

    fn definition(&self) -> ToolDefinition {
        let schema = serde_json::to_value(schemars::schema_for!(SearchOperationsArgs))
            .unwrap_or_else(|_| json!({ "type": "object" }));
        ToolDefinition::new(
            Self::NAME,
            "Find operations callable from execute-code by keyword. Returns each \
             operation's id, schema, examples and aliases.",
            schema,
        )
        .with_group(CODE_MODE_GROUP)
        .with_annotations(ToolAnnotations::read_only())
    }

    async fn call(
        &self,
        args: SearchOperationsArgs,
        ctx: &ToolContext,
    ) -> Result<SearchOperationsOutput, SandboxError> {
        let catalog = self.code_mode.catalog(&ctx.auth)?;
        let limit = args
            .limit
            .unwrap_or(self.code_mode.config().search_limit)
            .min(MAX_SEARCH_LIMIT);
        let matches = catalog.search(args.query.as_deref(), usize::MAX);
        Ok(SearchOperationsOutput {
            total_matches: matches.len(),
            operations: matches.into_iter().take(limit).cloned().collect(),
        })
    }
}

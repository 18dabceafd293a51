use std::sync::Arc;

use codemode_catalog::{CapabilityCatalog, Operation, hints};
use codemode_tool::{ToolRegistry, schema};
use codemode_types::{
    InvalidArguments, InvocationError, ToolContext, ToolError, ValidationIssue,
};
use serde_json::Value;

use crate::normalize::{apply_aliases, apply_query_shorthand};
use crate::postprocess::{truncate_to_fit, unwrap_output};

/// A call that passed resolution, normalization and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    /// The operation being called.
    pub operation_id: String,
    /// Registry key of the tool that will run.
    pub tool_name: String,
    /// Normalized, validated arguments.
    pub args: Value,
}

/// Executes single operation calls on behalf of a sandboxed script.
///
/// Stateless between calls. The caller's [`ToolContext`] is forwarded to
/// the registry unchanged.
pub struct InvocationFacade {
    catalog: Arc<CapabilityCatalog>,
    registry: Arc<ToolRegistry>,
    max_output_bytes: usize,
}

impl InvocationFacade {
    /// Create a facade over `catalog`, invoking tools from `registry` and
    /// truncating list results to `max_output_bytes`.
    #[must_use]
    pub fn new(
        catalog: Arc<CapabilityCatalog>,
        registry: Arc<ToolRegistry>,
        max_output_bytes: usize,
    ) -> Self {
        Self {
            catalog,
            registry,
            max_output_bytes,
        }
    }

    /// The catalog calls are resolved against.
    #[must_use]
    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    /// Resolve `operation_id` and rewrite aliases and shorthand in `args`.
    ///
    /// # Errors
    ///
    /// [`InvocationError::UnknownOperation`] when the id is not cataloged.
    pub fn normalize(
        &self,
        operation_id: &str,
        args: Value,
    ) -> Result<(&Operation, Value), InvocationError> {
        let operation = self.resolve(operation_id)?;
        let mut args = apply_aliases(args, &operation.aliases);
        if operation.accepts_query_shorthand() {
            args = apply_query_shorthand(args);
        }
        Ok((operation, args))
    }

    /// Normalize and validate a call without running it.
    ///
    /// # Errors
    ///
    /// [`InvocationError::UnknownOperation`] or
    /// [`InvocationError::InvalidArguments`].
    pub fn prepare(
        &self,
        operation_id: &str,
        args: Value,
    ) -> Result<PreparedCall, InvocationError> {
        let (operation, args) = self.normalize(operation_id, args)?;
        let issues = schema::validate(&args, &operation.request_body);
        if !issues.is_empty() {
            return Err(invalid_arguments(operation, &args, issues));
        }
        Ok(PreparedCall {
            operation_id: operation.operation_id.clone(),
            tool_name: operation.tool_name.clone(),
            args,
        })
    }

    /// Run one operation call end to end.
    ///
    /// # Errors
    ///
    /// Any [`InvocationError`]: unknown id, invalid arguments, or the tool's
    /// own failure as [`InvocationError::HostInvocation`].
    pub async fn invoke(
        &self,
        operation_id: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<Value, InvocationError> {
        let call = self.prepare(operation_id, args)?;
        tracing::debug!(
            operation_id = %call.operation_id,
            tool = %call.tool_name,
            request_id = %ctx.request_id,
            "invoking operation"
        );

        let output = self
            .registry
            .execute(&call.tool_name, call.args.clone(), ctx)
            .await
            .map_err(|error| self.map_tool_error(&call, error))?;

        if output.is_error {
            let message = output.text_content();
            tracing::debug!(operation_id = %call.operation_id, %message, "tool reported an error");
            return Err(InvocationError::HostInvocation {
                operation_id: call.operation_id,
                message,
            });
        }
        Ok(truncate_to_fit(unwrap_output(&output), self.max_output_bytes))
    }

    fn resolve(&self, operation_id: &str) -> Result<&Operation, InvocationError> {
        self.catalog
            .operation_map()
            .get(operation_id)
            .and_then(|_| self.catalog.get(operation_id))
            .ok_or_else(|| InvocationError::UnknownOperation {
                operation_id: operation_id.to_string(),
                suggestions: self.catalog.suggest(operation_id),
            })
    }

    fn map_tool_error(&self, call: &PreparedCall, error: ToolError) -> InvocationError {
        match (error, self.catalog.get(&call.operation_id)) {
            (ToolError::InvalidInput(message), Some(operation)) => invalid_arguments(
                operation,
                &call.args,
                vec![ValidationIssue::new("", message)],
            ),
            (error, _) => InvocationError::HostInvocation {
                operation_id: call.operation_id.clone(),
                message: error.to_string(),
            },
        }
    }
}

fn invalid_arguments(
    operation: &Operation,
    args: &Value,
    issues: Vec<ValidationIssue>,
) -> InvocationError {
    let hints = hints_for(operation, args, &issues);
    InvocationError::InvalidArguments(Box::new(InvalidArguments {
        operation_id: operation.operation_id.clone(),
        issues,
        aliases: operation.aliases.clone(),
        example: operation
            .example(hints::MINIMAL_EXAMPLE)
            .cloned()
            .unwrap_or(Value::Null),
        hints,
    }))
}

fn hints_for(operation: &Operation, args: &Value, issues: &[ValidationIssue]) -> Vec<String> {
    let mut out = Vec::new();
    if !args.is_object() {
        out.push("arguments must be a single JSON object".to_string());
    }
    let missing_datasource = format!("missing required property '{}'", hints::DATASOURCE_KEY);
    if issues.iter().any(|issue| issue.message == missing_datasource) {
        let aliases: Vec<&str> = operation.aliases.keys().map(String::as_str).collect();
        out.push(if aliases.is_empty() {
            format!("pass the datasource id as '{}'", hints::DATASOURCE_KEY)
        } else {
            format!(
                "pass the datasource id as '{}' (also accepted: {})",
                hints::DATASOURCE_KEY,
                aliases.join(", ")
            )
        });
    }
    if operation.accepts_query_shorthand()
        && issues.iter().any(|issue| issue.path.starts_with("/query"))
    {
        out.push(
            "fields accept a field name, {name, aggregation} or {fieldCaption, function}; \
             filters accept {field, operator, value} with EQUALS, NOT_EQUALS, IN, \
             GREATER_THAN, LESS_THAN or BETWEEN"
                .to_string(),
        );
    }
    out.push(format!(
        "see spec.operations.{}.requestBody for the full schema and .examples for valid calls",
        operation.operation_id
    ));
    out
}

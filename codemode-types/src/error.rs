//! Error types for all code-mode crates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::ValidationIssue;

/// Errors from tool operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool not found in registry, or filtered out for this request.
    #[error("tool not found: {0}")]
    NotFound(String),
    /// Invalid input for the tool.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The caller is not authorized to use this tool.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Tool execution was cancelled.
    #[error("cancelled")]
    Cancelled,
}

/// The error taxonomy visible to scripts and to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The operation id is not in the catalog.
    UnknownOperation,
    /// Arguments failed schema validation.
    InvalidArguments,
    /// The underlying tool failed.
    HostInvocationError,
    /// The execution produced more output than its budget allows.
    OutputExceeded,
    /// Any other uncaught failure inside the sandbox, including syntax errors.
    SandboxFault,
    /// The execution made more remote calls than allowed.
    CallLimitExceeded,
    /// The isolate ran out of heap.
    HeapLimitExceeded,
    /// The execution ran past its deadline.
    Timeout,
    /// The request was cancelled by the caller.
    Cancelled,
}

impl ErrorKind {
    /// Whether an agent can recover from this error by retrying with
    /// different input, without human intervention.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::UnknownOperation | Self::InvalidArguments)
    }

    /// The wire name of this kind (e.g. `invalid-arguments`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownOperation => "unknown-operation",
            Self::InvalidArguments => "invalid-arguments",
            Self::HostInvocationError => "host-invocation-error",
            Self::OutputExceeded => "output-exceeded",
            Self::SandboxFault => "sandbox-fault",
            Self::CallLimitExceeded => "call-limit-exceeded",
            Self::HeapLimitExceeded => "heap-limit-exceeded",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prescriptive detail for an `invalid-arguments` failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArguments {
    /// Operation whose arguments were rejected.
    pub operation_id: String,
    /// Every validation problem found.
    pub issues: Vec<ValidationIssue>,
    /// Convenience argument name → canonical argument name.
    pub aliases: BTreeMap<String, String>,
    /// A minimal valid argument object.
    pub example: Value,
    /// Free-text pointers at the most likely fix.
    pub hints: Vec<String>,
}

/// Errors from a single facade invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvocationError {
    /// The operation id is not in the catalog.
    #[error("unknown operation: {operation_id}")]
    UnknownOperation {
        /// The id that was requested.
        operation_id: String,
        /// Catalog ids that look like what was meant.
        suggestions: Vec<String>,
    },
    /// The arguments did not validate against the tool's schema.
    #[error("invalid arguments for {}: {}", .0.operation_id, summarize_issues(&.0.issues))]
    InvalidArguments(Box<InvalidArguments>),
    /// The underlying tool failed; carries the tool's own error text.
    #[error("{operation_id} failed: {message}")]
    HostInvocation {
        /// Operation that was invoked.
        operation_id: String,
        /// The tool's error text.
        message: String,
    },
}

fn summarize_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl InvocationError {
    /// The taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            Self::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Self::HostInvocation { .. } => ErrorKind::HostInvocationError,
        }
    }

    /// Structured form handed to sandboxed scripts: `{kind, message, details}`.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let details = match self {
            Self::UnknownOperation {
                operation_id,
                suggestions,
            } => json!({
                "operationId": operation_id,
                "suggestions": suggestions,
                "hint": "call tableau.listOperations() to see every available operation id",
            }),
            Self::InvalidArguments(invalid) => {
                serde_json::to_value(invalid.as_ref()).unwrap_or(Value::Null)
            }
            Self::HostInvocation { operation_id, .. } => json!({ "operationId": operation_id }),
        };
        json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "details": details,
        })
    }
}

/// Errors from a sandbox execution.
///
/// Plain data so it can cross the worker boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SandboxError {
    /// The script was rejected before a worker was started.
    #[error("invalid script: {message}")]
    InvalidScript {
        /// Why the script was rejected.
        message: String,
    },
    /// Logs plus result grew past the output budget.
    #[error("output exceeded the configured limit of {limit} bytes")]
    OutputExceeded {
        /// The configured budget in bytes.
        limit: usize,
    },
    /// The isolate approached its heap limit and was terminated.
    #[error("heap limit exceeded")]
    HeapLimitExceeded,
    /// The execution did not finish before its deadline.
    #[error("execution timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured deadline in milliseconds.
        timeout_ms: u64,
    },
    /// The caller cancelled the request.
    #[error("execution cancelled")]
    Cancelled,
    /// The script threw and did not catch the error.
    #[error("{message}")]
    Script {
        /// Kind carried by the thrown error (e.g. a rejected call).
        code: ErrorKind,
        /// The error message.
        message: String,
        /// The JavaScript stack, where available.
        stack: Option<String>,
        /// Structured payload attached to the error, where available.
        details: Option<Value>,
    },
    /// Any other failure of the sandbox machinery or the isolate.
    #[error("sandbox fault: {message}")]
    Fault {
        /// What went wrong.
        message: String,
        /// The JavaScript stack, where available.
        stack: Option<String>,
    },
}

impl SandboxError {
    /// A fault with no stack.
    #[must_use]
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault {
            message: message.into(),
            stack: None,
        }
    }

    /// The taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidScript { .. } | Self::Fault { .. } => ErrorKind::SandboxFault,
            Self::OutputExceeded { .. } => ErrorKind::OutputExceeded,
            Self::HeapLimitExceeded => ErrorKind::HeapLimitExceeded,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Script { code, .. } => *code,
        }
    }

    /// Structured report for the transport: `{kind, message, stack?, details?}`.
    #[must_use]
    pub fn to_report(&self) -> Value {
        let mut report = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        let (stack, details) = match self {
            Self::Script { stack, details, .. } => (stack.clone(), details.clone()),
            Self::Fault { stack, .. } => (stack.clone(), None),
            Self::OutputExceeded { limit } => (None, Some(json!({ "limit": limit }))),
            _ => (None, None),
        };
        if let Some(stack) = stack {
            report["stack"] = Value::String(stack);
        }
        if let Some(details) = details {
            report["details"] = details;
        }
        report
    }
}

/// Errors from reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set to a value that could not be parsed.
    #[error("invalid value for {key}: {message}")]
    Invalid {
        /// The variable name.
        key: String,
        /// Why the value was rejected.
        message: String,
    },
    /// Two settings contradict each other.
    #[error("conflicting configuration: {0}")]
    Conflict(String),
}

//! Messages exchanged between the host task and the worker thread.
//!
//! Everything here is plain data: no handles, no closures.

use codemode_types::{InvocationError, SandboxError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a console entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// `console.log`
    Log,
    /// `console.info`
    Info,
    /// `console.warn`
    Warn,
    /// `console.error`
    Error,
    /// `console.debug`
    Debug,
}

/// One captured console call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Which console method was called.
    pub level: LogLevel,
    /// The arguments, formatted and joined by a space.
    pub message: String,
}

/// The outcome of a successful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxReport {
    /// The value the script's promise resolved to.
    pub result: Value,
    /// Console output, in call order.
    pub logs: Vec<LogEntry>,
    /// Remote calls forwarded to the host.
    pub api_calls: u32,
    /// Bytes charged against the output budget.
    pub output_bytes: usize,
}

/// Worker → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerMessage {
    /// The script called an operation.
    Invoke {
        /// Unique per execution, never reused.
        id: u64,
        /// Catalog id of the operation.
        operation_id: String,
        /// Raw arguments as the script passed them.
        args: Value,
    },
    /// The script's promise resolved.
    Complete(SandboxReport),
    /// The execution failed.
    Error {
        /// What went wrong.
        error: SandboxError,
    },
}

/// Host → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostMessage {
    /// Settles one outstanding invocation.
    InvokeResult {
        /// The id from the matching [`WorkerMessage::Invoke`].
        id: u64,
        /// Whether the call succeeded.
        ok: bool,
        /// Present when `ok`.
        value: Option<Value>,
        /// `{kind, message, details}` when not `ok`.
        error: Option<Value>,
    },
}

impl HostMessage {
    /// Result message for invocation `id`.
    #[must_use]
    pub fn invoke_result(id: u64, result: Result<Value, InvocationError>) -> Self {
        match result {
            Ok(value) => Self::InvokeResult {
                id,
                ok: true,
                value: Some(value),
                error: None,
            },
            Err(error) => Self::InvokeResult {
                id,
                ok: false,
                value: None,
                error: Some(error.to_payload()),
            },
        }
    }
}
